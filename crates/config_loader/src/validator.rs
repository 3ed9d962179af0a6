//! 配置校验模块
//!
//! 校验规则：
//! - 目的地名称非空且唯一
//! - 启用队列时 0 < queue_capacity <= QueueConfig::MAX_CAPACITY, num_workers > 0
//! - 重试参数合法 (multiplier >= 1, initial <= max, 抖动系数在 [0, 1], max_attempts >= 1)
//! - 路由名称唯一，目的地列表非空且均已定义

use std::collections::HashSet;

use contracts::{ContractError, DestinationConfig, QueueConfig, RouterBlueprint};

/// 校验 RouterBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    validate_destination_names(blueprint)?;
    for dest in &blueprint.destinations {
        validate_queue(dest)?;
        validate_retry(dest)?;
    }
    validate_routes(blueprint)?;
    Ok(())
}

/// 校验目的地名称
fn validate_destination_names(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, dest) in blueprint.destinations.iter().enumerate() {
        if dest.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("destinations[{idx}].name"),
                "destination name cannot be empty",
            ));
        }
        if !seen.insert(dest.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("destinations[name={}]", dest.name),
                "duplicate destination name",
            ));
        }
    }
    Ok(())
}

/// 校验队列配置
fn validate_queue(dest: &DestinationConfig) -> Result<(), ContractError> {
    let queue = &dest.queue;
    if !queue.enabled {
        return Ok(());
    }
    if queue.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            format!("destinations[{}].queue.queue_capacity", dest.name),
            "queue_capacity must be > 0",
        ));
    }
    if queue.queue_capacity > QueueConfig::MAX_CAPACITY {
        return Err(ContractError::config_validation(
            format!("destinations[{}].queue.queue_capacity", dest.name),
            format!("queue_capacity must be <= {}", QueueConfig::MAX_CAPACITY),
        ));
    }
    if queue.num_workers == 0 {
        return Err(ContractError::config_validation(
            format!("destinations[{}].queue.num_workers", dest.name),
            "num_workers must be > 0",
        ));
    }
    Ok(())
}

/// 校验重试策略
fn validate_retry(dest: &DestinationConfig) -> Result<(), ContractError> {
    let retry = &dest.retry;
    let field = |name: &str| format!("destinations[{}].retry.{name}", dest.name);

    if !retry.multiplier.is_finite() || retry.multiplier < 1.0 {
        return Err(ContractError::config_validation(
            field("multiplier"),
            format!("multiplier must be >= 1, got {}", retry.multiplier),
        ));
    }
    if !(0.0..=1.0).contains(&retry.randomization_factor) {
        return Err(ContractError::config_validation(
            field("randomization_factor"),
            format!(
                "randomization_factor must be within [0, 1], got {}",
                retry.randomization_factor
            ),
        ));
    }
    if retry.initial_interval_ms > retry.max_interval_ms {
        return Err(ContractError::config_validation(
            field("initial_interval_ms"),
            format!(
                "initial_interval_ms ({}) must be <= max_interval_ms ({})",
                retry.initial_interval_ms, retry.max_interval_ms
            ),
        ));
    }
    if retry.max_attempts == Some(0) {
        return Err(ContractError::config_validation(
            field("max_attempts"),
            "max_attempts must be >= 1 when set",
        ));
    }
    Ok(())
}

/// 校验路由表
fn validate_routes(blueprint: &RouterBlueprint) -> Result<(), ContractError> {
    let known: HashSet<&str> = blueprint
        .destinations
        .iter()
        .map(|d| d.name.as_str())
        .collect();
    let mut seen = HashSet::new();

    for (idx, route) in blueprint.routes.iter().enumerate() {
        if route.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("routes[{idx}].name"),
                "route name cannot be empty",
            ));
        }
        if !seen.insert(route.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("routes[name={}]", route.name),
                "duplicate route name",
            ));
        }
        if route.destinations.is_empty() {
            return Err(ContractError::config_validation(
                format!("routes[{}].destinations", route.name),
                "route must reference at least one destination",
            ));
        }
        if let Some(unknown) = route
            .destinations
            .iter()
            .find(|d| !known.contains(d.as_str()))
        {
            return Err(ContractError::config_validation(
                format!("routes[{}].destinations", route.name),
                format!("destination '{unknown}' not found"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        ConfigVersion, ExporterKind, QueueConfig, RetryConfig, RouteConfig, SignalType,
        Verbosity,
    };

    fn minimal_blueprint() -> RouterBlueprint {
        RouterBlueprint {
            version: ConfigVersion::V1,
            destinations: vec![DestinationConfig {
                name: "debug".into(),
                exporter: ExporterKind::Log,
                verbosity: Verbosity::Normal,
                mutates_data: false,
                resource_attributes: Default::default(),
                queue: QueueConfig::default(),
                retry: RetryConfig::default(),
                params: Default::default(),
            }],
            routes: vec![RouteConfig {
                name: "logs/in".into(),
                signal: SignalType::Logs,
                destinations: vec!["debug".into()],
            }],
        }
    }

    fn assert_invalid(bp: &RouterBlueprint, expected: &str) {
        let result = validate(bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains(expected), "got: {err}");
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_destination_name() {
        let mut bp = minimal_blueprint();
        bp.destinations.push(bp.destinations[0].clone());
        assert_invalid(&bp, "duplicate destination name");
    }

    #[test]
    fn test_empty_destination_name() {
        let mut bp = minimal_blueprint();
        bp.destinations[0].name = String::new();
        assert_invalid(&bp, "cannot be empty");
    }

    #[test]
    fn test_zero_capacity() {
        let mut bp = minimal_blueprint();
        bp.destinations[0].queue.queue_capacity = 0;
        assert_invalid(&bp, "queue_capacity must be > 0");

        // Irrelevant once the queue is disabled
        bp.destinations[0].queue.enabled = false;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_capacity_above_limit() {
        let mut bp = minimal_blueprint();
        bp.destinations[0].queue.queue_capacity = usize::MAX;
        assert_invalid(&bp, "queue_capacity must be <=");

        bp.destinations[0].queue.queue_capacity = QueueConfig::MAX_CAPACITY;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_workers() {
        let mut bp = minimal_blueprint();
        bp.destinations[0].queue.num_workers = 0;
        assert_invalid(&bp, "num_workers must be > 0");
    }

    #[test]
    fn test_invalid_retry() {
        let mut bp = minimal_blueprint();
        bp.destinations[0].retry.multiplier = 0.5;
        assert_invalid(&bp, "multiplier must be >= 1");

        let mut bp = minimal_blueprint();
        bp.destinations[0].retry.randomization_factor = 1.5;
        assert_invalid(&bp, "randomization_factor");

        let mut bp = minimal_blueprint();
        bp.destinations[0].retry.initial_interval_ms = 60_000;
        assert_invalid(&bp, "must be <= max_interval_ms");

        let mut bp = minimal_blueprint();
        bp.destinations[0].retry.max_attempts = Some(0);
        assert_invalid(&bp, "max_attempts must be >= 1");
    }

    #[test]
    fn test_route_without_destinations() {
        let mut bp = minimal_blueprint();
        bp.routes[0].destinations.clear();
        assert_invalid(&bp, "at least one destination");
    }

    #[test]
    fn test_route_unknown_destination() {
        let mut bp = minimal_blueprint();
        bp.routes[0].destinations.push("nonexistent".into());
        assert_invalid(&bp, "'nonexistent' not found");
    }

    #[test]
    fn test_duplicate_route_name() {
        let mut bp = minimal_blueprint();
        bp.routes.push(bp.routes[0].clone());
        assert_invalid(&bp, "duplicate route name");
    }
}
