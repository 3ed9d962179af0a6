//! `validate` command implementation.

use std::collections::HashSet;

use anyhow::{Context, Result};
use contracts::RouterBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    destination_count: usize,
    route_count: usize,
    queued_destinations: usize,
    retrying_destinations: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: Vec::new(),
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(&blueprint),
            summary: Some(ConfigSummary {
                version: format!("{:?}", blueprint.version),
                destination_count: blueprint.destinations.len(),
                route_count: blueprint.routes.len(),
                queued_destinations: blueprint
                    .destinations
                    .iter()
                    .filter(|d| d.queue.enabled)
                    .count(),
                retrying_destinations: blueprint
                    .destinations
                    .iter()
                    .filter(|d| d.retry.enabled)
                    .count(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &RouterBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.routes.is_empty() {
        warnings.push("No routes configured - destinations will never receive data".to_string());
    }

    let referenced: HashSet<&str> = blueprint
        .routes
        .iter()
        .flat_map(|r| r.destinations.iter().map(String::as_str))
        .collect();
    for dest in &blueprint.destinations {
        if !referenced.contains(dest.name.as_str()) {
            warnings.push(format!(
                "Destination '{}' is not referenced by any route",
                dest.name
            ));
        }
        if !dest.queue.enabled && dest.retry.enabled {
            warnings.push(format!(
                "Destination '{}' has retry enabled but no queue - failures are returned inline",
                dest.name
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Destinations: {}", summary.destination_count);
            println!("  Routes: {}", summary.route_count);
            println!("  Queued destinations: {}", summary.queued_destinations);
            println!("  Retrying destinations: {}", summary.retrying_destinations);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[[destinations]]
name = "debug"
exporter = "log"

[[destinations]]
name = "spare"
exporter = "nop"

[destinations.queue]
enabled = false

[[routes]]
name = "logs/in"
signal = "logs"
destinations = ["debug"]
"#;

    #[test]
    fn test_unreferenced_destination_warned() {
        let blueprint = config_loader::ConfigLoader::load_from_str(
            CONFIG,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();
        let warnings = collect_warnings(&blueprint);

        assert!(warnings.iter().any(|w| w.contains("'spare'")));
        assert!(!warnings.iter().any(|w| w.contains("'debug'")));
    }

    #[test]
    fn test_validate_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.toml");
        std::fs::write(&path, CONFIG).unwrap();

        let result = validate_config(&ValidateArgs {
            config: path,
            json: false,
        });
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.destination_count, 2);
        assert_eq!(summary.route_count, 1);
        assert_eq!(summary.queued_destinations, 1);
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let args = ValidateArgs {
            config: "/nonexistent/router.toml".into(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
