//! RouterBlueprint - Config Loader 输出
//!
//! 描述完整的路由配置：目的地（导出器、队列、重试策略）与路由表。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::{QueueConfig, RetryConfig, SignalType};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的路由配置蓝图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 目的地定义列表
    pub destinations: Vec<DestinationConfig>,

    /// 路由表
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl RouterBlueprint {
    /// 按名称查找目的地
    pub fn destination(&self, name: &str) -> Option<&DestinationConfig> {
        self.destinations.iter().find(|d| d.name == name)
    }
}

/// 目的地配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// 目的地名称（路由引用的标识）
    pub name: String,

    /// 导出器类型
    pub exporter: ExporterKind,

    /// 日志导出器的详细程度
    #[serde(default)]
    pub verbosity: Verbosity,

    /// 导出器是否会修改收到的数据
    #[serde(default)]
    pub mutates_data: bool,

    /// 在导出前写入每个资源分组的属性（非空时目的地声明为可变）
    #[serde(default)]
    pub resource_attributes: BTreeMap<String, String>,

    /// 投递队列配置
    #[serde(default)]
    pub queue: QueueConfig,

    /// 重试策略
    #[serde(default)]
    pub retry: RetryConfig,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// 导出器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExporterKind {
    /// 日志输出
    Log,
    /// 丢弃所有数据
    Nop,
    /// 始终失败（`params.failure = "transient" | "permanent"`）
    Failing,
}

/// 日志详细程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// 仅记录计数
    Basic,
    /// 计数 + 资源分组
    #[default]
    Normal,
    /// 完整 JSON 内容
    Detailed,
}

/// 路由配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// 路由名称
    pub name: String,

    /// 该路由承载的信号类型
    pub signal: SignalType,

    /// 目标目的地名称列表
    pub destinations: Vec<String>,
}
