//! Batch - 管道中流转的遥测数据单元
//!
//! 一个 `Batch` 是对共享数据实例的廉价句柄：克隆句柄不会复制数据，
//! 只有 [`Batch::deep_copy`] 才会产生独立的新实例。
//!
//! ## 只读状态
//! - 新建实例可变 (`read_only = false`)
//! - [`Batch::mark_read_only`] 之后永久只读，[`Batch::mutate`] 返回 `ReadOnlyBatch`
//! - 只读实例可以被多个只读消费者并发持有

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::ContractError;

/// 信号类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Traces,
    Metrics,
    Logs,
    Profiles,
}

impl SignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Traces => "traces",
            Self::Metrics => "metrics",
            Self::Logs => "logs",
            Self::Profiles => "profiles",
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 资源分组：同一资源（服务/主机）产生的一组记录
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    /// 资源属性 (e.g., service.name)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    /// 有序记录
    #[serde(default)]
    pub records: Vec<Record>,
}

impl ResourceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }
}

/// 类型化记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Span(Span),
    Metric(MetricPoint),
    Log(LogRecord),
    Profile(ProfileSample),
}

/// 链路 Span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub trace_id: String,
    pub span_id: String,
    pub name: String,
    pub start_unix_nano: u64,
    pub end_unix_nano: u64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// 指标数据点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub name: String,
    pub timestamp_unix_nano: u64,
    pub value: f64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// 日志记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp_unix_nano: u64,
    pub severity: String,
    pub body: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// 性能剖析样本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSample {
    pub profile_id: String,
    pub timestamp_unix_nano: u64,
    pub duration_nano: u64,
    /// 原始 pprof 载荷 (零拷贝)
    pub payload: Bytes,
}

struct BatchInner {
    signal: SignalType,
    read_only: AtomicBool,
    groups: RwLock<Vec<ResourceGroup>>,
}

/// 遥测数据批次句柄
///
/// `Clone` 共享同一实例，可通过 [`Batch::same_instance`] 判断。
/// `PartialEq` 比较结构内容（信号类型与资源分组），不比较只读标记。
#[derive(Clone)]
pub struct Batch {
    inner: Arc<BatchInner>,
}

impl Batch {
    /// 创建空批次
    pub fn new(signal: SignalType) -> Self {
        Self::from_groups(signal, Vec::new())
    }

    /// 由资源分组创建批次
    pub fn from_groups(signal: SignalType, groups: Vec<ResourceGroup>) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                signal,
                read_only: AtomicBool::new(false),
                groups: RwLock::new(groups),
            }),
        }
    }

    pub fn signal(&self) -> SignalType {
        self.inner.signal
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only.load(Ordering::Acquire)
    }

    /// 标记为只读（单向，不可恢复）
    ///
    /// 持有写锁期间翻转，保证不会与进行中的 `mutate` 交错。
    pub fn mark_read_only(&self) {
        let _guard = self.inner.groups.write();
        self.inner.read_only.store(true, Ordering::Release);
    }

    /// 深拷贝：新实例可变，源实例不受影响
    pub fn deep_copy(&self) -> Self {
        Self::from_groups(self.inner.signal, self.inner.groups.read().clone())
    }

    /// 就地修改资源分组
    ///
    /// # Errors
    /// 批次已只读时返回 `ContractError::ReadOnlyBatch`
    pub fn mutate<R>(
        &self,
        f: impl FnOnce(&mut Vec<ResourceGroup>) -> R,
    ) -> Result<R, ContractError> {
        let mut groups = self.inner.groups.write();
        if self.inner.read_only.load(Ordering::Acquire) {
            return Err(ContractError::ReadOnlyBatch);
        }
        Ok(f(&mut groups))
    }

    /// 只读访问资源分组
    pub fn resource_groups(&self) -> MappedRwLockReadGuard<'_, [ResourceGroup]> {
        RwLockReadGuard::map(self.inner.groups.read(), |groups| groups.as_slice())
    }

    pub fn resource_group_count(&self) -> usize {
        self.inner.groups.read().len()
    }

    /// 所有资源分组中的记录总数
    pub fn record_count(&self) -> usize {
        self.inner.groups.read().iter().map(|g| g.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// 两个句柄是否指向同一实例
    pub fn same_instance(&self, other: &Batch) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        if self.same_instance(other) {
            return true;
        }
        self.inner.signal == other.inner.signal
            && *self.inner.groups.read() == *other.inner.groups.read()
    }
}

impl fmt::Debug for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("signal", &self.inner.signal)
            .field("read_only", &self.is_read_only())
            .field("resource_groups", &self.resource_group_count())
            .field("records", &self.record_count())
            .finish()
    }
}

impl Serialize for Batch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let groups = self.inner.groups.read();
        let mut state = serializer.serialize_struct("Batch", 2)?;
        state.serialize_field("signal", &self.inner.signal)?;
        state.serialize_field("resource_groups", &*groups)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata::generate_batch;

    #[test]
    fn test_new_batch_is_mutable() {
        let batch = Batch::new(SignalType::Logs);
        assert!(!batch.is_read_only());
        assert!(batch.is_empty());
    }

    #[test]
    fn test_deep_copy_is_equal_and_independent() {
        let original = generate_batch(SignalType::Traces, 4);
        let copy = original.deep_copy();

        assert_eq!(copy, original);
        assert!(!copy.same_instance(&original));

        copy.mutate(|groups| groups[0].records.clear()).unwrap();

        assert_eq!(original.record_count(), 4);
        assert_ne!(copy, original);
    }

    #[test]
    fn test_deep_copy_of_read_only_is_mutable() {
        let original = generate_batch(SignalType::Metrics, 2);
        original.mark_read_only();

        let copy = original.deep_copy();
        assert!(original.is_read_only());
        assert!(!copy.is_read_only());
        assert!(copy.mutate(|groups| groups.clear()).is_ok());
    }

    #[test]
    fn test_read_only_rejects_mutation() {
        let batch = generate_batch(SignalType::Logs, 3);
        batch.mark_read_only();
        // Idempotent
        batch.mark_read_only();

        let result = batch.mutate(|groups| groups.clear());
        assert!(matches!(result, Err(ContractError::ReadOnlyBatch)));
        assert_eq!(batch.record_count(), 3);
    }

    #[test]
    fn test_clone_shares_instance_and_flag() {
        let batch = generate_batch(SignalType::Profiles, 1);
        let handle = batch.clone();

        assert!(handle.same_instance(&batch));
        batch.mark_read_only();
        assert!(handle.is_read_only());
    }

    #[test]
    fn test_record_count_spans_groups() {
        let batch = Batch::from_groups(
            SignalType::Logs,
            vec![
                generate_batch(SignalType::Logs, 2).resource_groups()[0].clone(),
                generate_batch(SignalType::Logs, 3).resource_groups()[0].clone(),
            ],
        );
        assert_eq!(batch.resource_group_count(), 2);
        assert_eq!(batch.record_count(), 5);
    }

    #[test]
    fn test_serialize_includes_signal_and_records() {
        let batch = generate_batch(SignalType::Logs, 1);
        let json = serde_json::to_value(&batch).unwrap();

        assert_eq!(json["signal"], "logs");
        assert_eq!(json["resource_groups"][0]["records"][0]["kind"], "log");
    }
}
