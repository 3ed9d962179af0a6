//! Deterministic batch generators for tests and demo traffic

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::{Batch, LogRecord, MetricPoint, ProfileSample, Record, ResourceGroup, SignalType, Span};

const BASE_TIME_UNIX_NANO: u64 = 1_700_000_000_000_000_000;

/// One resource group holding `records` records of the given signal.
pub fn generate_batch(signal: SignalType, records: usize) -> Batch {
    Batch::from_groups(signal, vec![generate_group(signal, "resource-0", records)])
}

/// `groups` resource groups, each holding `records_per_group` records.
pub fn generate_batch_with_groups(
    signal: SignalType,
    groups: usize,
    records_per_group: usize,
) -> Batch {
    let groups = (0..groups)
        .map(|g| generate_group(signal, &format!("resource-{g}"), records_per_group))
        .collect();
    Batch::from_groups(signal, groups)
}

fn generate_group(signal: SignalType, resource: &str, records: usize) -> ResourceGroup {
    let mut group = ResourceGroup::new()
        .with_attribute("service.name", "generated")
        .with_attribute("resource.id", resource);
    group.records = (0..records).map(|i| generate_record(signal, i)).collect();
    group
}

fn generate_record(signal: SignalType, index: usize) -> Record {
    let ts = BASE_TIME_UNIX_NANO + index as u64 * 1_000;
    let attributes = BTreeMap::from([("index".to_string(), index.to_string())]);
    match signal {
        SignalType::Traces => Record::Span(Span {
            trace_id: format!("{:032x}", index + 1),
            span_id: format!("{:016x}", index + 1),
            name: format!("operation-{index}"),
            start_unix_nano: ts,
            end_unix_nano: ts + 500,
            attributes,
        }),
        SignalType::Metrics => Record::Metric(MetricPoint {
            name: "requests".to_string(),
            timestamp_unix_nano: ts,
            value: index as f64,
            attributes,
        }),
        SignalType::Logs => Record::Log(LogRecord {
            timestamp_unix_nano: ts,
            severity: "INFO".to_string(),
            body: format!("log line {index}"),
            attributes,
        }),
        SignalType::Profiles => Record::Profile(ProfileSample {
            profile_id: format!("{:032x}", index + 1),
            timestamp_unix_nano: ts,
            duration_nano: 10_000_000,
            payload: Bytes::from(vec![index as u8; 8]),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_batch_counts() {
        for signal in [
            SignalType::Traces,
            SignalType::Metrics,
            SignalType::Logs,
            SignalType::Profiles,
        ] {
            let batch = generate_batch(signal, 5);
            assert_eq!(batch.signal(), signal);
            assert_eq!(batch.resource_group_count(), 1);
            assert_eq!(batch.record_count(), 5);
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(
            generate_batch_with_groups(SignalType::Logs, 3, 2),
            generate_batch_with_groups(SignalType::Logs, 3, 2)
        );
    }
}
