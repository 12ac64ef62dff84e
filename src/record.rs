use crate::cli::{GroupBy, Pattern};
use serde::{Deserialize, Serialize};

/// One parsed observation from a benchmark CSV row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub pattern: Pattern,
    pub worker_count: Option<u32>,
    pub payload_size: u64,
    pub latency_ms: f64,
    pub success: bool,
}

impl MeasurementRecord {
    /// Create a successful observation without a worker count
    pub fn new(pattern: Pattern, payload_size: u64, latency_ms: f64) -> Self {
        Self {
            pattern,
            worker_count: None,
            payload_size,
            latency_ms,
            success: true,
        }
    }

    pub fn with_worker_count(mut self, worker_count: u32) -> Self {
        self.worker_count = Some(worker_count);
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }
}

/// Configuration a distribution is keyed on
///
/// Field order gives the report ordering: worker count first, then payload
/// size, with absent values sorting before present ones.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct ConfigKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<u64>,
}

impl ConfigKey {
    pub fn payload(payload_size: u64) -> Self {
        Self {
            worker_count: None,
            payload_size: Some(payload_size),
        }
    }

    pub fn workers(worker_count: u32) -> Self {
        Self {
            worker_count: Some(worker_count),
            payload_size: None,
        }
    }

    pub fn workers_payload(worker_count: u32, payload_size: u64) -> Self {
        Self {
            worker_count: Some(worker_count),
            payload_size: Some(payload_size),
        }
    }

    /// Project a record onto the dimensions selected by `group_by`
    pub fn for_record(record: &MeasurementRecord, group_by: GroupBy) -> Self {
        match group_by {
            GroupBy::PayloadSize => Self {
                worker_count: None,
                payload_size: Some(record.payload_size),
            },
            GroupBy::WorkerCount => Self {
                worker_count: record.worker_count,
                payload_size: None,
            },
            GroupBy::WorkerCountAndPayloadSize => Self {
                worker_count: record.worker_count,
                payload_size: Some(record.payload_size),
            },
        }
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.worker_count, self.payload_size) {
            (Some(n), Some(p)) => write!(f, "N={} payload={}", n, p),
            (Some(n), None) => write!(f, "N={}", n),
            (None, Some(p)) => write!(f, "payload={}", p),
            (None, None) => write!(f, "all"),
        }
    }
}
