// Configured destination: address, burst size, optional per-target wait.

use serde::{Deserialize, Serialize};

/// One monitored destination. Unique by `address` within a configuration set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationTarget {
    pub address: String,
    #[serde(alias = "count")]
    pub probe_count: u32,
    /// Seconds to wait before probing this target; falls back to the global interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

impl DestinationTarget {
    pub fn new(address: impl Into<String>, probe_count: u32) -> Self {
        Self {
            address: address.into(),
            probe_count,
            interval_secs: None,
        }
    }

    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.interval_secs = Some(interval_secs);
        self
    }
}
