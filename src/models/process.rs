// Supervised worker roles.

use serde::{Deserialize, Serialize};

/// A named kind of supervised external worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedRole {
    /// Metrics-storage backend (e.g. a Prometheus server scraping the collector).
    MetricsBackend,
    /// The `collect` worker running the scheduler.
    Collector,
}

impl ManagedRole {
    pub const ALL: [ManagedRole; 2] = [ManagedRole::MetricsBackend, ManagedRole::Collector];

    /// Launch order: storage backend first so the first scrape finds it up.
    pub const START_ORDER: [ManagedRole; 2] = [ManagedRole::MetricsBackend, ManagedRole::Collector];

    pub const STOP_ORDER: [ManagedRole; 2] = [ManagedRole::Collector, ManagedRole::MetricsBackend];

    pub const fn index(self) -> usize {
        match self {
            ManagedRole::MetricsBackend => 0,
            ManagedRole::Collector => 1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            ManagedRole::MetricsBackend => "metrics_backend",
            ManagedRole::Collector => "collector",
        }
    }
}

impl std::fmt::Display for ManagedRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state of one role as reported by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStatus {
    pub role: ManagedRole,
    pub pid: Option<u32>,
    pub running: bool,
}
