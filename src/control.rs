// Control front end: start/stop/restart across roles, destination edits.
// Restart is stop followed by start here, never inside the supervisor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::{AddOutcome, DestinationBook};
use crate::error::BookError;
use crate::models::{DestinationTarget, ManagedRole, RoleStatus};
use crate::supervisor::{StopOutcome, Supervisor};

/// Outcome for one role of a start/stop command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReport {
    pub role: ManagedRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReport {
    pub roles: Vec<RoleReport>,
}

impl ControlReport {
    /// True when no role reported an error.
    pub fn ok(&self) -> bool {
        self.roles.iter().all(|r| r.error.is_none())
    }
}

/// Destination list plus global interval, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationsView {
    pub interval_secs: u64,
    pub destinations: Vec<DestinationTarget>,
}

pub struct ControlPlane {
    supervisor: Arc<Supervisor>,
    book: Mutex<DestinationBook>,
}

impl ControlPlane {
    pub fn new(supervisor: Arc<Supervisor>, book: DestinationBook) -> Self {
        Self {
            supervisor,
            book: Mutex::new(book),
        }
    }

    pub async fn status(&self) -> Vec<RoleStatus> {
        self.supervisor.statuses().await
    }

    /// Starts every role not already running, storage backend first.
    pub async fn start_all(&self) -> ControlReport {
        let mut report = ControlReport::default();
        for role in ManagedRole::START_ORDER {
            let entry = match self.supervisor.start(role).await {
                Ok(pid) => RoleReport {
                    role,
                    pid: Some(pid),
                    stop: None,
                    error: None,
                },
                Err(e) => RoleReport {
                    role,
                    pid: None,
                    stop: None,
                    error: Some(e.to_string()),
                },
            };
            report.roles.push(entry);
        }
        info!(ok = report.ok(), "start command finished");
        report
    }

    /// Stops every role, collector first.
    pub async fn stop_all(&self) -> ControlReport {
        let mut report = ControlReport::default();
        for role in ManagedRole::STOP_ORDER {
            let entry = match self.supervisor.stop(role).await {
                Ok(outcome) => RoleReport {
                    role,
                    pid: None,
                    stop: Some(outcome),
                    error: None,
                },
                Err(e) => {
                    warn!(
                        role = %role,
                        error = %e,
                        "stop did not complete; operator attention needed"
                    );
                    RoleReport {
                        role,
                        pid: self.supervisor.status(role).await,
                        stop: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            report.roles.push(entry);
        }
        info!(ok = report.ok(), "stop command finished");
        report
    }

    /// Stop (a no-op when nothing runs) followed by start.
    pub async fn restart_all(&self) -> ControlReport {
        let stopped = self.stop_all().await;
        let started = self.start_all().await;
        let mut report = ControlReport::default();
        report.roles.extend(stopped.roles);
        report.roles.extend(started.roles);
        report
    }

    pub async fn destinations(&self) -> DestinationsView {
        let book = self.book.lock().await;
        DestinationsView {
            interval_secs: book.interval_secs(),
            destinations: book.destinations().to_vec(),
        }
    }

    pub async fn add_destination(
        &self,
        target: DestinationTarget,
    ) -> Result<AddOutcome, BookError> {
        let address = target.address.clone();
        let outcome = self.book.lock().await.add(target)?;
        info!(address = %address, outcome = ?outcome, "destination saved");
        Ok(outcome)
    }

    pub async fn update_interval(&self, interval_secs: u64) -> Result<(), BookError> {
        self.book.lock().await.update_interval(interval_secs)?;
        info!(interval_secs, "interval updated");
        Ok(())
    }

    pub async fn remove_destination(&self, address: &str) -> Result<bool, BookError> {
        let removed = self.book.lock().await.remove(address)?;
        info!(address, removed, "destination removal");
        Ok(removed)
    }
}
