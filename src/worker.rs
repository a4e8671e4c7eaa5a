// Collector worker: runs the scheduler in its own task until shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::Instrument;

use crate::models::DestinationTarget;
use crate::scheduler::{PassSummary, Scheduler};

/// Scheduler, targets and shutdown for the worker.
pub struct WorkerDeps {
    pub scheduler: Arc<Scheduler>,
    pub targets: Vec<DestinationTarget>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Worker timing config.
pub struct WorkerConfig {
    /// Global wait before each destination, in seconds.
    pub interval_secs: u64,
}

/// Spawns the scheduler task. The handle resolves with the run summary once
/// the run mode completes or shutdown is signalled.
pub fn spawn(deps: WorkerDeps, config: WorkerConfig) -> tokio::task::JoinHandle<PassSummary> {
    let WorkerDeps {
        scheduler,
        targets,
        shutdown_rx,
    } = deps;
    let WorkerConfig { interval_secs } = config;

    let worker_span = tracing::span!(
        tracing::Level::DEBUG,
        "worker",
        interval_secs,
        targets = targets.len()
    );

    tokio::spawn(
        async move {
            if targets.is_empty() {
                tracing::warn!("no destinations configured");
            }
            let summary = scheduler
                .run(&targets, Duration::from_secs(interval_secs), shutdown_rx)
                .await;
            tracing::debug!("Worker shutting down");
            summary
        }
        .instrument(worker_span),
    )
}
