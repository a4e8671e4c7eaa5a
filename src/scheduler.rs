// Drives the aggregator across destinations: validate, wait, probe, fold, publish.
// Destinations are processed in the given order; a bad or failing destination is
// skipped and the pass continues. Waits and in-flight bursts yield to shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::aggregator;
use crate::error::ProbeError;
use crate::models::{AggregatedStats, DestinationTarget};
use crate::sink::MetricsSink;
use crate::transport::{ProbeTransport, Resolver};

/// Pause between passes in [`RunMode::Repeat`], so an empty or zero-interval
/// target set cannot spin.
pub const MIN_REPEAT_PAUSE: Duration = Duration::from_secs(1);

/// What `run` does after the last destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Return after one pass.
    #[default]
    OneShot,
    /// Stay idle after one pass until shutdown.
    Continuous,
    /// Start another pass until shutdown.
    Repeat,
}

/// Which wait applies before each destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// The target's own interval, or the default when it has none.
    #[default]
    PerTarget,
    /// The default interval before every target.
    Shared,
}

/// How `probe_count` probes are requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurstShape {
    /// One burst of `probe_count` probes.
    #[default]
    Single,
    /// `probe_count` bursts of one probe.
    PerProbe,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub mode: RunMode,
    pub pacing: Pacing,
    pub burst_shape: BurstShape,
    /// Destinations probed at once. 1 keeps strict sequential order.
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::OneShot,
            pacing: Pacing::PerTarget,
            burst_shape: BurstShape::Single,
            concurrency: 1,
        }
    }
}

/// Counts over one or more passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub passes: u32,
    pub published: usize,
    /// Destinations rejected by validation.
    pub skipped: usize,
    /// Destinations whose probing failed at the transport.
    pub failed: usize,
    pub cancelled: bool,
}

impl PassSummary {
    fn merge(&mut self, other: &PassSummary) {
        self.passes += other.passes;
        self.published += other.published;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.cancelled |= other.cancelled;
    }

    fn record(&mut self, outcome: &TargetOutcome) {
        match outcome {
            TargetOutcome::Published => self.published += 1,
            TargetOutcome::Skipped => self.skipped += 1,
            TargetOutcome::Failed => self.failed += 1,
            TargetOutcome::Cancelled => self.cancelled = true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetOutcome {
    Published,
    Skipped,
    Failed,
    Cancelled,
}

pub struct Scheduler {
    transport: Arc<dyn ProbeTransport>,
    resolver: Arc<dyn Resolver>,
    sink: Arc<dyn MetricsSink>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        transport: Arc<dyn ProbeTransport>,
        resolver: Arc<dyn Resolver>,
        sink: Arc<dyn MetricsSink>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            transport,
            resolver,
            sink,
            config,
        }
    }

    /// Checks a target before it is scheduled.
    pub async fn validate(&self, target: &DestinationTarget) -> Result<(), ProbeError> {
        if target.address.trim().is_empty() {
            return Err(ProbeError::invalid_destination(
                &target.address,
                "address is empty",
            ));
        }
        if target.probe_count == 0 {
            return Err(ProbeError::invalid_parameter(
                &target.address,
                "probe count must be a positive integer",
            ));
        }
        self.resolver.resolve(&target.address).await?;
        Ok(())
    }

    /// Runs passes over `targets` according to the configured [`RunMode`].
    #[instrument(skip_all, fields(targets = targets.len(), mode = ?self.config.mode))]
    pub async fn run(
        &self,
        targets: &[DestinationTarget],
        default_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> PassSummary {
        let mut total = PassSummary::default();
        loop {
            let pass = self.run_pass(targets, default_interval, &mut shutdown).await;
            total.merge(&pass);
            if pass.cancelled {
                break;
            }
            match self.config.mode {
                RunMode::OneShot => break,
                RunMode::Continuous => {
                    info!("pass complete; idle until shutdown");
                    wait_for_shutdown(&mut shutdown).await;
                    total.cancelled = true;
                    break;
                }
                RunMode::Repeat => {
                    // Each target already waits its interval; this only keeps
                    // an empty or zero-interval set from spinning.
                    if !pause_or_shutdown(MIN_REPEAT_PAUSE, &mut shutdown).await {
                        total.cancelled = true;
                        break;
                    }
                }
            }
        }
        info!(
            passes = total.passes,
            published = total.published,
            skipped = total.skipped,
            failed = total.failed,
            cancelled = total.cancelled,
            "scheduler finished"
        );
        total
    }

    /// One pass over all targets.
    pub async fn run_pass(
        &self,
        targets: &[DestinationTarget],
        default_interval: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PassSummary {
        let mut summary = PassSummary {
            passes: 1,
            ..PassSummary::default()
        };

        if self.config.concurrency <= 1 {
            for target in targets {
                if is_shutdown(shutdown) {
                    summary.cancelled = true;
                    break;
                }
                let outcome = self
                    .process_target(target, self.wait_for(target, default_interval), shutdown)
                    .await;
                summary.record(&outcome);
                if outcome == TargetOutcome::Cancelled {
                    break;
                }
            }
            return summary;
        }

        // Owned targets keep the stream future Send for tokio::spawn.
        let outcomes: Vec<TargetOutcome> = futures_util::stream::iter(targets.iter().cloned())
            .map(|target| {
                let mut shutdown = shutdown.clone();
                let wait = self.wait_for(&target, default_interval);
                async move { self.process_target(&target, wait, &mut shutdown).await }
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;
        for outcome in &outcomes {
            summary.record(outcome);
        }
        summary
    }

    fn wait_for(&self, target: &DestinationTarget, default_interval: Duration) -> Duration {
        match self.config.pacing {
            Pacing::Shared => default_interval,
            Pacing::PerTarget => target
                .interval_secs
                .map_or(default_interval, Duration::from_secs),
        }
    }

    #[instrument(skip_all, fields(destination = %target.address, count = target.probe_count))]
    async fn process_target(
        &self,
        target: &DestinationTarget,
        wait: Duration,
        shutdown: &mut watch::Receiver<bool>,
    ) -> TargetOutcome {
        if let Err(e) = self.validate(target).await {
            warn!(error = %e, "skipping destination");
            return TargetOutcome::Skipped;
        }

        if !pause_or_shutdown(wait, shutdown).await {
            return TargetOutcome::Cancelled;
        }

        let result = tokio::select! {
            result = self.collect(target) => result,
            _ = wait_for_shutdown(shutdown) => {
                debug!("shutdown during probing; discarding partial statistics");
                return TargetOutcome::Cancelled;
            }
        };

        match result {
            Ok(stats) => {
                info!(
                    transmitted = stats.packets_transmitted,
                    received = stats.packets_received,
                    loss_rate = ?stats.packet_loss_rate,
                    rtt_avg_ms = ?stats.rtt_avg,
                    elapsed = %stats.elapsed,
                    "destination probed"
                );
                self.sink.publish(&stats);
                TargetOutcome::Published
            }
            Err(ProbeError::Transport(reason)) => {
                warn!(error = %reason, "probe transport failed; nothing published");
                TargetOutcome::Failed
            }
            Err(e) => {
                warn!(error = %e, "skipping destination");
                TargetOutcome::Skipped
            }
        }
    }

    /// Requests exactly `probe_count` probes in the configured burst shape.
    async fn collect(&self, target: &DestinationTarget) -> Result<AggregatedStats, ProbeError> {
        let mut acc = aggregator::begin(&target.address);
        let window_start = Local::now();

        match self.config.burst_shape {
            BurstShape::Single => {
                let report = self
                    .transport
                    .probe(&target.address, target.probe_count)
                    .await?;
                log_raw_lines(&report.raw_lines);
                acc = aggregator::fold(acc, &report);
            }
            BurstShape::PerProbe => {
                for _ in 0..target.probe_count {
                    let report = self.transport.probe(&target.address, 1).await?;
                    log_raw_lines(&report.raw_lines);
                    acc = aggregator::fold(acc, &report);
                }
            }
        }

        Ok(aggregator::finalize(acc, window_start, Local::now()))
    }
}

fn log_raw_lines(lines: &[String]) {
    for line in lines {
        debug!(target: "pingwatch::probe", "{}", line.trim());
    }
}

fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow()
}

/// Resolves once shutdown is signalled. A dropped sender never signals.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Sleeps for `duration`; returns `false` if shutdown came first.
async fn pause_or_shutdown(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if is_shutdown(shutdown) {
        return false;
    }
    if duration.is_zero() {
        return true;
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = wait_for_shutdown(shutdown) => false,
    }
}
