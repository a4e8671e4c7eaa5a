//! Metrics sinks: where finalized statistics go.
//!
//! - [`ScrapeSink`]: latest statistics per destination as Prometheus gauges
//! - [`ConsoleSink`]: human-readable report per destination
//! - [`FanoutSink`]: forwards to several sinks in order

mod console;
mod scrape;

use std::sync::Arc;

use crate::models::AggregatedStats;

pub use console::{ConsoleSink, render_report};
pub use scrape::ScrapeSink;

/// Receives one finalized record per destination.
///
/// Calls for the same destination overwrite (last write wins). Implementations
/// only take short locks so the scheduler is never held up.
pub trait MetricsSink: Send + Sync {
    fn publish(&self, stats: &AggregatedStats);
}

#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl MetricsSink for FanoutSink {
    fn publish(&self, stats: &AggregatedStats) {
        for sink in &self.sinks {
            sink.publish(stats);
        }
    }
}
