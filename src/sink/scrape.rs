// Prometheus gauges, one series per statistic field labelled by destination.
// The state lock covers both the multi-gauge update and `render`, so a scrape
// never observes a half-updated destination.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};

use super::MetricsSink;
use crate::models::AggregatedStats;

const NAMESPACE: &str = "pingwatch";
const LABEL: &str = "destination";

struct StatGauges {
    packets_transmitted: GaugeVec,
    packets_received: GaugeVec,
    packet_loss_count: GaugeVec,
    packet_loss_rate: GaugeVec,
    rtt_min_ms: GaugeVec,
    rtt_avg_ms: GaugeVec,
    rtt_max_ms: GaugeVec,
    rtt_packet_mean_ms: GaugeVec,
    elapsed_seconds: GaugeVec,
    window_end_timestamp_seconds: GaugeVec,
}

impl StatGauges {
    fn register(registry: &Registry) -> prometheus::Result<Self> {
        let g = |name: &str, help: &str| gauge(registry, name, help);
        Ok(Self {
            packets_transmitted: g("packets_transmitted", "Probes sent in the last window")?,
            packets_received: g("packets_received", "Replies received in the last window")?,
            packet_loss_count: g("packet_loss_count", "Probes without a reply")?,
            packet_loss_rate: g("packet_loss_rate", "Fraction of probes lost (0-1)")?,
            rtt_min_ms: g("rtt_min_ms", "Fastest round-trip time in milliseconds")?,
            rtt_avg_ms: g("rtt_avg_ms", "Average round-trip time in milliseconds")?,
            rtt_max_ms: g("rtt_max_ms", "Slowest round-trip time in milliseconds")?,
            rtt_packet_mean_ms: g(
                "rtt_packet_mean_ms",
                "Mean round-trip time over every reply in milliseconds",
            )?,
            elapsed_seconds: g("window_elapsed_seconds", "Duration of the last probe window")?,
            window_end_timestamp_seconds: g(
                "window_end_timestamp_seconds",
                "Unix time at which the last probe window closed",
            )?,
        })
    }

    fn set(&self, stats: &AggregatedStats) {
        let labels = [stats.destination.as_str()];
        let no_data = |v: Option<f64>| v.unwrap_or(f64::NAN);
        self.packets_transmitted
            .with_label_values(&labels)
            .set(stats.packets_transmitted as f64);
        self.packets_received
            .with_label_values(&labels)
            .set(stats.packets_received as f64);
        self.packet_loss_count
            .with_label_values(&labels)
            .set(stats.packet_loss_count as f64);
        self.packet_loss_rate
            .with_label_values(&labels)
            .set(no_data(stats.packet_loss_rate));
        self.rtt_min_ms
            .with_label_values(&labels)
            .set(no_data(stats.rtt_min));
        self.rtt_avg_ms
            .with_label_values(&labels)
            .set(no_data(stats.rtt_avg));
        self.rtt_max_ms
            .with_label_values(&labels)
            .set(no_data(stats.rtt_max));
        self.rtt_packet_mean_ms
            .with_label_values(&labels)
            .set(no_data(stats.rtt_packet_mean));
        self.elapsed_seconds
            .with_label_values(&labels)
            .set(stats.elapsed_ms as f64 / 1000.0);
        self.window_end_timestamp_seconds
            .with_label_values(&labels)
            .set(stats.window_end.timestamp_millis() as f64 / 1000.0);
    }
}

fn gauge(registry: &Registry, name: &str, help: &str) -> prometheus::Result<GaugeVec> {
    let vec = GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), &[LABEL])?;
    registry.register(Box::new(vec.clone()))?;
    Ok(vec)
}

/// Latest statistics per destination, exposed for scraping.
pub struct ScrapeSink {
    registry: Registry,
    gauges: StatGauges,
    latest: RwLock<BTreeMap<String, AggregatedStats>>,
}

impl ScrapeSink {
    /// Registers all gauges once; the sink is then shared by handle.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let gauges = StatGauges::register(&registry)?;
        Ok(Self {
            registry,
            gauges,
            latest: RwLock::new(BTreeMap::new()),
        })
    }

    /// Prometheus text exposition of every published destination.
    pub fn render(&self) -> prometheus::Result<String> {
        let _guard = self.latest.read().unwrap_or_else(PoisonError::into_inner);
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn latest(&self, destination: &str) -> Option<AggregatedStats> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(destination)
            .cloned()
    }

    /// Snapshot of all destinations, ordered by address.
    pub fn snapshot(&self) -> Vec<AggregatedStats> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl MetricsSink for ScrapeSink {
    fn publish(&self, stats: &AggregatedStats) {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        self.gauges.set(stats);
        latest.insert(stats.destination.clone(), stats.clone());
    }
}
