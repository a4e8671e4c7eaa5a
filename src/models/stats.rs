// Finalized per-destination statistics handed to the metrics sinks.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Aggregated result of all bursts toward one destination in one pass.
///
/// `packet_loss_rate` is a fraction in `0.0..=1.0`. RTT fields are `None` when
/// no reply was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedStats {
    pub destination: String,
    pub packets_transmitted: u64,
    pub packets_received: u64,
    pub packet_loss_count: u64,
    pub packet_loss_rate: Option<f64>,
    pub rtt_min: Option<f64>,
    /// Sum of per-burst mean RTTs divided by the number of bursts with replies.
    pub rtt_avg: Option<f64>,
    pub rtt_max: Option<f64>,
    /// Mean over every individual reply. Differs from `rtt_avg` when bursts
    /// received uneven numbers of replies.
    pub rtt_packet_mean: Option<f64>,
    pub bursts: u32,
    pub window_start: DateTime<Local>,
    pub window_end: DateTime<Local>,
    pub elapsed_ms: u64,
    /// `HH:MM:SS.mmm`
    pub elapsed: String,
}

impl AggregatedStats {
    pub fn has_replies(&self) -> bool {
        self.packets_received > 0
    }

    pub fn loss_percent(&self) -> Option<f64> {
        self.packet_loss_rate.map(|rate| rate * 100.0)
    }
}
