// Burst aggregation: begin → fold per burst → finalize.
// Pure functions over an owned accumulator; no I/O and no clock reads.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::models::{AggregatedStats, ProbeReport};

/// Running totals for one destination while its bursts are folded in.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsAccumulator {
    destination: String,
    transmitted: u64,
    received: u64,
    rtt_min: Option<f64>,
    rtt_max: Option<f64>,
    burst_mean_sum: f64,
    contributing_bursts: u32,
    bursts: u32,
    sample_sum: f64,
    sample_count: u64,
}

impl StatsAccumulator {
    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn bursts(&self) -> u32 {
        self.bursts
    }

    pub fn packets_transmitted(&self) -> u64 {
        self.transmitted
    }

    pub fn packets_received(&self) -> u64 {
        self.received
    }
}

/// Fresh accumulator for `destination`; no stale values carry over.
pub fn begin(destination: impl Into<String>) -> StatsAccumulator {
    StatsAccumulator {
        destination: destination.into(),
        transmitted: 0,
        received: 0,
        rtt_min: None,
        rtt_max: None,
        burst_mean_sum: 0.0,
        contributing_bursts: 0,
        bursts: 0,
        sample_sum: 0.0,
        sample_count: 0,
    }
}

/// Adds one burst. A burst claiming more replies than probes is clamped.
pub fn fold(mut acc: StatsAccumulator, burst: &ProbeReport) -> StatsAccumulator {
    let received = if burst.received > burst.transmitted {
        tracing::warn!(
            destination = %acc.destination,
            transmitted = burst.transmitted,
            received = burst.received,
            "burst reported more replies than probes; clamping"
        );
        burst.transmitted
    } else {
        burst.received
    };

    acc.bursts += 1;
    acc.transmitted += u64::from(burst.transmitted);
    acc.received += u64::from(received);

    for rtt in burst.valid_samples() {
        acc.rtt_min = Some(acc.rtt_min.map_or(rtt, |m| m.min(rtt)));
        acc.rtt_max = Some(acc.rtt_max.map_or(rtt, |m| m.max(rtt)));
        acc.sample_sum += rtt;
        acc.sample_count += 1;
    }

    if received > 0
        && let Some(mean) = burst.rtt_avg()
    {
        acc.burst_mean_sum += mean;
        acc.contributing_bursts += 1;
    }

    acc
}

/// Computes loss and averages and stamps the time window.
pub fn finalize(
    acc: StatsAccumulator,
    window_start: DateTime<Local>,
    window_end: DateTime<Local>,
) -> AggregatedStats {
    let packet_loss_count = acc.transmitted - acc.received;
    let packet_loss_rate = if acc.transmitted > 0 {
        Some(packet_loss_count as f64 / acc.transmitted as f64)
    } else {
        None
    };

    let (rtt_min, rtt_max) = match (acc.rtt_min, acc.rtt_max) {
        (Some(min), Some(max)) if acc.received > 0 => (Some(min), Some(max)),
        _ => (None, None),
    };
    let within = |v: f64| match (rtt_min, rtt_max) {
        (Some(min), Some(max)) => Some(v.clamp(min, max)),
        _ => None,
    };
    let rtt_avg = if acc.contributing_bursts > 0 {
        within(acc.burst_mean_sum / f64::from(acc.contributing_bursts))
    } else {
        None
    };
    let rtt_packet_mean = if acc.sample_count > 0 {
        within(acc.sample_sum / acc.sample_count as f64)
    } else {
        None
    };

    let elapsed = (window_end - window_start).to_std().unwrap_or_default();

    AggregatedStats {
        destination: acc.destination,
        packets_transmitted: acc.transmitted,
        packets_received: acc.received,
        packet_loss_count,
        packet_loss_rate,
        rtt_min,
        rtt_avg,
        rtt_max,
        rtt_packet_mean,
        bursts: acc.bursts,
        window_start,
        window_end,
        elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        elapsed: format_elapsed(elapsed),
    }
}

/// Formats a duration as `HH:MM:SS.mmm`. Hours are not wrapped at 24.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_ms = elapsed.as_millis();
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1_000;
    let millis = total_ms % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}
