// Human-readable report, one block per destination.

use std::fmt::Write as _;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use super::MetricsSink;
use crate::models::AggregatedStats;

const TIME_FORMAT: &str = "%m/%d/%y %H:%M:%S";
const NO_DATA: &str = "n/a";

/// Writes [`render_report`] output to any writer (stdout by default).
pub struct ConsoleSink<W: Write + Send = std::io::Stdout> {
    out: Mutex<W>,
}

impl ConsoleSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> MetricsSink for ConsoleSink<W> {
    fn publish(&self, stats: &AggregatedStats) {
        let report = render_report(stats);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = out.write_all(report.as_bytes()).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, destination = %stats.destination, "console report failed");
        }
    }
}

fn ms(v: Option<f64>) -> String {
    v.map_or_else(|| NO_DATA.to_string(), |v| format!("{v:.3} ms"))
}

/// Simplified ping statistics block.
pub fn render_report(stats: &AggregatedStats) -> String {
    let loss = stats
        .loss_percent()
        .map_or_else(|| NO_DATA.to_string(), |p| format!("{p:.1}%"));

    let mut s = String::new();
    let _ = writeln!(s, "Simplified Ping Statistics:");
    let _ = writeln!(s, "Ping destination: {}", stats.destination);
    let _ = writeln!(
        s,
        "First probe sent: {}",
        stats.window_start.format(TIME_FORMAT)
    );
    let _ = writeln!(s, "Packets sent: {}", stats.packets_transmitted);
    let _ = writeln!(s, "Packets received: {}", stats.packets_received);
    let _ = writeln!(s, "Packets lost: {}", stats.packet_loss_count);
    let _ = writeln!(s, "Packet loss: {loss}");
    let _ = writeln!(s, "Fastest round-trip time: {}", ms(stats.rtt_min));
    let _ = writeln!(s, "Slowest round-trip time: {}", ms(stats.rtt_max));
    let _ = writeln!(s, "Average round-trip time: {}", ms(stats.rtt_avg));
    let _ = writeln!(
        s,
        "Last reply window closed: {}",
        stats.window_end.format(TIME_FORMAT)
    );
    let _ = writeln!(s, "Time elapsed: {}", stats.elapsed);
    s
}
