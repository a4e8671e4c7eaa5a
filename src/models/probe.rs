// One probe burst as returned by the transport.

use serde::{Deserialize, Serialize};

/// Result of one burst toward a single destination.
///
/// Partial loss is a normal result: `received < transmitted` with only the
/// replies present in `rtt_samples`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub transmitted: u32,
    pub received: u32,
    /// Round-trip times of the replies, in milliseconds.
    pub rtt_samples: Vec<f64>,
    /// Human-readable reply lines, one per probe.
    #[serde(default)]
    pub raw_lines: Vec<String>,
}

impl ProbeReport {
    pub fn new(transmitted: u32, received: u32, rtt_samples: Vec<f64>) -> Self {
        Self {
            transmitted,
            received,
            rtt_samples,
            raw_lines: Vec::new(),
        }
    }

    /// A burst in which no probe got a reply.
    pub fn lost(transmitted: u32) -> Self {
        Self::new(transmitted, 0, Vec::new())
    }

    pub fn with_raw_lines(mut self, raw_lines: Vec<String>) -> Self {
        self.raw_lines = raw_lines;
        self
    }

    /// Samples usable for statistics: finite, non-negative, and no more than
    /// the number of replies counted.
    pub fn valid_samples(&self) -> impl Iterator<Item = f64> + '_ {
        let counted = (self.received as usize).min(self.rtt_samples.len());
        self.rtt_samples
            .iter()
            .copied()
            .take(counted)
            .filter(|rtt| rtt.is_finite() && *rtt >= 0.0)
    }

    pub fn rtt_min(&self) -> Option<f64> {
        self.valid_samples().reduce(f64::min)
    }

    pub fn rtt_max(&self) -> Option<f64> {
        self.valid_samples().reduce(f64::max)
    }

    /// Mean RTT of this burst, kept inside `[rtt_min, rtt_max]` despite float rounding.
    pub fn rtt_avg(&self) -> Option<f64> {
        let (sum, n) = self
            .valid_samples()
            .fold((0.0_f64, 0_u32), |(sum, n), rtt| (sum + rtt, n + 1));
        if n == 0 {
            return None;
        }
        let mean = sum / f64::from(n);
        match (self.rtt_min(), self.rtt_max()) {
            (Some(min), Some(max)) => Some(mean.clamp(min, max)),
            _ => Some(mean),
        }
    }
}
