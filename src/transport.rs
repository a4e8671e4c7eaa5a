//! Probe transport: name resolution and ICMP echo bursts.
//!
//! - [`ProbeTransport`]: performs a burst of probes toward one destination
//! - [`Resolver`]: name lookup used to validate destinations before scheduling
//! - [`IcmpTransport`]: `surge-ping` implementation
//!
//! Packet loss is a successful result. [`ProbeError::Transport`] is reserved for
//! the case where no probe could be sent at all (e.g. no ICMP socket permission).

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::time::timeout;

use crate::error::ProbeError;
use crate::models::ProbeReport;

/// Default per-probe reply timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default gap between consecutive probes of one burst.
pub const DEFAULT_PROBE_GAP: Duration = Duration::from_secs(1);

/// ICMP payload size, same as the classic `ping` default.
const PAYLOAD_SIZE: usize = 56;

#[async_trait]
pub trait ProbeTransport: Send + Sync + 'static {
    /// Sends `count` probes to `destination` and reports what came back.
    async fn probe(&self, destination: &str, count: u32) -> Result<ProbeReport, ProbeError>;
}

#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ProbeError>;
}

/// Resolves through the system resolver (`getaddrinfo` via tokio).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ProbeError> {
        if host.trim().is_empty() {
            return Err(ProbeError::invalid_destination(host, "address is empty"));
        }
        resolve_host(host).await.map_err(|e| {
            ProbeError::invalid_destination(host, format!("name lookup failed: {e}"))
        })
    }
}

/// Resolve hostname to IP address.
pub async fn resolve_host(host: &str) -> Result<IpAddr, std::io::Error> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let addrs = tokio::net::lookup_host(format!("{host}:0")).await?;
    addrs
        .into_iter()
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses found"))
}

/// ICMP echo transport backed by `surge-ping`.
#[derive(Debug, Clone)]
pub struct IcmpTransport {
    probe_timeout: Duration,
    probe_gap: Duration,
}

impl Default for IcmpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT, DEFAULT_PROBE_GAP)
    }
}

impl IcmpTransport {
    pub fn new(probe_timeout: Duration, probe_gap: Duration) -> Self {
        Self {
            probe_timeout,
            probe_gap,
        }
    }
}

#[async_trait]
impl ProbeTransport for IcmpTransport {
    async fn probe(&self, destination: &str, count: u32) -> Result<ProbeReport, ProbeError> {
        let ip = resolve_host(destination).await.map_err(|e| {
            ProbeError::invalid_destination(destination, format!("name lookup failed: {e}"))
        })?;

        let client = match ip {
            IpAddr::V4(_) => Client::new(&Config::default()),
            IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
        }
        .map_err(|e| ProbeError::Transport(format!("cannot open ICMP socket: {e}")))?;

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.probe_timeout);

        let payload = [0u8; PAYLOAD_SIZE];
        let mut rtt_samples = Vec::with_capacity(count as usize);
        let mut raw_lines = Vec::with_capacity(count as usize + 1);
        raw_lines.push(format!(
            "PING {destination} ({ip}): {PAYLOAD_SIZE} data bytes"
        ));

        for seq in 0..count {
            if seq > 0 {
                tokio::time::sleep(self.probe_gap).await;
            }
            // PingSequence is u16; wrap for very long bursts.
            let sequence = PingSequence((seq % u32::from(u16::MAX)) as u16);
            match timeout(self.probe_timeout, pinger.ping(sequence, &payload)).await {
                Ok(Ok((_, rtt))) => {
                    let ms = rtt.as_secs_f64() * 1000.0;
                    raw_lines.push(format!("Reply from {ip}: icmp_seq={seq} time={ms:.3} ms"));
                    rtt_samples.push(ms);
                }
                Ok(Err(e)) => {
                    tracing::debug!(destination, seq, error = %e, "probe failed");
                    raw_lines.push(format!("Request icmp_seq={seq} failed: {e}"));
                }
                Err(_) => {
                    raw_lines.push(format!("Request icmp_seq={seq} timed out"));
                }
            }
        }

        let received = rtt_samples.len() as u32;
        Ok(ProbeReport::new(count, received, rtt_samples).with_raw_lines(raw_lines))
    }
}
