// Shared test helpers: scripted transport/resolver, recording sink, fake processes
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use pingwatch::aggregator;
use pingwatch::error::{ProbeError, SupervisorError};
use pingwatch::models::{AggregatedStats, ManagedRole, ProbeReport};
use pingwatch::scheduler::{Scheduler, SchedulerConfig};
use pingwatch::sink::MetricsSink;
use pingwatch::supervisor::{ProcessControl, RoleCommand, StopSignal};
use pingwatch::transport::{ProbeTransport, Resolver};

/// Replies to every probe with the same RTT unless a destination is scripted.
#[derive(Default)]
pub struct StubTransport {
    rtt_ms: f64,
    failing: HashSet<String>,
    scripted: HashMap<String, Vec<ProbeReport>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl StubTransport {
    pub fn new(rtt_ms: f64) -> Self {
        Self {
            rtt_ms,
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, destination: &str) -> Self {
        self.failing.insert(destination.to_string());
        self
    }

    /// Reports returned in order for `destination`; the last one repeats.
    pub fn scripted(mut self, destination: &str, reports: Vec<ProbeReport>) -> Self {
        self.scripted.insert(destination.to_string(), reports);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProbeTransport for StubTransport {
    async fn probe(&self, destination: &str, count: u32) -> Result<ProbeReport, ProbeError> {
        let call_index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((destination.to_string(), count));
            calls.iter().filter(|(d, _)| d == destination).count() - 1
        };
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(destination) {
            return Err(ProbeError::Transport("no icmp socket".into()));
        }
        if let Some(reports) = self.scripted.get(destination) {
            let idx = call_index.min(reports.len() - 1);
            return Ok(reports[idx].clone());
        }
        Ok(ProbeReport::new(
            count,
            count,
            vec![self.rtt_ms; count as usize],
        ))
    }
}

/// Resolves everything except the rejected names.
#[derive(Default)]
pub struct StubResolver {
    rejected: HashSet<String>,
}

impl StubResolver {
    pub fn rejecting(names: &[&str]) -> Self {
        Self {
            rejected: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait]
impl Resolver for StubResolver {
    async fn resolve(&self, host: &str) -> Result<IpAddr, ProbeError> {
        if host.trim().is_empty() {
            return Err(ProbeError::invalid_destination(host, "address is empty"));
        }
        if self.rejected.contains(host) {
            return Err(ProbeError::invalid_destination(host, "name lookup failed"));
        }
        Ok(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }
}

/// Keeps every published record in order.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<AggregatedStats>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<AggregatedStats> {
        self.records.lock().unwrap().clone()
    }

    pub fn destinations(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|s| s.destination)
            .collect()
    }
}

impl MetricsSink for RecordingSink {
    fn publish(&self, stats: &AggregatedStats) {
        self.records.lock().unwrap().push(stats.clone());
    }
}

pub fn scheduler_with(
    transport: Arc<StubTransport>,
    resolver: StubResolver,
    sink: Arc<RecordingSink>,
    config: SchedulerConfig,
) -> Scheduler {
    Scheduler::new(transport, Arc::new(resolver), sink, config)
}

/// Finalized stats from the given bursts, stamped with the current time.
pub fn stats_from(destination: &str, bursts: &[ProbeReport]) -> AggregatedStats {
    let mut acc = aggregator::begin(destination);
    for burst in bursts {
        acc = aggregator::fold(acc, burst);
    }
    let now = Local::now();
    aggregator::finalize(acc, now, now)
}

/// How a fake process reacts to signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behaviour {
    /// Exits on SIGTERM.
    #[default]
    Cooperative,
    /// Survives SIGTERM, dies on SIGKILL.
    IgnoresTerm,
    /// Already gone when signalled.
    Vanished,
    /// Signals are refused.
    Protected,
}

#[derive(Default)]
pub struct FakeProcessControl {
    next_pid: AtomicU32,
    spawns: AtomicUsize,
    fail_spawn: bool,
    behaviour: Behaviour,
    alive: Mutex<HashSet<u32>>,
    signals: Mutex<Vec<(u32, StopSignal)>>,
}

impl FakeProcessControl {
    pub fn new(behaviour: Behaviour) -> Self {
        Self {
            next_pid: AtomicU32::new(1000),
            behaviour,
            ..Self::default()
        }
    }

    pub fn failing_spawn() -> Self {
        Self {
            fail_spawn: true,
            ..Self::new(Behaviour::Cooperative)
        }
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn signals(&self) -> Vec<(u32, StopSignal)> {
        self.signals.lock().unwrap().clone()
    }

    /// Simulates the process exiting on its own.
    pub fn exit(&self, pid: u32) {
        self.alive.lock().unwrap().remove(&pid);
    }
}

impl ProcessControl for FakeProcessControl {
    fn spawn(&self, role: ManagedRole, _command: &RoleCommand) -> Result<u32, SupervisorError> {
        if self.fail_spawn {
            return Err(SupervisorError::SpawnFailure {
                role,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such program"),
            });
        }
        self.spawns.fetch_add(1, Ordering::SeqCst);
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.alive.lock().unwrap().insert(pid);
        Ok(pid)
    }

    fn signal(&self, pid: u32, signal: StopSignal) -> Result<(), SupervisorError> {
        self.signals.lock().unwrap().push((pid, signal));
        match (self.behaviour, signal) {
            (Behaviour::Vanished, _) => {
                self.exit(pid);
                Err(SupervisorError::ProcessNotFound { pid })
            }
            (Behaviour::Protected, _) => Err(SupervisorError::PermissionDenied { pid }),
            (Behaviour::IgnoresTerm, StopSignal::Graceful) => Ok(()),
            _ => {
                self.exit(pid);
                Ok(())
            }
        }
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.alive.lock().unwrap().contains(&pid)
    }
}

pub fn both_roles() -> std::collections::BTreeMap<ManagedRole, RoleCommand> {
    [
        (ManagedRole::MetricsBackend, RoleCommand::new("prometheus")),
        (ManagedRole::Collector, RoleCommand::new("pingwatch").arg("collect")),
    ]
    .into_iter()
    .collect()
}
