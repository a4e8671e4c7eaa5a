//! Process supervision for the metrics backend and the collector worker.
//!
//! One record per [`ManagedRole`] holding the live pid, each behind its own
//! async mutex so `start`/`stop` on the same role never overlap.
//!
//! `stop` walks `Running → Terminating → Stopped`:
//! graceful signal, wait up to [`STOP_TIMEOUT`] for exit, then forced kill.
//! A process that is already gone counts as stopped. A permission error
//! leaves the record in place and is returned to the caller.

mod os;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::SupervisorError;
use crate::models::{ManagedRole, RoleStatus};

pub use os::OsProcessControl;

/// How long a process gets to exit after the graceful signal.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the process to disappear after the forced kill.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(1);

/// Liveness polling step while waiting for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forced,
}

/// Executable and arguments used to launch a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl RoleCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StopOutcome {
    /// The process was running and has exited.
    Stopped { forced: bool },
    /// Nothing was running (no record, or the process was already gone).
    AlreadyStopped,
}

/// OS seam: launching, signalling and liveness checks.
pub trait ProcessControl: Send + Sync + 'static {
    fn spawn(&self, role: ManagedRole, command: &RoleCommand) -> Result<u32, SupervisorError>;

    /// `ProcessNotFound` when the pid is gone, `PermissionDenied` when not allowed.
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<(), SupervisorError>;

    fn is_alive(&self, pid: u32) -> bool;
}

pub struct Supervisor {
    control: Arc<dyn ProcessControl>,
    commands: BTreeMap<ManagedRole, RoleCommand>,
    slots: [Mutex<Option<u32>>; 2],
    stop_timeout: Duration,
}

impl Supervisor {
    pub fn new(
        control: Arc<dyn ProcessControl>,
        commands: BTreeMap<ManagedRole, RoleCommand>,
    ) -> Self {
        Self {
            control,
            commands,
            slots: [Mutex::new(None), Mutex::new(None)],
            stop_timeout: STOP_TIMEOUT,
        }
    }

    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    fn slot(&self, role: ManagedRole) -> &Mutex<Option<u32>> {
        &self.slots[role.index()]
    }

    /// Launches the role unless a live process is already recorded for it.
    #[instrument(skip(self), fields(role = %role))]
    pub async fn start(&self, role: ManagedRole) -> Result<u32, SupervisorError> {
        let mut slot = self.slot(role).lock().await;

        if let Some(pid) = *slot {
            if self.control.is_alive(pid) {
                info!(pid, "already running; not starting a second process");
                return Ok(pid);
            }
            debug!(pid, "recorded process has exited; clearing stale record");
            *slot = None;
        }

        let Some(command) = self.commands.get(&role) else {
            return Err(SupervisorError::SpawnFailure {
                role,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no command configured for role",
                ),
            });
        };

        let pid = self.control.spawn(role, command).inspect_err(|e| {
            warn!(error = %e, program = %command.program, "spawn failed");
        })?;
        *slot = Some(pid);
        info!(pid, program = %command.program, "process started");
        Ok(pid)
    }

    /// Graceful-then-forced termination of the role's process.
    #[instrument(skip(self), fields(role = %role))]
    pub async fn stop(&self, role: ManagedRole) -> Result<StopOutcome, SupervisorError> {
        let mut slot = self.slot(role).lock().await;

        let Some(pid) = *slot else {
            info!("not running");
            return Ok(StopOutcome::AlreadyStopped);
        };

        info!(pid, "sending graceful termination signal");
        match self.control.signal(pid, StopSignal::Graceful) {
            Ok(()) => {}
            Err(SupervisorError::ProcessNotFound { .. }) => {
                info!(pid, "process already gone");
                *slot = None;
                return Ok(StopOutcome::AlreadyStopped);
            }
            Err(e) => {
                warn!(pid, error = %e, "graceful termination failed; record kept");
                return Err(e);
            }
        }

        if self.wait_for_exit(pid, self.stop_timeout).await {
            *slot = None;
            info!(pid, "process exited");
            return Ok(StopOutcome::Stopped { forced: false });
        }

        warn!(
            pid,
            timeout_ms = self.stop_timeout.as_millis() as u64,
            "process ignored graceful signal; escalating to forced kill"
        );
        match self.control.signal(pid, StopSignal::Forced) {
            Ok(()) => {}
            Err(SupervisorError::ProcessNotFound { .. }) => {
                *slot = None;
                info!(pid, "process exited before forced kill");
                return Ok(StopOutcome::Stopped { forced: false });
            }
            Err(e) => {
                warn!(pid, error = %e, "forced kill failed; record kept");
                return Err(e);
            }
        }

        if !self.wait_for_exit(pid, KILL_REAP_TIMEOUT).await {
            warn!(pid, "process still visible after forced kill; clearing record");
        }
        *slot = None;
        info!(pid, "process killed");
        Ok(StopOutcome::Stopped { forced: true })
    }

    /// Live pid for the role; a recorded pid whose process has exited reports `None`.
    pub async fn status(&self, role: ManagedRole) -> Option<u32> {
        let mut slot = self.slot(role).lock().await;
        match *slot {
            Some(pid) if self.control.is_alive(pid) => Some(pid),
            Some(pid) => {
                debug!(role = %role, pid, "recorded process has exited");
                *slot = None;
                None
            }
            None => None,
        }
    }

    pub async fn statuses(&self) -> Vec<RoleStatus> {
        let mut out = Vec::with_capacity(ManagedRole::ALL.len());
        for role in ManagedRole::ALL {
            let pid = self.status(role).await;
            out.push(RoleStatus {
                role,
                pid,
                running: pid.is_some(),
            });
        }
        out
    }

    /// Polls liveness until the process is gone or `timeout` elapses.
    async fn wait_for_exit(&self, pid: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.control.is_alive(pid) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
