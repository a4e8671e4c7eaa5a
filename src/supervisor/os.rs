// Real processes: tokio::process for launching, kill(2) for signals.
// Children we launched are kept so exited ones are reaped via try_wait
// (a zombie still accepts signals and would otherwise look alive).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Mutex, PoisonError};

use tokio::process::{Child, Command};

use super::{ProcessControl, RoleCommand, StopSignal};
use crate::error::SupervisorError;
use crate::models::ManagedRole;

#[derive(Default)]
pub struct OsProcessControl {
    children: Mutex<HashMap<u32, Child>>,
}

impl OsProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(alive)` for a child we launched, `None` for a foreign pid.
    fn poll_child(&self, pid: u32) -> Option<bool> {
        let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
        let child = children.get_mut(&pid)?;
        match child.try_wait() {
            Ok(None) => Some(true),
            Ok(Some(status)) => {
                tracing::debug!(pid, %status, "child exited");
                children.remove(&pid);
                Some(false)
            }
            Err(e) => {
                tracing::warn!(pid, error = %e, "try_wait failed; forgetting child");
                children.remove(&pid);
                Some(false)
            }
        }
    }
}

impl ProcessControl for OsProcessControl {
    fn spawn(&self, role: ManagedRole, command: &RoleCommand) -> Result<u32, SupervisorError> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| SupervisorError::SpawnFailure { role, source })?;

        let pid = child.id().ok_or_else(|| SupervisorError::SpawnFailure {
            role,
            source: std::io::Error::other("process exited before its pid was read"),
        })?;

        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid, child);
        Ok(pid)
    }

    #[cfg(unix)]
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<(), SupervisorError> {
        let raw = match libc::pid_t::try_from(pid) {
            Ok(raw) if raw > 0 => raw,
            _ => return Err(SupervisorError::ProcessNotFound { pid }),
        };
        let signo = match signal {
            StopSignal::Graceful => libc::SIGTERM,
            StopSignal::Forced => libc::SIGKILL,
        };
        // SAFETY: kill(2) takes plain integers; raw > 0 targets exactly one process.
        if unsafe { libc::kill(raw, signo) } == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        Err(match err.raw_os_error() {
            Some(libc::ESRCH) => SupervisorError::ProcessNotFound { pid },
            Some(libc::EPERM) => SupervisorError::PermissionDenied { pid },
            _ => SupervisorError::Signal { pid, source: err },
        })
    }

    // No graceful signal off Unix: both steps terminate our own child.
    #[cfg(not(unix))]
    fn signal(&self, pid: u32, _signal: StopSignal) -> Result<(), SupervisorError> {
        let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(child) = children.get_mut(&pid) else {
            return Err(SupervisorError::ProcessNotFound { pid });
        };
        child.start_kill().map_err(|source| match source.kind() {
            std::io::ErrorKind::PermissionDenied => SupervisorError::PermissionDenied { pid },
            _ => SupervisorError::Signal { pid, source },
        })
    }

    fn is_alive(&self, pid: u32) -> bool {
        if let Some(alive) = self.poll_child(pid) {
            return alive;
        }
        foreign_pid_alive(pid)
    }
}

#[cfg(unix)]
fn foreign_pid_alive(pid: u32) -> bool {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    // SAFETY: signal 0 only performs the existence/permission check.
    if unsafe { libc::kill(raw, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn foreign_pid_alive(_pid: u32) -> bool {
    false
}
