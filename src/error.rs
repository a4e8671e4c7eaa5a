// Error kinds for probing and process supervision.

use thiserror::Error;

use crate::models::ManagedRole;

/// Errors raised while validating or probing a destination.
///
/// None of these end a scheduling pass: the affected destination is skipped.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Empty address, or the name does not resolve.
    #[error("invalid destination '{address}': {reason}")]
    InvalidDestination { address: String, reason: String },

    /// Non-positive probe count.
    #[error("invalid parameter for '{address}': {reason}")]
    InvalidParameter { address: String, reason: String },

    /// The probe mechanism could not be invoked at all (distinct from packet loss).
    #[error("probe transport unavailable: {0}")]
    Transport(String),
}

impl ProbeError {
    pub fn invalid_destination(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDestination {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_parameter(address: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while editing the destination book.
#[derive(Debug, Error)]
pub enum BookError {
    /// Rejected entry; nothing was changed.
    #[error("{0}")]
    Invalid(String),

    #[error("encoding configuration: {0}")]
    Encode(#[from] toml::ser::Error),

    /// The file could not be written; the in-memory book is unchanged.
    #[error("writing {}: {source}", path.display())]
    Persist {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by the process supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The process is already gone. `stop` normalizes this to a stopped outcome.
    #[error("process {pid} not found")]
    ProcessNotFound { pid: u32 },

    /// Not allowed to signal the process; the role stays recorded as running.
    #[error("permission denied signalling process {pid}")]
    PermissionDenied { pid: u32 },

    /// The worker could not be launched; the role stays stopped.
    #[error("failed to spawn {role}: {source}")]
    SpawnFailure {
        role: ManagedRole,
        #[source]
        source: std::io::Error,
    },

    /// Any other signalling failure; the recorded state is left unchanged.
    #[error("failed to signal process {pid}: {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}
