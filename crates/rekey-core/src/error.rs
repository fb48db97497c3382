//! Core error types for rekey-core

use thiserror::Error;

use crate::state::{RotationPhase, RotationStep};

/// Errors raised while preparing or running a rotation
///
/// `Config` is fatal and stops the run before any host is touched. The
/// per-host variants are caught by the rotator and turned into audit lines.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Missing or invalid local configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Remote command could not run or exited non-zero
    #[error("failed to {step} on {host}: {reason}")]
    RemoteExecution {
        /// Host being processed
        host: String,
        /// Step that failed
        step: RotationStep,
        /// Captured stderr or transport error
        reason: String,
    },

    /// Edit did not take effect
    #[error("verification failed on {host}: {reason}")]
    Verification {
        /// Host being processed
        host: String,
        /// What the check saw
        reason: String,
    },

    /// Invalid phase transition attempted
    #[error("invalid phase transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase
        from: RotationPhase,
        /// Attempted target phase
        to: RotationPhase,
    },

    /// Local I/O failure (prompt, audit log)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}
