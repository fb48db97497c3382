//! Error types for rekey-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a remote host
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Server presented a host key that the policy rejects
    #[error("host key rejected for {0}")]
    HostKeyRejected(String),

    /// Connection or command timed out
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Connection not established
    #[error("not connected")]
    NotConnected,

    /// Host identifier or connection settings are unusable
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl ExecError {
    /// Whether the error came from an expired deadline
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecError::Timeout { .. })
    }
}
