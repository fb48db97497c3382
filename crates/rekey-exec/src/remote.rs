//! Non-raising command execution
//!
//! Collapses every transport outcome into a [`RemoteOutput`], so a broken
//! host shows up as data instead of an error that would abort a batch.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::traits::RemoteExecutor;

/// stderr text reported when a connection or command deadline expires
pub const CONNECTION_TIMEOUT_MESSAGE: &str = "Connection timeout";

/// Flattened outcome of a remote command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteOutput {
    /// Command ran and exited 0
    pub succeeded: bool,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr, or a description of the transport failure
    pub stderr: String,
}

impl RemoteOutput {
    /// Failed outcome carrying only an error message
    pub fn failure(stderr: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Run `cmd` through `executor` under `timeout`
///
/// Never fails: a timeout becomes `stderr = "Connection timeout"`, any other
/// transport error becomes its display text, and a non-zero exit status
/// yields `succeeded = false` with the captured output.
pub async fn run_remote_command(
    executor: &dyn RemoteExecutor,
    cmd: &str,
    timeout: Duration,
) -> RemoteOutput {
    match executor.run_with_timeout(cmd, timeout).await {
        Ok(result) => {
            debug!(
                status = result.status,
                duration = ?result.duration,
                executor = executor.executor_type(),
                "remote command finished"
            );
            RemoteOutput {
                succeeded: result.success(),
                stdout: result.stdout,
                stderr: result.stderr,
            }
        }
        Err(e) if e.is_timeout() => {
            warn!(timeout = ?timeout, "remote command timed out");
            RemoteOutput::failure(CONNECTION_TIMEOUT_MESSAGE)
        }
        Err(e) => {
            warn!(error = %e, "remote command could not be executed");
            RemoteOutput::failure(e.to_string())
        }
    }
}
