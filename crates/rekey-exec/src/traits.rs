//! Remote executor trait

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandResult;

/// Something that can run a shell command on a host
///
/// A non-zero exit status is reported through `CommandResult::status`, not
/// as an error. Errors are reserved for transport problems.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command without a deadline
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError>;

    /// Run a command, failing with `ExecError::Timeout` once `timeout` elapses
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ExecError>;

    /// Release any held connection
    async fn disconnect(&self) -> Result<(), ExecError> {
        Ok(())
    }

    /// Whether a connection is currently held
    fn is_connected(&self) -> bool {
        false
    }

    /// Short name for logs
    fn executor_type(&self) -> &'static str;
}
