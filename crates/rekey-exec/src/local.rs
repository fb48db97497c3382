//! `sh -c` executor for exercising the rotation protocol against local files
//!
//! Compiled only for tests and under the `local` feature. Host list entries
//! always go through [`SshExecutor`](crate::SshExecutor), `localhost` included.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::traits::RemoteExecutor;

/// Runs commands in a local shell as the current user
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

#[async_trait]
impl RemoteExecutor for LocalExecutor {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let started = Instant::now();
        // secrets ride in the command text
        debug!(command_len = cmd.len(), "running local shell command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExecError::SpawnError(e.to_string()))?;

        Ok(CommandResult {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: started.elapsed(),
        })
    }

    async fn run_with_timeout(
        &self,
        cmd: &str,
        limit: Duration,
    ) -> Result<CommandResult, ExecError> {
        tokio::time::timeout(limit, self.run(cmd))
            .await
            .map_err(|_| {
                warn!(timeout = ?limit, "local command timed out");
                ExecError::Timeout { timeout: limit }
            })?
    }

    fn executor_type(&self) -> &'static str {
        "local"
    }
}
