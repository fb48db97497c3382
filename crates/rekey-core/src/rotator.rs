//! Fleet rotation orchestration
//!
//! Hosts are processed one at a time in list order. Per host:
//! backup, mutate, verify, and on a failed verification a best-effort
//! restore of the backup taken in the first step.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use rekey_exec::{RemoteExecutor, RemoteOutput, run_remote_command};
use tracing::{error, info, instrument, warn};

use crate::audit::AuditLog;
use crate::config::RotationConfig;
use crate::error::CoreError;
use crate::factory::ExecutorFactory;
use crate::hosts::load_hosts;
use crate::prompt::Confirm;
use crate::recipe::{RemoteCommand, RotationRecipe};
use crate::state::{HostOutcome, RotationJob, RotationPhase, RotationStep};
use crate::summary::RunSummary;

/// Result of [`Rotator::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Operator declined; no host was touched
    Cancelled,
    /// Every host was attempted
    Completed(RunSummary),
}

/// Check local prerequisites and load the host list
///
/// Nothing remote happens before this succeeds.
///
/// # Errors
/// Returns `CoreError::Config` if the configuration is invalid, or the host
/// list or private key is missing
pub fn preflight(config: &RotationConfig) -> Result<Vec<String>, CoreError> {
    config.validate()?;
    let hosts = load_hosts(&config.hosts_file)?;
    config
        .key
        .ensure_present()
        .map_err(|e| CoreError::Config(format!("key file {}: {e}", config.key)))?;
    Ok(hosts)
}

/// Drives the rotation protocol across a host list
pub struct Rotator {
    recipe: RotationRecipe,
    command_timeout: Duration,
    factory: Arc<dyn ExecutorFactory>,
    audit: AuditLog,
}

impl Rotator {
    pub fn new(config: &RotationConfig, factory: Arc<dyn ExecutorFactory>, audit: AuditLog) -> Self {
        Self {
            recipe: RotationRecipe::new(config.target.clone()),
            command_timeout: config.command_timeout,
            factory,
            audit,
        }
    }

    /// Confirm with the operator, then rotate every host in order
    ///
    /// Per-host failures are counted, never returned.
    ///
    /// # Errors
    /// Returns `CoreError::Io` only if the confirmation cannot be read
    pub async fn run(
        &self,
        hosts: &[String],
        confirm: &mut dyn Confirm,
    ) -> Result<RunOutcome, CoreError> {
        let mut summary = RunSummary::start(Local::now());
        let target = self.recipe.target();

        self.audit.progress("=== Config Rotation ===");
        self.audit.info(format!("Start time: {}", summary.start_time));
        self.audit.info(format!("Config file: {}", target.path));
        self.audit
            .info(format!("Replacing value of: {}", target.setting));
        self.audit
            .info(format!("Total servers to process: {}", hosts.len()));

        if !confirm.confirm(hosts.len())? {
            self.audit.progress("Update cancelled");
            info!("rotation cancelled by operator");
            return Ok(RunOutcome::Cancelled);
        }

        for host in hosts {
            let outcome = self.rotate_host(host).await;
            summary.record(outcome);
        }

        summary.finish(Local::now());

        self.audit.progress("=== Update Summary ===");
        self.audit.info(format!("Total processed: {}", summary.total));
        self.audit.success(format!("Successful: {}", summary.succeeded));
        self.audit.failure(format!("Failed: {}", summary.failed));
        if let Some(end) = summary.end_time {
            self.audit.info(format!("End time: {end}"));
        }

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "rotation run finished"
        );

        Ok(RunOutcome::Completed(summary))
    }

    /// Rotate a single host; every failure ends in `HostOutcome::Failed`
    #[instrument(skip(self))]
    pub async fn rotate_host(&self, host: &str) -> HostOutcome {
        let mut job = RotationJob::new(host);
        self.audit.progress(format!("Processing: {host}"));

        let executor = match self.factory.create_executor(host).await {
            Ok(executor) => executor,
            Err(e) => {
                let err = CoreError::RemoteExecution {
                    host: host.to_string(),
                    step: RotationStep::Connect,
                    reason: e.to_string(),
                };
                return self.finish_failed(&mut job, &err);
            }
        };

        let result = self.drive(&mut job, executor.as_ref()).await;

        if let Err(e) = executor.disconnect().await {
            warn!(host, error = %e, "disconnect failed");
        }

        match result {
            Ok(()) => {
                self.audit.success(format!("  ✓ Successfully updated ({})", job.detail));
                info!(host, phase = %job.phase, "host rotated");
                job.outcome()
            }
            Err(e) => self.finish_failed(&mut job, &e),
        }
    }

    fn finish_failed(&self, job: &mut RotationJob, err: &CoreError) -> HostOutcome {
        job.fail(err.to_string());
        self.audit.failure(format!("  ✗ {err}"));
        error!(host = %job.host, phase = %job.phase, error = %err, "host rotation failed");
        job.outcome()
    }

    async fn drive(
        &self,
        job: &mut RotationJob,
        executor: &dyn RemoteExecutor,
    ) -> Result<(), CoreError> {
        let host = job.host.clone();

        self.audit.progress("  Creating backup...");
        let backup_path = self.recipe.backup_path(Local::now());
        let out = self
            .exec(executor, &host, RotationStep::Backup, &self.recipe.backup(&backup_path))
            .await;
        if !out.succeeded {
            return Err(remote_error(&host, RotationStep::Backup, &out));
        }
        job.backup_path = Some(backup_path.clone());
        job.advance(RotationPhase::BackedUp, format!("backup at {backup_path}"))?;

        self.audit
            .progress(format!("  Updating {}...", self.recipe.target().setting));
        let out = self
            .exec(executor, &host, RotationStep::Mutate, &self.recipe.mutate())
            .await;
        if !out.succeeded {
            // the edit never reported success, so the file is left as is
            return Err(remote_error(&host, RotationStep::Mutate, &out));
        }
        job.advance(RotationPhase::Updated, "substitution applied")?;

        self.audit.progress("  Verifying change...");
        let out = self
            .exec(executor, &host, RotationStep::Verify, &self.recipe.verify())
            .await;
        match verified_count(&out) {
            Some(count) => {
                job.advance(RotationPhase::Verified, format!("{count} occurrence(s)"))?;
                Ok(())
            }
            None => {
                self.audit.failure("  ✗ Verification failed - restoring backup");
                self.rollback(job, executor, &backup_path).await;
                Err(CoreError::Verification {
                    host,
                    reason: verification_reason(&out),
                })
            }
        }
    }

    /// Best-effort restore: outcome is logged, never escalated
    async fn rollback(&self, job: &mut RotationJob, executor: &dyn RemoteExecutor, backup_path: &str) {
        let out = self
            .exec(
                executor,
                &job.host,
                RotationStep::Rollback,
                &self.recipe.restore(backup_path),
            )
            .await;

        if out.succeeded {
            self.audit.progress(format!("  Backup restored from {backup_path}"));
            if let Err(e) = job.advance(RotationPhase::RolledBack, "backup restored") {
                warn!(host = %job.host, error = %e, "unexpected phase during rollback");
            }
        } else {
            let err = remote_error(&job.host, RotationStep::Rollback, &out);
            self.audit.failure(format!("  ✗ Rollback failed: {}", out.stderr.trim()));
            warn!(host = %job.host, error = %err, "rollback failed");
        }
    }

    async fn exec(
        &self,
        executor: &dyn RemoteExecutor,
        host: &str,
        step: RotationStep,
        command: &RemoteCommand,
    ) -> RemoteOutput {
        info!(host, step = %step, command = %command.redacted(), "running remote step");
        run_remote_command(executor, command.command(), self.command_timeout).await
    }
}

/// Positive integer count from the verify step, or `None` for any failure
fn verified_count(out: &RemoteOutput) -> Option<u64> {
    if !out.succeeded {
        return None;
    }
    let raw = out.stdout.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<u64>().ok().filter(|&count| count > 0)
}

fn verification_reason(out: &RemoteOutput) -> String {
    if out.succeeded {
        format!("unexpected count {:?}", out.stdout.trim())
    } else if out.stdout.trim() == "0" {
        "new value not found".to_string()
    } else if out.stderr.trim().is_empty() {
        "verify command failed".to_string()
    } else {
        out.stderr.trim().to_string()
    }
}

fn remote_error(host: &str, step: RotationStep, out: &RemoteOutput) -> CoreError {
    let stderr = out.stderr.trim();
    CoreError::RemoteExecution {
        host: host.to_string(),
        step,
        reason: if stderr.is_empty() {
            "command exited non-zero".to_string()
        } else {
            stderr.to_string()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(succeeded: bool, stdout: &str) -> RemoteOutput {
        RemoteOutput {
            succeeded,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[test]
    fn test_positive_count_verifies() {
        assert_eq!(verified_count(&output(true, "3\n")), Some(3));
        assert_eq!(verified_count(&output(true, " 1 ")), Some(1));
    }

    #[test]
    fn test_zero_or_garbage_fails_verification() {
        assert_eq!(verified_count(&output(true, "0\n")), None);
        assert_eq!(verified_count(&output(true, "")), None);
        assert_eq!(verified_count(&output(true, "two")), None);
        assert_eq!(verified_count(&output(true, "+4")), None);
        assert_eq!(verified_count(&output(true, "-1")), None);
    }

    #[test]
    fn test_failed_command_fails_verification() {
        assert_eq!(verified_count(&output(false, "5")), None);
    }

    #[test]
    fn test_grep_zero_exit_reason() {
        // grep -c prints 0 and exits 1 when nothing matches
        assert_eq!(verification_reason(&output(false, "0\n")), "new value not found");
        assert_eq!(
            verification_reason(&output(true, "abc")),
            "unexpected count \"abc\""
        );
    }

    #[test]
    fn test_remote_error_falls_back_to_generic_reason() {
        let err = remote_error("h2", RotationStep::Backup, &output(false, ""));
        assert_eq!(
            err.to_string(),
            "failed to create backup on h2: command exited non-zero"
        );
    }
}
