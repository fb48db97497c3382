//! Remote commands for the rotation protocol
//!
//! Every path and value is shell-quoted, and values are additionally
//! escaped for the `sed` expression they end up in. Each command carries a
//! redacted rendering that is safe to print.

use chrono::{DateTime, Local};
use rekey_exec::shell_quote;

use crate::config::{REDACTED, TargetFile};
use crate::state::RotationStep;

/// A shell command plus a printable form with secrets masked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    command: String,
    redacted: String,
}

impl RemoteCommand {
    fn public(command: String) -> Self {
        Self {
            redacted: command.clone(),
            command,
        }
    }

    /// Text to execute
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Text to log
    #[must_use]
    pub fn redacted(&self) -> &str {
        &self.redacted
    }
}

/// Commands a dry run would execute on one host
#[derive(Debug, Clone)]
pub struct HostPlan {
    pub host: String,
    /// Redacted command text per step
    pub steps: Vec<(RotationStep, String)>,
}

/// Builds the backup, mutate, verify and restore commands for one target file
#[derive(Debug, Clone)]
pub struct RotationRecipe {
    target: TargetFile,
}

impl RotationRecipe {
    pub fn new(target: TargetFile) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &TargetFile {
        &self.target
    }

    /// Backup location for a run started at `at`
    #[must_use]
    pub fn backup_path(&self, at: DateTime<Local>) -> String {
        format!("{}.backup_{}", self.target.path, at.format("%Y%m%d_%H%M%S"))
    }

    /// Copy the target file to `backup_path`, keeping mode and ownership
    #[must_use]
    pub fn backup(&self, backup_path: &str) -> RemoteCommand {
        RemoteCommand::public(format!(
            "cp -p {} {}",
            shell_quote(&self.target.path),
            shell_quote(backup_path)
        ))
    }

    /// Replace every `<setting>=<old>` with `<setting>=<new>` in place
    #[must_use]
    pub fn mutate(&self) -> RemoteCommand {
        let t = &self.target;
        RemoteCommand {
            command: sed_substitute(&t.setting, &t.old_value, &t.new_value, &t.path),
            redacted: sed_substitute(&t.setting, REDACTED, REDACTED, &t.path),
        }
    }

    /// Count lines holding `<setting>=<new>`; prints a single integer
    #[must_use]
    pub fn verify(&self) -> RemoteCommand {
        let t = &self.target;
        RemoteCommand {
            command: grep_count(&t.setting, &t.new_value, &t.path),
            redacted: grep_count(&t.setting, REDACTED, &t.path),
        }
    }

    /// Copy `backup_path` back over the target file
    #[must_use]
    pub fn restore(&self, backup_path: &str) -> RemoteCommand {
        RemoteCommand::public(format!(
            "cp -p {} {}",
            shell_quote(backup_path),
            shell_quote(&self.target.path)
        ))
    }

    /// Redacted commands `host` would receive in a run started at `at`
    #[must_use]
    pub fn plan(&self, host: &str, at: DateTime<Local>) -> HostPlan {
        let backup_path = self.backup_path(at);
        let steps = [
            (RotationStep::Backup, self.backup(&backup_path)),
            (RotationStep::Mutate, self.mutate()),
            (RotationStep::Verify, self.verify()),
            (RotationStep::Rollback, self.restore(&backup_path)),
        ];

        HostPlan {
            host: host.to_string(),
            steps: steps
                .into_iter()
                .map(|(step, cmd)| (step, cmd.redacted().to_string()))
                .collect(),
        }
    }
}

fn sed_substitute(setting: &str, old: &str, new: &str, path: &str) -> String {
    let expr = format!(
        "s/{}={}/{}={}/g",
        sed_pattern_escape(setting),
        sed_pattern_escape(old),
        sed_replacement_escape(setting),
        sed_replacement_escape(new)
    );
    format!("sed -i {} {}", shell_quote(&expr), shell_quote(path))
}

fn grep_count(setting: &str, value: &str, path: &str) -> String {
    format!(
        "grep -c -F -e {} {}",
        shell_quote(&format!("{setting}={value}")),
        shell_quote(path)
    )
}

/// Escape a literal for the pattern side of a basic regular expression
fn sed_pattern_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '/' | '.' | '*' | '[' | ']' | '^' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a literal for the replacement side of `s///`
fn sed_replacement_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '/' | '&') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
