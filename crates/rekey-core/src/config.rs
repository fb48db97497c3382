//! Run-wide rotation configuration

use std::path::PathBuf;
use std::time::Duration;

use rekey_exec::{HostKeyPolicy, KeySource};

use crate::error::CoreError;

/// Placeholder shown instead of secret values in logs and plans
pub const REDACTED: &str = "<redacted>";

/// Remote file and the setting being rotated in it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFile {
    /// Absolute path of the configuration file on each host
    pub path: String,
    /// Setting name, matched as `<setting>=<value>`
    pub setting: String,
    /// Current secret value
    pub old_value: String,
    /// Replacement secret value
    pub new_value: String,
}

/// Immutable configuration shared by every host in a run
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Line-oriented host list
    pub hosts_file: PathBuf,
    /// Remote login user
    pub user: String,
    /// Private key used for authentication
    pub key: KeySource,
    /// SSH port used when a host entry has none
    pub port: u16,
    /// File edit recipe
    pub target: TargetFile,
    /// Bound on establishing a session
    pub connect_timeout: Duration,
    /// Bound on each remote command, connecting included
    pub command_timeout: Duration,
    /// Host key checking
    pub host_key_policy: HostKeyPolicy,
}

impl RotationConfig {
    /// Check values that would otherwise produce a broken remote command
    ///
    /// # Errors
    /// Returns `CoreError::Config` describing the first problem found
    pub fn validate(&self) -> Result<(), CoreError> {
        let target = &self.target;

        if self.user.trim().is_empty() {
            return Err(CoreError::Config("remote user is empty".to_string()));
        }
        if !target.path.starts_with('/') {
            return Err(CoreError::Config(format!(
                "target file must be an absolute path: {:?}",
                target.path
            )));
        }
        if target.setting.is_empty()
            || target
                .setting
                .chars()
                .any(|c| c == '=' || c.is_whitespace())
        {
            return Err(CoreError::Config(format!(
                "invalid setting name: {:?}",
                target.setting
            )));
        }
        if target.old_value.is_empty() || target.new_value.is_empty() {
            return Err(CoreError::Config(
                "old and new values must both be set".to_string(),
            ));
        }
        if target.old_value == target.new_value {
            return Err(CoreError::Config(
                "old and new values are identical".to_string(),
            ));
        }
        let has_newline = |v: &str| v.contains('\n') || v.contains('\r');
        if [&target.path, &target.old_value, &target.new_value]
            .into_iter()
            .any(|v| has_newline(v))
        {
            return Err(CoreError::Config(
                "target path and values may not contain line breaks".to_string(),
            ));
        }
        if self.command_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(CoreError::Config("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_config() -> RotationConfig {
        RotationConfig {
            hosts_file: PathBuf::from("servers.txt"),
            user: "splunk".to_string(),
            key: KeySource::Path(PathBuf::from("/keys/id_ed25519")),
            port: 22,
            target: TargetFile {
                path: "/opt/splunk/etc/system/local/server.conf".to_string(),
                setting: "password".to_string(),
                old_value: "XXX".to_string(),
                new_value: "YYY".to_string(),
            },
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(30),
            host_key_policy: HostKeyPolicy::AcceptAny,
        }
    }

    #[test]
    fn test_sample_is_valid() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_relative_target_rejected() {
        let mut config = sample_config();
        config.target.path = "server.conf".to_string();
        assert!(matches!(config.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn test_identical_values_rejected() {
        let mut config = sample_config();
        config.target.new_value = "XXX".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_value_rejected() {
        let mut config = sample_config();
        config.target.old_value.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_multiline_value_rejected() {
        let mut config = sample_config();
        config.target.new_value = "line1\nline2".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_setting_with_equals_rejected() {
        let mut config = sample_config();
        config.target.setting = "pass=word".to_string();
        assert!(config.validate().is_err());
    }
}
