//! Configuration loading and types
//!
//! Values come from `rekey.toml` and are overridden by command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use eyre::WrapErr;
use rekey_core::{RotationConfig, TargetFile};
use rekey_exec::{HostKeyPolicy, KeySource};
use serde::{Deserialize, Serialize};

/// Top-level configuration for a rotation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host list, one host per line
    #[serde(default = "default_hosts_file")]
    pub hosts_file: PathBuf,
    /// Directory receiving the per-run audit log
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Connection settings
    #[serde(default)]
    pub ssh: SshSettings,
    /// File and setting to rotate
    #[serde(default)]
    pub target: TargetSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hosts_file: default_hosts_file(),
            log_dir: default_log_dir(),
            log_level: default_log_level(),
            ssh: SshSettings::default(),
            target: TargetSettings::default(),
        }
    }
}

/// SSH connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    /// Remote login user
    #[serde(default = "default_user")]
    pub user: String,
    /// Private key file
    pub key: Option<PathBuf>,
    /// Environment variable holding a base64 private key
    pub key_env: Option<String>,
    /// Port for entries without one
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default)]
    pub host_key_policy: HostKeyCheck,
    /// known_hosts file for `known-hosts` policy (default `~/.ssh/known_hosts`)
    pub known_hosts: Option<PathBuf>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: default_user(),
            key: None,
            key_env: None,
            port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            host_key_policy: HostKeyCheck::default(),
            known_hosts: None,
        }
    }
}

/// Host key checking mode as written in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyCheck {
    #[default]
    AcceptAny,
    KnownHosts,
}

/// File and setting to rotate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Absolute path of the remote file
    pub file: Option<String>,
    /// Setting name, matched as `<setting>=<value>`
    #[serde(default = "default_setting")]
    pub setting: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            file: None,
            setting: default_setting(),
            old_value: None,
            new_value: None,
        }
    }
}

fn default_hosts_file() -> PathBuf {
    PathBuf::from("servers.txt")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    30
}

fn default_setting() -> String {
    "password".to_string()
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default, Args)]
pub struct Overrides {
    /// Host list file
    #[arg(long = "hosts", value_name = "FILE")]
    pub hosts_file: Option<PathBuf>,

    /// Remote login user
    #[arg(long)]
    pub user: Option<String>,

    /// Private key file
    #[arg(long, value_name = "FILE")]
    pub key: Option<PathBuf>,

    /// SSH port for hosts without an explicit one
    #[arg(long)]
    pub port: Option<u16>,

    /// Remote configuration file to edit
    #[arg(long = "target-file", value_name = "PATH")]
    pub target_file: Option<String>,

    /// Setting name holding the secret
    #[arg(long)]
    pub setting: Option<String>,

    /// Current secret value
    #[arg(long, env = "REKEY_OLD_VALUE", hide_env_values = true)]
    pub old_value: Option<String>,

    /// Replacement secret value
    #[arg(long, env = "REKEY_NEW_VALUE", hide_env_values = true)]
    pub new_value: Option<String>,

    /// Directory for the audit log
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Host key checking mode
    #[arg(long, value_enum)]
    pub host_key_policy: Option<HostKeyCheck>,

    /// known_hosts file used with `--host-key-policy known-hosts`
    #[arg(long, value_name = "FILE")]
    pub known_hosts: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Load from an explicit path, `REKEY_CONFIG`, or the default locations
    ///
    /// Returns the path used, or `None` when falling back to defaults.
    ///
    /// # Errors
    /// Returns error if a found file cannot be read or parsed
    pub fn load_default(explicit: Option<&Path>) -> eyre::Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        if let Ok(path) = std::env::var("REKEY_CONFIG") {
            let path = PathBuf::from(path);
            return Ok((Self::load(&path)?, Some(path)));
        }

        let mut paths = vec![
            PathBuf::from("rekey.toml"),
            PathBuf::from("/etc/rekey/rekey.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("rekey/rekey.toml"));
        }

        for path in paths {
            if path.exists() {
                return Ok((Self::load(&path)?, Some(path)));
            }
        }

        Ok((Config::default(), None))
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.hosts_file {
            self.hosts_file = v;
        }
        if let Some(v) = overrides.log_dir {
            self.log_dir = v;
        }
        if let Some(v) = overrides.user {
            self.ssh.user = v;
        }
        if let Some(v) = overrides.key {
            self.ssh.key = Some(v);
            self.ssh.key_env = None;
        }
        if let Some(v) = overrides.port {
            self.ssh.port = v;
        }
        if let Some(v) = overrides.host_key_policy {
            self.ssh.host_key_policy = v;
        }
        if let Some(v) = overrides.known_hosts {
            self.ssh.known_hosts = Some(v);
        }
        if let Some(v) = overrides.target_file {
            self.target.file = Some(v);
        }
        if let Some(v) = overrides.setting {
            self.target.setting = v;
        }
        if let Some(v) = overrides.old_value {
            self.target.old_value = Some(v);
        }
        if let Some(v) = overrides.new_value {
            self.target.new_value = Some(v);
        }
    }

    /// Build the immutable run configuration
    ///
    /// # Errors
    /// Returns error if a required value is missing or fails validation
    pub fn to_rotation(&self) -> eyre::Result<RotationConfig> {
        let key = match (&self.ssh.key, &self.ssh.key_env) {
            (Some(path), _) => KeySource::Path(path.clone()),
            (None, Some(var)) => KeySource::Env(var.clone()),
            (None, None) => eyre::bail!("no private key configured (set ssh.key or --key)"),
        };

        let host_key_policy = match self.ssh.host_key_policy {
            HostKeyCheck::AcceptAny => HostKeyPolicy::AcceptAny,
            HostKeyCheck::KnownHosts => {
                let path = self
                    .ssh
                    .known_hosts
                    .clone()
                    .or_else(|| dirs::home_dir().map(|h| h.join(".ssh/known_hosts")))
                    .ok_or_else(|| eyre::eyre!("cannot locate known_hosts file"))?;
                HostKeyPolicy::KnownHosts(path)
            }
        };

        let rotation = RotationConfig {
            hosts_file: self.hosts_file.clone(),
            user: self.ssh.user.clone(),
            key,
            port: self.ssh.port,
            target: TargetFile {
                path: required(&self.target.file, "target file (target.file or --target-file)")?,
                setting: self.target.setting.clone(),
                old_value: required(&self.target.old_value, "old value (--old-value)")?,
                new_value: required(&self.target.new_value, "new value (--new-value)")?,
            },
            connect_timeout: Duration::from_secs(self.ssh.connect_timeout_secs),
            command_timeout: Duration::from_secs(self.ssh.command_timeout_secs),
            host_key_policy,
        };

        rotation.validate()?;
        Ok(rotation)
    }
}

fn required(value: &Option<String>, what: &str) -> eyre::Result<String> {
    value
        .clone()
        .ok_or_else(|| eyre::eyre!("missing {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
hosts_file = "fleet/servers.txt"
log_dir = "logs"

[ssh]
user = "splunk"
key = "/keys/id_ed25519"
port = 2222
command_timeout_secs = 60
host_key_policy = "known-hosts"
known_hosts = "/etc/ssh/ssh_known_hosts"

[target]
file = "/opt/splunk/etc/system/local/server.conf"
old_value = "XXX"
new_value = "YYY"
"#;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.hosts_file, PathBuf::from("servers.txt"));
        assert_eq!(config.ssh.user, "root");
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.ssh.connect_timeout_secs, 5);
        assert_eq!(config.ssh.command_timeout_secs, 30);
        assert_eq!(config.ssh.host_key_policy, HostKeyCheck::AcceptAny);
        assert_eq!(config.target.setting, "password");
    }

    #[test]
    fn test_parse_full_file() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        let rotation = config.to_rotation().unwrap();

        assert_eq!(rotation.hosts_file, PathBuf::from("fleet/servers.txt"));
        assert_eq!(rotation.user, "splunk");
        assert_eq!(rotation.port, 2222);
        assert_eq!(rotation.key, KeySource::Path(PathBuf::from("/keys/id_ed25519")));
        assert_eq!(rotation.command_timeout, Duration::from_secs(60));
        assert_eq!(rotation.connect_timeout, Duration::from_secs(5));
        assert_eq!(
            rotation.host_key_policy,
            HostKeyPolicy::KnownHosts(PathBuf::from("/etc/ssh/ssh_known_hosts"))
        );
        assert_eq!(rotation.target.setting, "password");
    }

    #[test]
    fn test_overrides_win() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.apply(Overrides {
            user: Some("admin".to_string()),
            new_value: Some("ZZZ".to_string()),
            host_key_policy: Some(HostKeyCheck::AcceptAny),
            ..Overrides::default()
        });

        let rotation = config.to_rotation().unwrap();
        assert_eq!(rotation.user, "admin");
        assert_eq!(rotation.target.new_value, "ZZZ");
        assert_eq!(rotation.target.old_value, "XXX");
        assert_eq!(rotation.host_key_policy, HostKeyPolicy::AcceptAny);
    }

    #[test]
    fn test_key_flag_replaces_env_key() {
        let mut config = Config::default();
        config.ssh.key_env = Some("SSH_KEY_B64".to_string());
        config.apply(Overrides {
            key: Some(PathBuf::from("/keys/other")),
            ..Overrides::default()
        });
        assert_eq!(config.ssh.key, Some(PathBuf::from("/keys/other")));
        assert!(config.ssh.key_env.is_none());
    }

    #[test]
    fn test_missing_values_reported() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.target.new_value = None;
        let err = config.to_rotation().unwrap_err();
        assert!(err.to_string().contains("new value"));
    }

    #[test]
    fn test_missing_key_reported() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.ssh.key = None;
        assert!(config.to_rotation().is_err());
    }

    #[test]
    fn test_validation_runs() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        config.target.new_value = Some("XXX".to_string());
        assert!(config.to_rotation().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rekey.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let (config, source) = Config::load_default(Some(&path)).unwrap();
        assert_eq!(source, Some(path));
        assert_eq!(config.ssh.user, "splunk");
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rekey.toml");
        std::fs::write(&path, "[ssh\nuser = ").unwrap();
        assert!(Config::load(&path).is_err());
    }
}
