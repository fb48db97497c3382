//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecError;
use crate::quote::validate_host;

/// Result of a command execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    pub duration: Duration,
}

impl CommandResult {
    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Connection information for SSH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Host address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username
    pub user: String,
}

fn default_port() -> u16 {
    22
}

impl ConnectionInfo {
    /// Create new connection info
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
        }
    }

    /// Parse a host list entry into connection info
    ///
    /// Accepts `host`, `host:port` and `[v6addr]:port`. A bare IPv6 address
    /// (more than one colon, no brackets) keeps `default_port`.
    ///
    /// # Errors
    /// Returns `ExecError::InvalidTarget` if the host part fails validation
    /// or the port is not a number
    pub fn parse(
        target: &str,
        user: impl Into<String>,
        default_port: u16,
    ) -> Result<Self, ExecError> {
        let (host, port) = split_host_port(target)?;
        validate_host(host)?;

        let mut info = Self::new(host, user);
        info.port = port.unwrap_or(default_port);
        Ok(info)
    }
}

fn split_host_port(target: &str) -> Result<(&str, Option<u16>), ExecError> {
    let parse_port = |raw: &str| {
        raw.parse::<u16>()
            .map_err(|_| ExecError::InvalidTarget(format!("bad port in {target:?}")))
    };

    if let Some(rest) = target.strip_prefix('[') {
        let (host, tail) = rest
            .split_once(']')
            .ok_or_else(|| ExecError::InvalidTarget(format!("unclosed bracket in {target:?}")))?;
        return match tail.strip_prefix(':') {
            Some(port) => Ok((host, Some(parse_port(port)?))),
            None if tail.is_empty() => Ok((host, None)),
            None => Err(ExecError::InvalidTarget(format!(
                "unexpected text after address in {target:?}"
            ))),
        };
    }

    match target.matches(':').count() {
        1 => {
            let (host, port) = target.split_once(':').unwrap_or((target, ""));
            Ok((host, Some(parse_port(port)?)))
        }
        _ => Ok((target, None)),
    }
}
