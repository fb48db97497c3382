//! SSH command execution using russh crate

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::keys::{PrivateKeyWithHashAlg, check_known_hosts_path, load_secret_key};
use russh::{ChannelMsg, Disconnect, client};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ExecError;
use crate::keys::ResolvedKey;
use crate::result::{CommandResult, ConnectionInfo};
use crate::traits::RemoteExecutor;

/// Default bound on TCP connect plus SSH handshake and authentication
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How server host keys are checked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any key, like `StrictHostKeyChecking=no`.
    ///
    /// Leaves the connection open to impersonation; only for fleets where
    /// host keys are not distributed.
    #[default]
    AcceptAny,
    /// Require the key to be listed in this known_hosts file
    KnownHosts(PathBuf),
}

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler {
    policy: HostKeyPolicy,
    host: String,
    port: u16,
}

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.policy {
            HostKeyPolicy::AcceptAny => Ok(true),
            HostKeyPolicy::KnownHosts(path) => {
                match check_known_hosts_path(&self.host, self.port, server_public_key, path) {
                    Ok(known) => {
                        if !known {
                            warn!(host = %self.host, "host key not present in known_hosts");
                        }
                        Ok(known)
                    }
                    Err(e) => {
                        error!(host = %self.host, error = %e, "host key verification failed");
                        Ok(false)
                    }
                }
            }
        }
    }
}

/// SSH command executor
///
/// Manages one SSH session per host. The connection is established on first
/// use and kept until [`RemoteExecutor::disconnect`].
pub struct SshExecutor {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// Resolved SSH key
    key: Arc<ResolvedKey>,
    /// Host key checking
    host_key_policy: HostKeyPolicy,
    /// Bound on establishing the session
    connect_timeout: Duration,
    /// SSH session (initialized on first use)
    session: Mutex<Option<client::Handle<SshClientHandler>>>,
}

impl std::fmt::Debug for SshExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshExecutor")
            .field("conn_info", &self.conn_info)
            .field("key", &self.key)
            .field("host_key_policy", &self.host_key_policy)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SshExecutor {
    /// Create a new SSH executor from an already resolved key
    ///
    /// Sharing the `ResolvedKey` lets a whole run reuse one decoded key.
    pub fn new(conn_info: ConnectionInfo, key: Arc<ResolvedKey>) -> Self {
        Self {
            conn_info,
            key,
            host_key_policy: HostKeyPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            session: Mutex::new(None),
        }
    }

    /// Host, port and user this executor connects to
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.conn_info
    }

    /// Connect and authenticate, bounded by the connect timeout
    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn connect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if session_lock.is_some() {
            return Ok(());
        }

        info!(
            host = %self.conn_info.host,
            port = self.conn_info.port,
            user = %self.conn_info.user,
            "connecting to SSH"
        );

        let session = timeout(self.connect_timeout, self.establish())
            .await
            .map_err(|_| {
                warn!(host = %self.conn_info.host, timeout = ?self.connect_timeout, "connect timed out");
                ExecError::Timeout {
                    timeout: self.connect_timeout,
                }
            })??;

        info!(host = %self.conn_info.host, "SSH connected and authenticated");

        *session_lock = Some(session);
        Ok(())
    }

    async fn establish(&self) -> Result<client::Handle<SshClientHandler>, ExecError> {
        let config = Arc::new(client::Config::default());

        let handler = SshClientHandler {
            policy: self.host_key_policy.clone(),
            host: self.conn_info.host.clone(),
            port: self.conn_info.port,
        };

        let mut session = client::connect(
            config,
            (&self.conn_info.host[..], self.conn_info.port),
            handler,
        )
        .await
        .map_err(|e| match e {
            russh::Error::UnknownKey => ExecError::HostKeyRejected(self.conn_info.host.clone()),
            other => ExecError::ConnectionFailed(other.to_string()),
        })?;

        let key_pair = load_secret_key(self.key.path(), None)
            .map_err(|e| ExecError::SshKeyError(e.to_string()))?;

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let auth_res = session
            .authenticate_publickey(
                &self.conn_info.user,
                PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
            )
            .await
            .map_err(|e| ExecError::AuthenticationFailed(e.to_string()))?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed(
                "public key authentication failed".to_string(),
            ));
        }

        Ok(session)
    }

    /// Execute command on the open session
    #[instrument(skip_all, fields(host = %self.conn_info.host))]
    async fn execute_remote(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        let mut session_lock = self.session.lock().await;

        let session = session_lock.as_mut().ok_or(ExecError::NotConnected)?;

        debug!(command_len = cmd.len(), "executing remote command");

        let start = Instant::now();

        let mut channel = session
            .channel_open_session()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        channel
            .exec(true, cmd)
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let mut status = -1;
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        // exit-status may arrive after EOF, so drain until the channel closes
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { data } => {
                    stdout.extend_from_slice(&data);
                }
                ChannelMsg::ExtendedData { data, ext } => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => {
                    status = exit_status.cast_signed();
                }
                _ => {}
            }
        }

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&stdout).to_string();
        let stderr = String::from_utf8_lossy(&stderr).to_string();

        debug!(status, duration = ?duration, "remote command completed");

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }
}

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn run(&self, cmd: &str) -> Result<CommandResult, ExecError> {
        self.connect().await?;
        self.execute_remote(cmd).await
    }

    /// The deadline covers connecting as well as running the command.
    async fn run_with_timeout(
        &self,
        cmd: &str,
        timeout_duration: Duration,
    ) -> Result<CommandResult, ExecError> {
        let start = Instant::now();

        match timeout(timeout_duration, self.run(cmd)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    host = %self.conn_info.host,
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.conn_info.host, "SSH disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        // try_lock fails while a command holds the session, which implies connected
        self.session
            .try_lock()
            .map(|s| s.is_some())
            .unwrap_or(true)
    }

    fn executor_type(&self) -> &'static str {
        "ssh"
    }
}

/// Builder for `SshExecutor`
pub struct SshExecutorBuilder {
    conn_info: ConnectionInfo,
    key: Option<Arc<ResolvedKey>>,
    host_key_policy: HostKeyPolicy,
    connect_timeout: Duration,
}

impl SshExecutorBuilder {
    /// Create builder from parsed connection info
    pub fn from_connection(conn_info: ConnectionInfo) -> Self {
        Self {
            conn_info,
            key: None,
            host_key_policy: HostKeyPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Reuse a key that was already resolved
    #[must_use]
    pub fn with_resolved_key(mut self, key: Arc<ResolvedKey>) -> Self {
        self.key = Some(key);
        self
    }

    /// Set host key policy
    #[must_use]
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Set connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Build the executor
    ///
    /// # Errors
    /// Returns `ExecError::SshKeyError` if no key was given
    pub fn build(self) -> Result<SshExecutor, ExecError> {
        let key = self
            .key
            .ok_or_else(|| ExecError::SshKeyError("no private key configured".to_string()))?;

        let mut executor = SshExecutor::new(self.conn_info, key);
        executor.host_key_policy = self.host_key_policy;
        executor.connect_timeout = self.connect_timeout;
        Ok(executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> (tempfile::NamedTempFile, Arc<ResolvedKey>) {
        let file = tempfile::NamedTempFile::new().unwrap();
        let key = Arc::new(ResolvedKey::Path(file.path().to_path_buf()));
        (file, key)
    }

    #[test]
    fn test_builder_requires_key() {
        let result =
            SshExecutorBuilder::from_connection(ConnectionInfo::new("web1", "deploy")).build();
        assert!(matches!(result, Err(ExecError::SshKeyError(_))));
    }

    #[test]
    fn test_builder_applies_settings() {
        let (_file, key) = test_key();
        let conn_info = ConnectionInfo::parse("web1:2222", "deploy", 22).unwrap();
        let executor = SshExecutorBuilder::from_connection(conn_info)
            .with_resolved_key(key)
            .with_connect_timeout(Duration::from_secs(2))
            .with_host_key_policy(HostKeyPolicy::KnownHosts(PathBuf::from("/tmp/kh")))
            .build()
            .unwrap();

        assert_eq!(executor.conn_info.port, 2222);
        assert_eq!(executor.connect_timeout, Duration::from_secs(2));
        assert_eq!(
            executor.host_key_policy,
            HostKeyPolicy::KnownHosts(PathBuf::from("/tmp/kh"))
        );
        assert!(!executor.is_connected());
        assert_eq!(executor.executor_type(), "ssh");
    }

    #[tokio::test]
    async fn test_unreachable_host_fails_without_hanging() {
        let (_file, key) = test_key();
        // TEST-NET-1, never routed
        let conn_info = ConnectionInfo::new("192.0.2.1", "deploy");
        let executor = SshExecutorBuilder::from_connection(conn_info)
            .with_resolved_key(key)
            .with_connect_timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        let result = executor
            .run_with_timeout("true", Duration::from_secs(2))
            .await;
        assert!(result.is_err());
        assert!(!executor.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_without_session_is_noop() {
        let (_file, key) = test_key();
        let executor = SshExecutor::new(ConnectionInfo::new("web1", "deploy"), key);
        assert!(executor.disconnect().await.is_ok());
    }
}
