//! Executor factory: one transport per host

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rekey_exec::{
    ConnectionInfo, ExecError, HostKeyPolicy, RemoteExecutor, ResolvedKey, SshExecutor,
    SshExecutorBuilder,
};
use tracing::debug;

use crate::config::RotationConfig;
use crate::error::CoreError;

/// Creates the executor used for a host entry
#[async_trait]
pub trait ExecutorFactory: Send + Sync {
    /// Build an executor for `host` as written in the host list
    async fn create_executor(&self, host: &str) -> Result<Arc<dyn RemoteExecutor>, ExecError>;
}

/// SSH executors sharing one resolved private key
#[derive(Debug)]
pub struct SshExecutorFactory {
    user: String,
    port: u16,
    key: Arc<ResolvedKey>,
    host_key_policy: HostKeyPolicy,
    connect_timeout: Duration,
}

impl SshExecutorFactory {
    /// Resolve the configured key once for the whole run
    ///
    /// # Errors
    /// Returns `CoreError::Config` if the key cannot be resolved
    pub fn from_config(config: &RotationConfig) -> Result<Self, CoreError> {
        let key = config
            .key
            .resolve()
            .map_err(|e| CoreError::Config(format!("private key {}: {e}", config.key)))?;

        Ok(Self {
            user: config.user.clone(),
            port: config.port,
            key: Arc::new(key),
            host_key_policy: config.host_key_policy.clone(),
            connect_timeout: config.connect_timeout,
        })
    }

    /// SSH executor for a host list entry, `localhost` included
    ///
    /// # Errors
    /// Returns `ExecError::InvalidTarget` if the entry is not a valid host
    pub fn ssh_executor(&self, host: &str) -> Result<SshExecutor, ExecError> {
        let conn_info = ConnectionInfo::parse(host, &self.user, self.port)?;
        let executor = SshExecutorBuilder::from_connection(conn_info)
            .with_resolved_key(Arc::clone(&self.key))
            .with_host_key_policy(self.host_key_policy.clone())
            .with_connect_timeout(self.connect_timeout)
            .build()?;

        let info = executor.connection_info();
        debug!(host = %info.host, port = info.port, user = %info.user, "ssh executor ready");
        Ok(executor)
    }
}

#[async_trait]
impl ExecutorFactory for SshExecutorFactory {
    async fn create_executor(&self, host: &str) -> Result<Arc<dyn RemoteExecutor>, ExecError> {
        Ok(Arc::new(self.ssh_executor(host)?))
    }
}
