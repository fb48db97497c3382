//! rekey-exec: Remote execution transport
//!
//! Provides the `RemoteExecutor` trait and its SSH implementation, key
//! resolution, shell quoting helpers and the non-raising
//! `run_remote_command` wrapper used by the rotator.

pub mod error;
pub mod keys;
#[cfg(any(test, feature = "local"))]
pub mod local;
pub mod quote;
pub mod remote;
pub mod result;
pub mod ssh;
pub mod traits;

pub use error::ExecError;
pub use keys::{KeyError, KeySource, ResolvedKey};
#[cfg(any(test, feature = "local"))]
pub use local::LocalExecutor;
pub use quote::{shell_quote, validate_host};
pub use remote::{CONNECTION_TIMEOUT_MESSAGE, RemoteOutput, run_remote_command};
pub use result::{CommandResult, ConnectionInfo};
pub use ssh::{HostKeyPolicy, SshExecutor, SshExecutorBuilder};
pub use traits::RemoteExecutor;
