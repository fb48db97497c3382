//! rekey-core: Fleet secret rotation
//!
//! Loads the host list, drives the backup, mutate and verify protocol on
//! each host with rollback on failed verification, and keeps the run
//! summary and audit log.

pub mod audit;
pub mod config;
pub mod error;
pub mod factory;
pub mod hosts;
pub mod prompt;
pub mod recipe;
pub mod rotator;
pub mod state;
pub mod summary;

pub use audit::{AuditLog, Tone};
pub use config::{RotationConfig, TargetFile};
pub use error::CoreError;
pub use factory::{ExecutorFactory, SshExecutorFactory};
pub use hosts::{load_hosts, parse_hosts};
pub use prompt::{AssumeYes, Confirm, Prompt};
pub use recipe::{HostPlan, RemoteCommand, RotationRecipe};
pub use rotator::{RunOutcome, Rotator, preflight};
pub use state::{HostOutcome, RotationJob, RotationPhase, RotationStep};
pub use summary::RunSummary;
