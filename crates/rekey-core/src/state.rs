//! Per-host rotation state machine

use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

/// Phase of a host's rotation
///
/// `Pending → BackedUp → Updated → Verified` is the success path.
/// `Updated → RolledBack → Failed` follows a failed verification, and any
/// non-terminal phase may drop straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationPhase {
    Pending,
    BackedUp,
    Updated,
    Verified,
    RolledBack,
    Failed,
}

impl RotationPhase {
    /// Whether `next` is a legal successor of `self`
    #[must_use]
    pub fn can_transition_to(self, next: RotationPhase) -> bool {
        use RotationPhase::{BackedUp, Failed, Pending, RolledBack, Updated, Verified};

        matches!(
            (self, next),
            (Pending, BackedUp)
                | (BackedUp, Updated)
                | (Updated, Verified)
                | (Updated, RolledBack)
                | (Pending | BackedUp | Updated | RolledBack, Failed)
        )
    }

    /// No further transitions possible
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RotationPhase::Verified | RotationPhase::Failed)
    }
}

impl fmt::Display for RotationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RotationPhase::Pending => "pending",
            RotationPhase::BackedUp => "backed_up",
            RotationPhase::Updated => "updated",
            RotationPhase::Verified => "verified",
            RotationPhase::RolledBack => "rolled_back",
            RotationPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Remote action taken while rotating a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStep {
    Connect,
    Backup,
    Mutate,
    Verify,
    Rollback,
}

impl fmt::Display for RotationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            RotationStep::Connect => "connect",
            RotationStep::Backup => "create backup",
            RotationStep::Mutate => "update file",
            RotationStep::Verify => "verify change",
            RotationStep::Rollback => "restore backup",
        };
        f.write_str(action)
    }
}

/// Final result for one host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HostOutcome {
    Success,
    Failed,
}

/// Rotation record for a single host, discarded once logged
#[derive(Debug, Clone)]
pub struct RotationJob {
    pub host: String,
    pub phase: RotationPhase,
    pub detail: String,
    /// Exact backup created in the backup phase, reused for rollback
    pub backup_path: Option<String>,
}

impl RotationJob {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            phase: RotationPhase::Pending,
            detail: String::new(),
            backup_path: None,
        }
    }

    /// Move to `next`, recording `detail`
    ///
    /// # Errors
    /// Returns `CoreError::InvalidTransition` if `next` does not follow the current phase
    pub fn advance(
        &mut self,
        next: RotationPhase,
        detail: impl Into<String>,
    ) -> Result<(), CoreError> {
        if !self.phase.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        self.detail = detail.into();
        Ok(())
    }

    /// Mark the job failed; a no-op on an already terminal job
    pub fn fail(&mut self, detail: impl Into<String>) {
        if !self.phase.is_terminal() {
            self.phase = RotationPhase::Failed;
            self.detail = detail.into();
        }
    }

    #[must_use]
    pub fn outcome(&self) -> HostOutcome {
        if self.phase == RotationPhase::Verified {
            HostOutcome::Success
        } else {
            HostOutcome::Failed
        }
    }
}
