//! Request identity and lifecycle stages

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique execution identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExecutionId(pub uuid::Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which façade a request came through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Execute,
    Format,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Execute => write!(f, "execute"),
            Operation::Format => write!(f, "format"),
        }
    }
}

/// Per-request lifecycle.
///
/// `Received → WorkspaceAcquired → SourceMaterialized → ProcessRunning →
/// ProcessTerminated | FailedToStart → WorkspaceReleased → ResultEmitted`.
/// A request can jump to `WorkspaceReleased` from any earlier stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStage {
    Received,
    WorkspaceAcquired,
    SourceMaterialized,
    ProcessRunning,
    ProcessTerminated,
    FailedToStart,
    WorkspaceReleased,
    ResultEmitted,
}

impl ExecutionStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStage::ResultEmitted)
    }

    /// Whether moving from `self` to `next` is a legal step
    pub fn can_advance_to(self, next: ExecutionStage) -> bool {
        use ExecutionStage::*;
        match (self, next) {
            (Received, WorkspaceAcquired)
            | (WorkspaceAcquired, SourceMaterialized)
            | (SourceMaterialized, ProcessRunning)
            | (ProcessRunning, ProcessTerminated)
            | (ProcessRunning, FailedToStart)
            | (WorkspaceReleased, ResultEmitted) => true,
            // provisioning failures skip straight to the result
            (Received, ResultEmitted) => true,
            (
                WorkspaceAcquired | SourceMaterialized | ProcessTerminated | FailedToStart,
                WorkspaceReleased,
            ) => true,
            _ => false,
        }
    }
}

/// Tracks one request through its stages and traces every transition
#[derive(Debug)]
pub struct Lifecycle {
    id: ExecutionId,
    operation: Operation,
    stage: ExecutionStage,
}

impl Lifecycle {
    pub fn new(id: ExecutionId, operation: Operation) -> Self {
        tracing::debug!(execution_id = %id, %operation, stage = ?ExecutionStage::Received, "Stage");
        Self {
            id,
            operation,
            stage: ExecutionStage::Received,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn stage(&self) -> ExecutionStage {
        self.stage
    }

    pub fn advance(&mut self, next: ExecutionStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal stage transition {:?} -> {:?}",
            self.stage,
            next
        );
        tracing::debug!(
            execution_id = %self.id,
            operation = %self.operation,
            from = ?self.stage,
            stage = ?next,
            "Stage"
        );
        self.stage = next;
    }
}
