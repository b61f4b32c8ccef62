//! Audit error types.

use std::time::Duration;
use thiserror::Error;

use crate::worker::TaskId;

/// Errors from dispatching an analysis.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuditError {
    /// The background task did not answer in time.
    #[error("Analysis task {task_id} timed out after {after:?}")]
    Timeout { task_id: TaskId, after: Duration },

    /// The worker thread stopped before answering.
    #[error("Compute worker unavailable")]
    WorkerUnavailable,
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
