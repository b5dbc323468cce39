//! Structured errors and partial-failure warnings for engine operations.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (rejected before any write)
    InvalidFieldValue,
    UnknownStatus,
    InvalidRecurrence,

    // Capacity errors
    WipLimitReached,

    // Not found errors
    TaskNotFound,
    ProjectNotFound,

    // Internal errors
    StoreError,
}

/// Errors returned by engine operations. The task is unchanged whenever one
/// of these is returned.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("unknown status '{status}'")]
    UnknownStatus { status: String },

    #[error("invalid recurrence rule: {0}")]
    InvalidRecurrence(String),

    #[error(
        "WIP limit reached in {status} ({limit}). Complete or move tasks out before adding more."
    )]
    Capacity {
        status: String,
        limit: u32,
        count: usize,
    },

    #[error("task not found: {id}")]
    TaskNotFound { id: String },

    #[error("project not found: {id}")]
    ProjectNotFound { id: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn task_not_found(id: &str) -> Self {
        EngineError::TaskNotFound { id: id.to_string() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Validation { .. } => ErrorCode::InvalidFieldValue,
            EngineError::UnknownStatus { .. } => ErrorCode::UnknownStatus,
            EngineError::InvalidRecurrence(_) => ErrorCode::InvalidRecurrence,
            EngineError::Capacity { .. } => ErrorCode::WipLimitReached,
            EngineError::TaskNotFound { .. } => ErrorCode::TaskNotFound,
            EngineError::ProjectNotFound { .. } => ErrorCode::ProjectNotFound,
            EngineError::Store(_) => ErrorCode::StoreError,
        }
    }

    /// Validation and capacity errors are user-actionable; the rest are not.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, EngineError::Store(_))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Secondary failure reported alongside a committed primary mutation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The completion stands; the next occurrence was not created.
    RecurrenceSpawnFailed { task_id: String, reason: String },
    /// The project's `progress` may be stale until the next recompute.
    ProgressRecomputeFailed { project_id: String, reason: String },
    /// The task record is gone; some dependent records may remain.
    CascadeCleanupFailed {
        task_id: String,
        records: String,
        reason: String,
    },
    /// The mutation committed but its activity entry was not written.
    ActivityLogFailed { task_id: String, reason: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::RecurrenceSpawnFailed { task_id, reason } => {
                write!(f, "next occurrence of {} was not created: {}", task_id, reason)
            }
            Warning::ProgressRecomputeFailed { project_id, reason } => {
                write!(f, "progress of project {} may be stale: {}", project_id, reason)
            }
            Warning::CascadeCleanupFailed {
                task_id,
                records,
                reason,
            } => write!(
                f,
                "task {} deleted but {} cleanup failed: {}",
                task_id, records, reason
            ),
            Warning::ActivityLogFailed { task_id, reason } => {
                write!(f, "activity for {} not logged: {}", task_id, reason)
            }
        }
    }
}
