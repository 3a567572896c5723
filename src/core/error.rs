//! Error types for scheduler operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::TaskId;

/// Errors produced while configuring or building a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration values failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No async runtime is available to run tasks on.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
}

/// Why a dependency can never reach `completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyProblem {
    /// No task with this id was submitted before the dependent.
    Missing,
    /// The dependency failed.
    Failed,
    /// The dependency was cancelled.
    Cancelled,
}

impl fmt::Display for DependencyProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => write!(f, "not submitted"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal failure reason recorded on a task.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskError {
    /// The attempt's timer fired before the work settled.
    #[error("task timed out after {timeout_ms}ms")]
    TimeoutExceeded {
        /// Attempt budget that was exceeded.
        timeout_ms: u64,
    },
    /// The work returned an error or panicked.
    #[error("task failed: {0}")]
    WorkFailure(String),
    /// A dependency can never complete, so the task can never run.
    #[error("dependency {dependency} is unsatisfiable: {reason}")]
    DependencyUnsatisfiable {
        /// The offending dependency.
        dependency: TaskId,
        /// What happened to it.
        reason: DependencyProblem,
    },
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
