//! Error types for the isomorph environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Blocking work panicked or was cancelled by runtime shutdown
    #[error("Task '{task}' failed: {reason}")]
    TaskFailed { task: String, reason: String },
}

impl EnvError {
    /// Creates a task failure from a join error.
    pub fn task_failed(task: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::TaskFailed {
            task: task.into(),
            reason: reason.to_string(),
        }
    }
}
