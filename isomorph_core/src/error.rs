//! Error types for structural validation.

use crate::report::{MismatchKind, MismatchReport};
use isomorph_env::EnvError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of one validation call.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The graphs diverged; the report locates the first divergence
    #[error("Validation failed: {0}")]
    Mismatch(Box<MismatchReport>),

    /// The deadline fired before the work completed
    #[error("Task '{task}' timed out after {timeout_ms}ms{}", label_suffix(.label))]
    Timeout {
        task: String,
        timeout_ms: u64,
        label: Option<String>,
    },

    /// Runaway traversal; treat as a defect, not a comparison outcome
    #[error("Traversal exceeded {ceiling} frame operations")]
    IterationCeilingExceeded { ceiling: u64 },

    /// A member accessor could not read its owner (wrong type or poisoned lock)
    #[error("Could not read member '{member}' at {path}")]
    AccessorFailed { path: String, member: &'static str },

    /// Environment failure (blocking task panicked or was cancelled)
    #[error("Environment error: {0}")]
    Env(#[from] EnvError),
}

fn label_suffix(label: &Option<String>) -> String {
    match label {
        Some(label) => format!(" ({})", label),
        None => String::new(),
    }
}

/// Flat classification of every way a call can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NullMismatch,
    TypeMismatch,
    LengthMismatch,
    ValueMismatch,
    Timeout,
    FatalIterationCeilingExceeded,
    FatalAccessorFailed,
    FatalTaskFailed,
}

impl From<MismatchKind> for ErrorKind {
    fn from(kind: MismatchKind) -> Self {
        match kind {
            MismatchKind::NullMismatch => ErrorKind::NullMismatch,
            MismatchKind::TypeMismatch => ErrorKind::TypeMismatch,
            MismatchKind::LengthMismatch => ErrorKind::LengthMismatch,
            MismatchKind::ValueMismatch => ErrorKind::ValueMismatch,
        }
    }
}

impl ValidationError {
    pub fn mismatch(report: MismatchReport) -> Self {
        Self::Mismatch(Box::new(report))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::Mismatch(report) => report.kind.into(),
            ValidationError::Timeout { .. } => ErrorKind::Timeout,
            ValidationError::IterationCeilingExceeded { .. } => {
                ErrorKind::FatalIterationCeilingExceeded
            }
            ValidationError::AccessorFailed { .. } => ErrorKind::FatalAccessorFailed,
            ValidationError::Env(_) => ErrorKind::FatalTaskFailed,
        }
    }

    /// The report, when the failure is a divergence between the graphs.
    pub fn report(&self) -> Option<&MismatchReport> {
        match self {
            ValidationError::Mismatch(report) => Some(&**report),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ValidationError::Timeout { .. })
    }

    /// Fatal errors indicate a defect rather than a property of the graphs.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::FatalIterationCeilingExceeded
                | ErrorKind::FatalAccessorFailed
                | ErrorKind::FatalTaskFailed
        )
    }
}
