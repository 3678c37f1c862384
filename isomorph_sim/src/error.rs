//! Error types for the simulation harness.

use isomorph_core::ValidationError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the random number generators.
#[derive(Debug, Error)]
pub enum RngError {
    /// `max` is below `min`
    #[error("Invalid range: max {max} is less than min {min}")]
    InvalidRange { min: u32, max: u32 },

    /// A blank simulation or iteration identifier
    #[error("The {0} identifier cannot be blank")]
    MissingIdentifier(&'static str),

    /// Saving requires a started iteration
    #[error("No simulation iteration was started")]
    NotStarted,

    #[error("Replay file '{}' does not exist", .0.display())]
    ReplayFileMissing(PathBuf),

    #[error("No random numbers saved for simulation '{simulation}' iteration '{iteration}' in '{}'", .path.display())]
    ReplayDataNotFound {
        simulation: String,
        iteration: String,
        path: PathBuf,
    },

    #[error("Could not parse '{0}' as a random number")]
    Parse(String),

    /// More numbers requested than were saved
    #[error("Too many random numbers requested while replaying saved numbers")]
    ReplayExhausted,

    #[error("Replayed number {value} is not between {min} and {max}")]
    ReplayOutOfRange { value: u32, min: u32, max: u32 },

    #[error("Candidate list cannot be empty")]
    EmptyCandidates,

    #[error("Cumulative probability {total} exceeds the full scale {full_scale}")]
    ProbabilityOverflow { total: u64, full_scale: u32 },

    /// `add_remaining` called on a complete scale
    #[error("Cumulative probability already equals the full scale {0}")]
    ScaleFull(u32),

    #[error("Cumulative probability {current} is less than the full scale {full_scale}")]
    ScaleIncomplete { current: u32, full_scale: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while updating statistics.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatisticsError {
    /// Two children of an exclusive group matched the same source
    #[error("Group '{group}' matched one source with both '{first}' and '{second}'; at most one child may match")]
    ExclusiveConflict {
        group: String,
        first: String,
        second: String,
    },

    #[error("Statistic '{0}' is not a group")]
    NotAGroup(String),
}

/// Top-level simulation error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Random number error: {0}")]
    Rng(#[from] RngError),

    #[error("Statistics error: {0}")]
    Statistics(#[from] StatisticsError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown scenario: {0}")]
    UnknownScenario(String),
}
