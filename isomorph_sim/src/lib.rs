//! isomorph Simulation Harness
//!
//! Seeded, replayable test simulation for the structural equality
//! validator. Every iteration draws a random graph blueprint, builds it
//! twice (optionally mutating one copy) and races the comparison through
//! the cancellation harness on a [`SimContext`].
//!
//! # Reproducing a failure
//!
//! - **Seeds**: iteration seeds come from one master seed ([`SeedProvider`])
//! - **Replay**: the random numbers of a failing iteration are saved to
//!   `SimulationData_<scenario>.xml` and can be fed back verbatim
//! - **Statistics**: every validated member is counted in a
//!   [`TestStatistics`] tree so a run shows what it actually exercised
//!
//! ```text
//!   SeedProvider ──► ReplayRandomNumberGenerator ──► GraphBlueprint
//!                                                     │ build ×2
//!                                                     ▼
//!   TestStatistics ◄── on_member_done ◄── CancellationHarness<SimContext>
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use isomorph_sim::{ScenarioId, ScenarioRunner};
//!
//! let result = ScenarioRunner::new(42)
//!     .with_iterations(100)
//!     .run(ScenarioId::Ring)
//!     .await?;
//! assert!(result.passed);
//! ```

mod context;
pub mod error;
mod exporter;
pub mod graphs;
mod logging;
pub mod probability;
pub mod replay;
pub mod rng;
mod runner;
pub mod scenarios;
mod seeds;
pub mod statistics;

pub use context::SimContext;
pub use error::{RngError, SimError, StatisticsError};
pub use exporter::{ExportedRun, SimExport};
pub use graphs::{BuiltGraph, GraphBlueprint, GraphNode, Mutation};
pub use logging::init_test_tracing;
pub use probability::{candidate_range, ProbabilityRandomNumberGenerator};
pub use replay::{ReplayMode, ReplayRandomNumberGenerator};
pub use rng::{RandomNumberGenerator, SeededRandomNumberGenerator};
pub use runner::{
    check_outcome, member_statistics, IterationFailure, MemberSample, SampleShape,
    ScenarioMetrics, ScenarioResult, ScenarioRunner,
};
pub use scenarios::{Expectation, ScenarioCase, ScenarioId};
pub use seeds::SeedProvider;
pub use statistics::{statistic_path, GroupKind, TestStatistic, TestStatistics};
