//! isomorph Environment Abstraction Layer
//!
//! This crate provides the environment seam that lets the validation
//! harness run against the real clock (tokio) or a seeded simulation
//! context.
//!
//! # Core Concept
//!
//! Everything the harness needs from the outside world goes through
//! [`ValidationContext`]:
//! - Time (`now()`, `sleep()`)
//! - Blocking work (`spawn_blocking()`)
//! - Randomness (`derive_rng()`, `next_call_id()`)
//!
//! Deriving all entropy from a single 64-bit seed makes every simulated
//! failure reproducible from its seed number.
//!
//! # Example
//!
//! ```ignore
//! use isomorph_env::{TokioContext, ValidationContext};
//!
//! async fn race<Ctx: ValidationContext>(ctx: &Ctx) {
//!     let work = ctx.spawn_blocking("compare", || expensive_comparison());
//!     tokio::select! {
//!         done = work => handle(done),
//!         _ = ctx.sleep(Duration::from_millis(50)) => timed_out(),
//!     }
//! }
//! ```

mod context;
mod types;
mod error;
mod tokio_impl;

pub use context::ValidationContext;
pub use types::CallId;
pub use error::EnvError;
pub use tokio_impl::TokioContext;
