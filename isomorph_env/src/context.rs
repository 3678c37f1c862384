//! Core environment context trait for isomorph validations.

use crate::CallId;
use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;
use tokio::task::JoinHandle;

/// The central interface for environment interaction.
///
/// This trait abstracts the "real world" so the cancellation harness can
/// run in production tests (tokio) and in seeded simulation runs.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` (in `isomorph_sim`) - seeded ChaCha8 streams
///
/// # Determinism
///
/// Methods that would normally introduce non-determinism (randomness and
/// call ids) are controlled by the implementation. Timers always follow the real clock
/// so a deadline bounds real work.
#[async_trait]
pub trait ValidationContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Runs synchronous work on the blocking pool.
    ///
    /// Dropping the returned handle does not stop the work: it keeps
    /// running to completion on its thread.
    fn spawn_blocking<F, R>(&self, name: &str, work: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static;

    /// Derives a random number stream from a seed extension.
    ///
    /// The implementation combines the global seed with `seed_extension`
    /// so that distinct extensions give distinct, reproducible streams.
    ///
    /// # Arguments
    /// * `seed_extension` - A value to combine with the global seed
    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng;

    /// Issues the id of the next validation call.
    ///
    /// Seeded contexts issue the same sequence of ids for the same seed.
    fn next_call_id(&self) -> CallId;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
