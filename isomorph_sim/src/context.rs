//! Simulation context implementing ValidationContext for seeded runs.

use async_trait::async_trait;
use isomorph_env::{CallId, ValidationContext};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug_span;

/// Mixing constant shared by every seed derivation in the simulation.
pub(crate) const SEED_MIX: u64 = 0x517cc1b727220a95;

/// Simulation context backed by a virtual clock and seeded RNG streams.
///
/// - `now()` reads a virtual clock that the runner advances between
///   iterations and that `sleep` advances by the slept duration
/// - `sleep` still waits on the real timer, so a deadline bounds the
///   wall-clock time of the blocking work it races against
/// - `derive_rng` combines the master seed with an extension
/// - `next_call_id` numbers calls from the master seed, so a replayed
///   seed logs the same call ids
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<AtomicU64>,

    /// Calls issued so far, shared by clones
    calls: Arc<AtomicU64>,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(AtomicU64::new(0)),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    pub fn advance_time(&self, duration: Duration) {
        self.virtual_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set_time(&self, time_ns: u64) {
        self.virtual_time_ns.store(time_ns, Ordering::SeqCst);
    }

    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::SeqCst)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            calls: Arc::clone(&self.calls),
        }
    }
}

#[async_trait]
impl ValidationContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
        self.advance_time(duration);
    }

    fn spawn_blocking<F, R>(&self, name: &str, work: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let span = debug_span!("sim_blocking", task = %name, seed = self.seed);
        tokio::task::spawn_blocking(move || span.in_scope(work))
    }

    fn derive_rng(&self, seed_extension: u64) -> ChaCha8Rng {
        let combined_seed = self.seed.wrapping_mul(SEED_MIX) ^ seed_extension;
        ChaCha8Rng::seed_from_u64(combined_seed)
    }

    fn next_call_id(&self) -> CallId {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        CallId::from_seed(self.seed.wrapping_mul(SEED_MIX) ^ call)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));

        ctx.set_time(7);
        assert_eq!(ctx.time_ns(), 7);
    }

    #[test]
    fn test_sim_context_deterministic_rng() {
        let ctx1 = SimContext::new(42);
        let ctx2 = SimContext::new(42);

        assert_eq!(ctx1.derive_rng(1).next_u64(), ctx2.derive_rng(1).next_u64());
        assert_ne!(ctx1.derive_rng(1).next_u64(), ctx1.derive_rng(2).next_u64());
    }

    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();

        ctx1.advance_time(Duration::from_secs(5));
        assert_eq!(ctx1.now(), ctx2.now());

        // Clones draw from one call counter
        assert_ne!(ctx1.next_call_id(), ctx2.next_call_id());
    }

    #[test]
    fn test_sim_context_call_ids_replay_with_seed() {
        let ids = |seed| {
            let ctx = SimContext::new(seed);
            (0..3).map(|_| ctx.next_call_id()).collect::<Vec<_>>()
        };

        assert_eq!(ids(42), ids(42));
        assert_ne!(ids(42), ids(43));
        let run = ids(42);
        assert_ne!(run[0], run[1]);
    }

    #[tokio::test]
    async fn test_sim_context_sleep_advances_virtual_time() {
        let ctx = SimContext::new(3);
        ctx.sleep(Duration::from_millis(5)).await;
        assert_eq!(ctx.now(), Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_sim_context_spawn_blocking() {
        let ctx = SimContext::new(3);
        let handle = ctx.spawn_blocking("double", || 21 * 2);
        assert_eq!(handle.await.unwrap(), 42);
    }
}
