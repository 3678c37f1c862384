//! Production implementation of ValidationContext using Tokio.

use crate::{CallId, ValidationContext};
use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug_span;

/// Production context backed by Tokio and OS entropy.
///
/// Time comes from the system clock, randomness from the OS.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ValidationContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn spawn_blocking<F, R>(&self, name: &str, work: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let span = debug_span!("blocking", task = %name);
        tokio::task::spawn_blocking(move || span.in_scope(work))
    }

    fn derive_rng(&self, _seed_extension: u64) -> ChaCha8Rng {
        // Production streams are not reproducible
        ChaCha8Rng::from_entropy()
    }

    fn next_call_id(&self) -> CallId {
        CallId::new()
    }

    fn seed(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_tokio_context_spawn_blocking() {
        let ctx = TokioContext::new();
        let handle = ctx.spawn_blocking("sum", || (1..=10).sum::<u32>());
        assert_eq!(handle.await.unwrap(), 55);
    }

    #[test]
    fn test_tokio_context_rng_not_reproducible() {
        let ctx = TokioContext::new();
        let a = ctx.derive_rng(1).next_u64();
        let b = ctx.derive_rng(1).next_u64();

        // Two entropy-seeded streams colliding is practically impossible
        assert_ne!(a, b);
    }

    #[test]
    fn test_tokio_context_call_ids_are_unique() {
        let ctx = TokioContext::new();
        assert_ne!(ctx.next_call_id(), ctx.next_call_id());
    }

    #[test]
    fn test_tokio_context_seed() {
        let ctx = TokioContext::new();
        assert_eq!(ctx.seed(), 0);
    }
}
