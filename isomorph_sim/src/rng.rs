//! Seedable random number generation for simulation iterations.
//!
//! Ranges are inclusive on both ends and non-negative. A generator knows the
//! seed it was created from so a failing iteration can be reported with it.

use crate::error::RngError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of random numbers used to shape simulated graphs.
pub trait RandomNumberGenerator: Send {
    /// The seed this generator was created from, if it is reproducible.
    fn seed(&self) -> Option<u64>;

    /// A number in `[min, max]`.
    fn next_in_range(&mut self, min: u32, max: u32) -> Result<u32, RngError>;

    /// A number in `[0, max]`.
    fn next(&mut self, max: u32) -> Result<u32, RngError> {
        self.next_in_range(0, max)
    }
}

impl<R: RandomNumberGenerator + ?Sized> RandomNumberGenerator for &mut R {
    fn seed(&self) -> Option<u64> {
        (**self).seed()
    }

    fn next_in_range(&mut self, min: u32, max: u32) -> Result<u32, RngError> {
        (**self).next_in_range(min, max)
    }
}

impl<R: RandomNumberGenerator + ?Sized> RandomNumberGenerator for Box<R> {
    fn seed(&self) -> Option<u64> {
        (**self).seed()
    }

    fn next_in_range(&mut self, min: u32, max: u32) -> Result<u32, RngError> {
        (**self).next_in_range(min, max)
    }
}

/// ChaCha8-backed generator.
#[derive(Debug, Clone)]
pub struct SeededRandomNumberGenerator {
    rng: ChaCha8Rng,
    seed: Option<u64>,
}

impl SeededRandomNumberGenerator {
    /// Reproducible stream from `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Reproducible stream from a freshly drawn seed.
    pub fn with_random_seed() -> Self {
        Self::with_seed(rand::random())
    }

    /// Entropy-seeded stream that cannot be reproduced.
    pub fn unseeded() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            seed: None,
        }
    }

    /// Wraps an already derived stream (e.g. from a simulation context).
    pub fn from_rng(rng: ChaCha8Rng, seed: Option<u64>) -> Self {
        Self { rng, seed }
    }
}

impl RandomNumberGenerator for SeededRandomNumberGenerator {
    fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn next_in_range(&mut self, min: u32, max: u32) -> Result<u32, RngError> {
        if max < min {
            return Err(RngError::InvalidRange { min, max });
        }
        Ok(self.rng.gen_range(min..=max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SeededRandomNumberGenerator::with_seed(42);
        let mut b = SeededRandomNumberGenerator::with_seed(42);
        let xs: Vec<u32> = (0..20).map(|_| a.next(1000).unwrap()).collect();
        let ys: Vec<u32> = (0..20).map(|_| b.next(1000).unwrap()).collect();
        assert_eq!(xs, ys);
        assert_eq!(a.seed(), Some(42));
    }

    #[test]
    fn test_unseeded_has_no_seed() {
        assert_eq!(SeededRandomNumberGenerator::unseeded().seed(), None);
        assert!(SeededRandomNumberGenerator::with_random_seed().seed().is_some());
    }

    #[test]
    fn test_invalid_range_rejected() {
        let mut rng = SeededRandomNumberGenerator::with_seed(1);
        assert!(matches!(
            rng.next_in_range(5, 4),
            Err(RngError::InvalidRange { min: 5, max: 4 })
        ));
    }

    #[test]
    fn test_degenerate_range() {
        let mut rng = SeededRandomNumberGenerator::with_seed(1);
        assert_eq!(rng.next_in_range(7, 7).unwrap(), 7);
        assert_eq!(rng.next(0).unwrap(), 0);
    }

    proptest! {
        #[test]
        fn prop_values_stay_in_inclusive_range(seed in any::<u64>(), min in 0u32..1000, span in 0u32..1000) {
            let mut rng = SeededRandomNumberGenerator::with_seed(seed);
            let max = min + span;
            for _ in 0..16 {
                let value = rng.next_in_range(min, max).unwrap();
                prop_assert!(value >= min && value <= max);
            }
        }
    }
}
