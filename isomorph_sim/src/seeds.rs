//! Deterministic per-iteration seeds.

use crate::context::SEED_MIX;

/// Golden ratio prime
const GOLDEN: u64 = 0x9e3779b97f4a7c15;

/// Derives iteration seeds from one master seed.
///
/// The seed of iteration `i` depends only on the master seed and `i`, so
/// running more iterations never changes the earlier ones and a failing
/// iteration can be rerun from its own seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedProvider {
    master_seed: u64,
}

impl SeedProvider {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// `master * golden + iteration * mix`
    pub fn iteration_seed(&self, iteration: u64) -> u64 {
        self.master_seed
            .wrapping_mul(GOLDEN)
            .wrapping_add(iteration.wrapping_mul(SEED_MIX))
    }

    pub fn iteration_seeds(&self, iterations: u64) -> Vec<u64> {
        (0..iterations).map(|i| self.iteration_seed(i)).collect()
    }
}
