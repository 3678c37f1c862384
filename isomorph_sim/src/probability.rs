//! Weighted choice between candidate buckets.
//!
//! The full scale sets the resolution: with a full scale of 1000 a
//! probability of 1 is 0.1%. Buckets are added until their probabilities sum
//! to exactly the full scale; then each draw first picks a bucket by weight
//! and then a uniform candidate inside it.

use crate::error::RngError;
use crate::rng::RandomNumberGenerator;

#[derive(Debug, Clone)]
struct Bucket {
    probability: u32,
    candidates: Vec<u32>,
}

#[derive(Debug)]
pub struct ProbabilityRandomNumberGenerator<R> {
    rng: R,
    full_scale: u32,
    cumulative: u32,
    buckets: Vec<Bucket>,
}

impl<R: RandomNumberGenerator> ProbabilityRandomNumberGenerator<R> {
    pub fn new(rng: R, full_scale: u32) -> Self {
        Self {
            rng,
            full_scale,
            cumulative: 0,
            buckets: Vec::new(),
        }
    }

    /// Adds a bucket chosen with weight `probability`.
    pub fn add_for_probability(
        &mut self,
        probability: u32,
        candidates: impl IntoIterator<Item = u32>,
    ) -> Result<&mut Self, RngError> {
        let total = u64::from(self.cumulative) + u64::from(probability);
        if total > u64::from(self.full_scale) {
            return Err(RngError::ProbabilityOverflow {
                total,
                full_scale: self.full_scale,
            });
        }
        let candidates: Vec<u32> = candidates.into_iter().collect();
        if candidates.is_empty() {
            return Err(RngError::EmptyCandidates);
        }

        self.cumulative += probability;
        self.buckets.push(Bucket {
            probability,
            candidates,
        });
        Ok(self)
    }

    /// Adds a bucket carrying whatever probability is left.
    pub fn add_remaining(
        &mut self,
        candidates: impl IntoIterator<Item = u32>,
    ) -> Result<&mut Self, RngError> {
        if self.cumulative == self.full_scale {
            return Err(RngError::ScaleFull(self.full_scale));
        }
        self.add_for_probability(self.full_scale - self.cumulative, candidates)
    }

    pub fn cumulative_probability(&self) -> u32 {
        self.cumulative
    }

    pub fn full_scale(&self) -> u32 {
        self.full_scale
    }

    /// Draws a value. Fails until the buckets cover the full scale.
    pub fn next_value(&mut self) -> Result<u32, RngError> {
        if self.cumulative != self.full_scale || self.buckets.is_empty() {
            return Err(RngError::ScaleIncomplete {
                current: self.cumulative,
                full_scale: self.full_scale,
            });
        }

        let roll = self.rng.next(self.full_scale.saturating_sub(1))?;
        let mut lower = 0u32;
        let mut chosen = self.buckets.len() - 1;
        for (i, bucket) in self.buckets.iter().enumerate() {
            let upper = lower + bucket.probability;
            if roll < upper {
                chosen = i;
                break;
            }
            lower = upper;
        }

        let candidates = &self.buckets[chosen].candidates;
        let index = self.rng.next(candidates.len() as u32 - 1)? as usize;
        Ok(candidates[index])
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    pub fn into_inner(self) -> R {
        self.rng
    }
}

/// Every value in `[min, max]`.
pub fn candidate_range(min: u32, max: u32) -> Result<Vec<u32>, RngError> {
    if max < min {
        return Err(RngError::InvalidRange { min, max });
    }
    Ok((min..=max).collect())
}
