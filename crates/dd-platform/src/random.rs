//! Pseudo-random numbers for non-cryptographic use (jitter, ids, sampling)

use crate::process::query_timestamp;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use std::ops::Range;

/// Seedable pseudo-random generator
///
/// [`Random::new`] seeds from the high-resolution timestamp counter, so two
/// generators created at different moments produce different sequences. Use
/// [`Random::with_seed`] for a reproducible one.
#[derive(Debug, Clone)]
pub struct Random {
    rng: StdRng,
}

impl Random {
    /// Create a generator seeded from [`query_timestamp`]
    pub fn new() -> Self {
        Self::with_seed(query_timestamp())
    }

    /// Create a generator with a fixed seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Restart the sequence from `seed`
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Next value in `0..=u32::MAX`
    pub fn generate(&mut self) -> u32 {
        self.rng.next_u32()
    }

    /// Next value in `range`
    ///
    /// An empty range yields its start.
    pub fn generate_range(&mut self, range: Range<u32>) -> u32 {
        if range.is_empty() {
            return range.start;
        }
        self.rng.gen_range(range)
    }
}

impl Default for Random {
    fn default() -> Self {
        Self::new()
    }
}
