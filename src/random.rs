//! Reseedable random source
//!
//! Every stochastic step of a transform reseeds before drawing, so results
//! depend only on the seed handed to that step and the order of draws after
//! it. One `RandomSource` is created per transform call and threaded through
//! by `&mut`; nothing is shared between calls.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub struct RandomSource {
    rng: StdRng,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Restart the stream from `seed`
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    /// Integer in `[low, high]`, both ends included
    pub fn randint_inclusive(&mut self, low: i64, high: i64) -> i64 {
        self.rng.gen_range(low..=high)
    }

    /// Float in `[low, high)`; a degenerate range yields `low`
    pub fn uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.random()
    }

    /// Float in `[0, 1)`
    pub fn random(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}
