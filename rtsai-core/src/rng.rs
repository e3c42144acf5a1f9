//! The one synchronized random stream all AI decisions draw from.

use crate::error::SaveError;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Seeded, portable random stream. Every client advances it in the same order,
/// so picks made through it replay identically.
#[derive(Debug, Clone)]
pub struct SyncRng {
    seed: u64,
    rng: ChaCha8Rng,
}

/// Persisted form. Numbers are strings because the stream position exceeds
/// the range the text format stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: String,
    pub word_pos: String,
}

impl SyncRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform index in `0..n`. Returns 0 for an empty range without drawing.
    pub fn below(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        self.rng.gen_range(0..n)
    }

    /// True with `percent` in 100.
    pub fn chance(&mut self, percent: u32) -> bool {
        self.rng.gen_range(0..100) < percent
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.rng);
    }

    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let i = self.below(items.len());
        items.get(i)
    }

    pub fn state(&self) -> RngState {
        RngState {
            seed: self.seed.to_string(),
            word_pos: self.rng.get_word_pos().to_string(),
        }
    }

    pub fn from_state(state: &RngState) -> Result<Self, SaveError> {
        let seed: u64 = state
            .seed
            .parse()
            .map_err(|e| SaveError::BadRng(format!("seed '{}': {}", state.seed, e)))?;
        let word_pos: u128 = state
            .word_pos
            .parse()
            .map_err(|e| SaveError::BadRng(format!("word_pos '{}': {}", state.word_pos, e)))?;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_word_pos(word_pos);
        Ok(Self { seed, rng })
    }
}
