//! Random number-set generator with an injectable randomness source

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use uuid::Uuid;

use crate::config::defaults::{LOTTO_MAX_NUMBER, LOTTO_MIN_NUMBER, LOTTO_PICK_COUNT};
use crate::config::RecommendationConfig;
use crate::types::Recommendation;

/// Produces recommendations: six distinct numbers in `[1, 45]`, ascending,
/// with either none or all of them marked special.
pub struct RecommendationGenerator {
    special_probability: f64,
    rng: Box<dyn RngCore + Send>,
}

impl RecommendationGenerator {
    /// Create a generator over any randomness source.
    ///
    /// `special_probability` is clamped to `[0, 1]`; NaN is treated as 0.
    pub fn new(special_probability: f64, rng: impl RngCore + Send + 'static) -> Self {
        let special_probability = if special_probability.is_nan() {
            0.0
        } else {
            special_probability.clamp(0.0, 1.0)
        };
        Self {
            special_probability,
            rng: Box::new(rng),
        }
    }

    /// Generator seeded from OS entropy.
    pub fn from_config(config: &RecommendationConfig) -> Self {
        Self::new(config.special_probability, StdRng::from_entropy())
    }

    /// Deterministic generator for replays and tests.
    pub fn seeded(special_probability: f64, seed: u64) -> Self {
        Self::new(special_probability, StdRng::seed_from_u64(seed))
    }

    pub const fn special_probability(&self) -> f64 {
        self.special_probability
    }

    /// Draw six distinct numbers, rejecting repeats, sorted ascending.
    pub fn draw_numbers(&mut self) -> Vec<u8> {
        let mut numbers = Vec::with_capacity(LOTTO_PICK_COUNT);
        while numbers.len() < LOTTO_PICK_COUNT {
            let n = self.rng.gen_range(LOTTO_MIN_NUMBER..=LOTTO_MAX_NUMBER);
            if !numbers.contains(&n) {
                numbers.push(n);
            }
        }
        numbers.sort_unstable();
        numbers
    }

    fn draw_special(&mut self, numbers: &[u8]) -> Vec<u8> {
        if self.rng.gen_bool(self.special_probability) {
            numbers.to_vec()
        } else {
            Vec::new()
        }
    }

    fn next_id(&mut self) -> Uuid {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }

    /// Fresh recommendation for `store_name`.
    pub fn generate(&mut self, store_name: &str, now: DateTime<Utc>) -> Recommendation {
        let numbers = self.draw_numbers();
        let special_numbers = self.draw_special(&numbers);
        Recommendation {
            id: self.next_id(),
            numbers,
            special_numbers,
            store_name: store_name.to_string(),
            created_at: now,
        }
    }

    /// New numbers for an existing entry, keeping its id and store.
    pub fn regenerate(&mut self, existing: &Recommendation, now: DateTime<Utc>) -> Recommendation {
        let numbers = self.draw_numbers();
        let special_numbers = self.draw_special(&numbers);
        Recommendation {
            id: existing.id,
            numbers,
            special_numbers,
            store_name: existing.store_name.clone(),
            created_at: now,
        }
    }
}

impl std::fmt::Debug for RecommendationGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecommendationGenerator")
            .field("special_probability", &self.special_probability)
            .finish_non_exhaustive()
    }
}
