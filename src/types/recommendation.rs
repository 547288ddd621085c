//! Generated number sets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::defaults::{LOTTO_MAX_NUMBER, LOTTO_MIN_NUMBER, LOTTO_PICK_COUNT};

/// Violated payload invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecommendationError {
    #[error("expected {expected} numbers, got {actual}")]
    WrongCount { expected: usize, actual: usize },
    #[error("number {0} is outside [{LOTTO_MIN_NUMBER}, {LOTTO_MAX_NUMBER}]")]
    OutOfRange(u8),
    #[error("numbers are not strictly ascending: {0:?}")]
    NotAscending(Vec<u8>),
    #[error("special number {0} is not one of the drawn numbers")]
    StraySpecial(u8),
}

/// A lotto number recommendation tied to the store that triggered it.
///
/// Serialized with camelCase keys; `date` is accepted for `createdAt` so
/// histories written by earlier clients still load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: Uuid,
    pub numbers: Vec<u8>,
    #[serde(default)]
    pub special_numbers: Vec<u8>,
    pub store_name: String,
    #[serde(alias = "date")]
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    /// Check every payload invariant.
    pub fn validate(&self) -> Result<(), RecommendationError> {
        if self.numbers.len() != LOTTO_PICK_COUNT {
            return Err(RecommendationError::WrongCount {
                expected: LOTTO_PICK_COUNT,
                actual: self.numbers.len(),
            });
        }
        if let Some(&n) = self
            .numbers
            .iter()
            .find(|n| !(LOTTO_MIN_NUMBER..=LOTTO_MAX_NUMBER).contains(*n))
        {
            return Err(RecommendationError::OutOfRange(n));
        }
        // Strictly ascending implies distinct
        if !self.numbers.windows(2).all(|w| w[0] < w[1]) {
            return Err(RecommendationError::NotAscending(self.numbers.clone()));
        }
        if let Some(&s) = self
            .special_numbers
            .iter()
            .find(|s| !self.numbers.contains(s))
        {
            return Err(RecommendationError::StraySpecial(s));
        }
        Ok(())
    }

    /// True when every drawn number is highlighted.
    pub fn is_all_special(&self) -> bool {
        !self.special_numbers.is_empty() && self.special_numbers == self.numbers
    }

    /// Numbers as shown to the user: zero-padded, comma separated.
    pub fn formatted_numbers(&self) -> String {
        self.numbers
            .iter()
            .map(|n| format!("{n:02}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
