//! Count-weighted distance between two token-frequency maps.
//!
//! ```text
//! d(a, b) = Σ |a_t - b_t| / Σ max(a_t, b_t)
//! ```
//!
//! summed over the union of tokens, with a token missing from one side
//! counting as 0 there. This is not set Jaccard: repeated tokens weigh in.

use crate::tokens::TokenFrequencyMap;

/// Distance reported when both maps are empty.
pub const EMPTY_DISTANCE: f64 = 1.0;

/// Running numerator/denominator of the metric.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DistanceSums {
    pub difference: u128,
    pub max: u128,
}

impl DistanceSums {
    /// Accumulate both passes over `a` and `b`.
    pub fn between(a: &TokenFrequencyMap, b: &TokenFrequencyMap) -> Self {
        let mut sums = Self::default();
        for (token, count_a) in a.iter() {
            match b.get(token) {
                Some(count_b) => {
                    sums.difference += count_a.abs_diff(count_b) as u128;
                    sums.max += count_a.max(count_b) as u128;
                }
                None => {
                    sums.difference += count_a as u128;
                    sums.max += count_a as u128;
                }
            }
        }
        for (token, count_b) in b.iter() {
            if !a.contains(token) {
                sums.difference += count_b as u128;
                sums.max += count_b as u128;
            }
        }
        sums
    }

    pub fn ratio(&self) -> f64 {
        if self.max == 0 {
            return EMPTY_DISTANCE;
        }
        self.difference as f64 / self.max as f64
    }
}

/// Distance in `[0, 1]` between two documents' token maps.
///
/// Sums are exact integers, so the result does not depend on hash iteration
/// order and `distance(a, b)` is bit-identical to `distance(b, a)`.
#[inline]
pub fn distance(a: &TokenFrequencyMap, b: &TokenFrequencyMap) -> f64 {
    DistanceSums::between(a, b).ratio()
}
