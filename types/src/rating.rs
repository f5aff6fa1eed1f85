//! Star ratings and the derived average.
//!
//! The ledger stores a cumulative sum and a count per product. The average
//! is always derived from those two numbers: `sum / count` when `count > 0`,
//! otherwise `0`. Comparisons between averages are done by integer
//! cross-multiplication so ordering is exact.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::MarketError;

/// A single 1–5 star rating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, MarketError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(MarketError::InvalidRating(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = MarketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(r: Rating) -> u8 {
        r.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/5", self.0)
    }
}

/// Cumulative rating sum over a rating count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RatingRatio {
    pub sum: u64,
    pub count: u64,
}

impl RatingRatio {
    pub fn new(sum: u64, count: u64) -> Self {
        Self { sum, count }
    }

    /// Average rating; `0.0` when nothing has been rated.
    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    /// Compare averages exactly. An unrated ratio averages to zero.
    pub fn cmp_average(&self, other: &Self) -> Ordering {
        match (self.count, other.count) {
            (0, 0) => Ordering::Equal,
            (0, _) => 0u128.cmp(&u128::from(other.sum)),
            (_, 0) => u128::from(self.sum).cmp(&0),
            _ => {
                let lhs = u128::from(self.sum) * u128::from(other.count);
                let rhs = u128::from(other.sum) * u128::from(self.count);
                lhs.cmp(&rhs)
            }
        }
    }

    /// Whether the average is at least `min` stars (inclusive).
    pub fn meets_minimum(&self, min: u8) -> bool {
        if self.count == 0 {
            return min == 0;
        }
        u128::from(self.sum) >= u128::from(min) * u128::from(self.count)
    }

    /// `count <= sum <= 5 * count`, i.e. every rating was within 1–5.
    pub fn is_consistent(&self) -> bool {
        let max = u128::from(self.count) * u128::from(Rating::MAX);
        let sum = u128::from(self.sum);
        sum >= u128::from(self.count) && sum <= max
    }
}

/// Histogram of ratings 1..=5 over a set of reviews.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RatingDistribution {
    counts: [u64; 5],
}

impl RatingDistribution {
    /// Build from raw rating values. Out-of-range values are skipped.
    pub fn from_ratings(ratings: impl IntoIterator<Item = u8>) -> Self {
        let mut counts = [0u64; 5];
        for r in ratings {
            if let Ok(rating) = Rating::new(r) {
                counts[usize::from(rating.value() - 1)] += 1;
            }
        }
        Self { counts }
    }

    /// Number of reviews with exactly `stars` stars (0 for out-of-range).
    pub fn count(&self, stars: u8) -> u64 {
        Rating::new(stars)
            .map(|r| self.counts[usize::from(r.value() - 1)])
            .unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Share of reviews with `stars` stars, as a percentage.
    pub fn percentage(&self, stars: u8) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.count(stars) as f64 * 100.0 / total as f64
        }
    }
}
