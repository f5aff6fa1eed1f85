//! Product listing as mirrored from the ledger.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::MarketError;
use crate::ids::ProductId;
use crate::rating::RatingRatio;
use crate::time::Timestamp;

/// A product listed on the marketplace. Read-only mirror of ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub owner: Address,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub product_url: String,
    pub created_at: Timestamp,
    /// Cumulative sum of every rating received.
    pub total_rating: u64,
    pub rating_count: u64,
    pub is_active: bool,
}

impl Product {
    pub fn rating_ratio(&self) -> RatingRatio {
        RatingRatio::new(self.total_rating, self.rating_count)
    }

    /// Average star rating, `0.0` when unrated.
    pub fn average_rating(&self) -> f64 {
        self.rating_ratio().average()
    }

    pub fn is_owned_by(&self, account: &Address) -> bool {
        &self.owner == account
    }

    /// Reject ledger data whose totals could not come from 1–5 star ratings.
    pub fn check_invariants(&self) -> Result<(), MarketError> {
        if self.rating_ratio().is_consistent() {
            Ok(())
        } else {
            Err(MarketError::InvalidRatingTotals {
                id: self.id,
                total: self.total_rating,
                count: self.rating_count,
            })
        }
    }
}
