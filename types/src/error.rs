//! Error type shared by the domain types.

use thiserror::Error;

use crate::ids::{FeedbackId, ProductId};

/// Errors raised while parsing or validating ledger-mirrored values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("rating must be between 1 and 5, got {0}")]
    InvalidRating(u8),

    #[error("product {id} has inconsistent rating totals: sum {total} over {count} ratings")]
    InvalidRatingTotals {
        id: ProductId,
        total: u64,
        count: u64,
    },

    #[error(
        "feedback {id} has inconsistent ledger flags \
         (approved={approved}, rejected={rejected}, rewarded={rewarded})"
    )]
    InconsistentFeedbackStatus {
        id: FeedbackId,
        approved: bool,
        rejected: bool,
        rewarded: bool,
    },

    #[error("unknown feedback status: {0}")]
    UnknownStatus(String),
}
