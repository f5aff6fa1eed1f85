//! Feedback entries and their ledger-derived status.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::address::Address;
use crate::error::MarketError;
use crate::ids::{FeedbackId, ProductId};
use crate::rating::Rating;
use crate::time::Timestamp;

/// A review left on a product. Read-only mirror of ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: FeedbackId,
    pub product_id: ProductId,
    pub reviewer: Address,
    pub comment: String,
    /// Raw rating as stored on the ledger (1–5 for well-formed entries).
    pub rating: u8,
    pub created_at: Timestamp,
    pub is_verified: bool,
}

impl Feedback {
    /// The rating, or `None` if the ledger holds an out-of-range value.
    pub fn valid_rating(&self) -> Option<Rating> {
        Rating::new(self.rating).ok()
    }
}

/// Moderation status of a feedback entry.
///
/// Never stored locally: always derived from [`FeedbackFlags`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Pending,
    Approved,
    Rejected,
}

impl FeedbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether the product owner can still approve or reject.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(MarketError::UnknownStatus(other.to_string())),
        }
    }
}

/// The three boolean ledger predicates a status is derived from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackFlags {
    pub approved: bool,
    pub rejected: bool,
    pub rewarded: bool,
}

impl FeedbackFlags {
    /// Derive the status.
    ///
    /// `approved` and `rejected` are mutually exclusive on the ledger, and a
    /// reward is only paid on approval. Any other combination is reported
    /// instead of being mapped onto a guessed status.
    pub fn status(&self, id: FeedbackId) -> Result<FeedbackStatus, MarketError> {
        match (self.approved, self.rejected, self.rewarded) {
            (false, false, false) => Ok(FeedbackStatus::Pending),
            (true, false, _) => Ok(FeedbackStatus::Approved),
            (false, true, false) => Ok(FeedbackStatus::Rejected),
            _ => Err(MarketError::InconsistentFeedbackStatus {
                id,
                approved: self.approved,
                rejected: self.rejected,
                rewarded: self.rewarded,
            }),
        }
    }
}

/// Feedback paired with the status derived on the most recent fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewedFeedback {
    pub feedback: Feedback,
    pub status: FeedbackStatus,
}

impl ReviewedFeedback {
    pub fn from_flags(feedback: Feedback, flags: FeedbackFlags) -> Result<Self, MarketError> {
        let status = flags.status(feedback.id)?;
        Ok(Self { feedback, status })
    }
}
