//! Subjects and kinds of write actions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;
use crate::ids::{FeedbackId, ProductId};

/// Identifies the subject of a write action.
///
/// At most one write may be in flight per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EntityKey {
    Product(ProductId),
    Feedback(FeedbackId),
    /// The listing collection of an owner; subject of product creation.
    Catalog(Address),
    /// The reward balance of an account.
    Rewards(Address),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product(id) => write!(f, "product {id}"),
            Self::Feedback(id) => write!(f, "feedback {id}"),
            Self::Catalog(owner) => write!(f, "catalog of {}", owner.short()),
            Self::Rewards(account) => write!(f, "rewards of {}", account.short()),
        }
    }
}

/// The kinds of write the marketplace contract accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CreateProduct,
    SubmitFeedback,
    ApproveFeedback,
    RejectFeedback,
    ClaimRewards,
    DeactivateProduct,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateProduct => "create_product",
            Self::SubmitFeedback => "submit_feedback",
            Self::ApproveFeedback => "approve_feedback",
            Self::RejectFeedback => "reject_feedback",
            Self::ClaimRewards => "claim_rewards",
            Self::DeactivateProduct => "deactivate_product",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
