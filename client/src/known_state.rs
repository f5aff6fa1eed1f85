//! Ledger facts already known to the caller, checked before a write.
//!
//! Every field is optional: an unknown fact is not checked locally and the
//! contract remains the final authority.

use market_types::{Address, FeedbackStatus, Wei};

use crate::action::Action;
use crate::error::ClientError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KnownState {
    /// Whether the acting account already reviewed the product.
    pub has_reviewed: Option<bool>,
    /// Reward balance of the acting account.
    pub pending_rewards: Option<Wei>,
    /// Owner of the product the action concerns.
    pub product_owner: Option<Address>,
    pub product_active: Option<bool>,
    /// Current status of the feedback the action concerns.
    pub feedback_status: Option<FeedbackStatus>,
}

impl KnownState {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn with_pending_rewards(mut self, amount: Wei) -> Self {
        self.pending_rewards = Some(amount);
        self
    }

    pub fn with_has_reviewed(mut self, reviewed: bool) -> Self {
        self.has_reviewed = Some(reviewed);
        self
    }

    pub fn with_product_owner(mut self, owner: Address) -> Self {
        self.product_owner = Some(owner);
        self
    }

    pub fn with_feedback_status(mut self, status: FeedbackStatus) -> Self {
        self.feedback_status = Some(status);
        self
    }

    /// Reject `action` by `account` if a known fact rules it out.
    pub fn check(&self, action: &Action, account: &Address) -> Result<(), ClientError> {
        let fail = |msg: &str| Err(ClientError::PreconditionFailed(msg.to_string()));
        let owned_by_other = self.product_owner.is_some_and(|owner| owner != *account);
        let owned_by_self = self.product_owner == Some(*account);

        match action {
            Action::SubmitFeedback { .. } => {
                if self.has_reviewed == Some(true) {
                    return fail("you have already reviewed this product");
                }
                if owned_by_self {
                    return fail("you cannot review your own product");
                }
                if self.product_active == Some(false) {
                    return fail("product is no longer active");
                }
            }
            Action::ApproveFeedback { .. } | Action::RejectFeedback { .. } => {
                if owned_by_other {
                    return fail("only the product owner can moderate its feedback");
                }
                if let Some(status) = self.feedback_status {
                    if !status.is_actionable() {
                        return Err(ClientError::PreconditionFailed(format!(
                            "feedback is already {status}"
                        )));
                    }
                }
            }
            Action::ClaimRewards => {
                if self.pending_rewards.is_some_and(|w| w.is_zero()) {
                    return fail("no rewards to claim");
                }
            }
            Action::DeactivateProduct { .. } => {
                if owned_by_other {
                    return fail("only the product owner can deactivate it");
                }
                if self.product_active == Some(false) {
                    return fail("product is already inactive");
                }
            }
            Action::CreateProduct { .. } => {}
        }
        Ok(())
    }
}
