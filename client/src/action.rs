//! User intents that write to the ledger, and their local validation.

use market_gateway::ContractCall;
use market_types::{ActionKind, Address, EntityKey, FeedbackId, ProductId, Rating, Wei};

use crate::error::ClientError;

/// Thresholds applied before anything reaches the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidationRules {
    /// Minimum comment length in characters, after trimming.
    pub min_comment_len: usize,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_comment_len: 10,
        }
    }
}

/// A write the user asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    CreateProduct {
        name: String,
        description: String,
        image_url: String,
        product_url: String,
        fee: Wei,
    },
    SubmitFeedback {
        product_id: ProductId,
        comment: String,
        rating: u8,
    },
    ApproveFeedback {
        feedback_id: FeedbackId,
    },
    RejectFeedback {
        feedback_id: FeedbackId,
        reason: String,
    },
    ClaimRewards,
    DeactivateProduct {
        product_id: ProductId,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::CreateProduct { .. } => ActionKind::CreateProduct,
            Self::SubmitFeedback { .. } => ActionKind::SubmitFeedback,
            Self::ApproveFeedback { .. } => ActionKind::ApproveFeedback,
            Self::RejectFeedback { .. } => ActionKind::RejectFeedback,
            Self::ClaimRewards => ActionKind::ClaimRewards,
            Self::DeactivateProduct { .. } => ActionKind::DeactivateProduct,
        }
    }

    /// The subject used to deduplicate in-flight writes.
    ///
    /// Feedback submission is keyed on the product being reviewed; product
    /// creation on the acting account's catalog.
    pub fn entity_key(&self, account: &Address) -> EntityKey {
        match self {
            Self::CreateProduct { .. } => EntityKey::Catalog(*account),
            Self::SubmitFeedback { product_id, .. } | Self::DeactivateProduct { product_id } => {
                EntityKey::Product(*product_id)
            }
            Self::ApproveFeedback { feedback_id } | Self::RejectFeedback { feedback_id, .. } => {
                EntityKey::Feedback(*feedback_id)
            }
            Self::ClaimRewards => EntityKey::Rewards(*account),
        }
    }

    /// Check the user's input. Nothing here needs ledger state.
    pub fn validate(&self, rules: &ValidationRules) -> Result<(), ClientError> {
        match self {
            Self::CreateProduct {
                name,
                description,
                product_url,
                fee,
                ..
            } => {
                require_text("product name", name)?;
                require_text("description", description)?;
                require_text("product URL", product_url)?;
                let url = product_url.trim();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ClientError::Validation(
                        "product URL must start with http:// or https://".into(),
                    ));
                }
                if fee.is_zero() {
                    return Err(ClientError::Validation(
                        "product creation fee must be non-zero".into(),
                    ));
                }
                Ok(())
            }
            Self::SubmitFeedback {
                comment, rating, ..
            } => {
                if Rating::new(*rating).is_err() {
                    return Err(ClientError::Validation("please select a rating".into()));
                }
                if comment.trim().chars().count() < rules.min_comment_len {
                    return Err(ClientError::Validation(format!(
                        "please provide a comment with at least {} characters",
                        rules.min_comment_len
                    )));
                }
                Ok(())
            }
            Self::RejectFeedback { reason, .. } => require_text("rejection reason", reason),
            Self::ApproveFeedback { .. } | Self::ClaimRewards | Self::DeactivateProduct { .. } => {
                Ok(())
            }
        }
    }

    /// The contract call carrying this action. Free text is sent trimmed.
    pub fn into_call(self) -> ContractCall {
        match self {
            Self::CreateProduct {
                name,
                description,
                image_url,
                product_url,
                fee,
            } => ContractCall::CreateProduct {
                name: name.trim().to_string(),
                description: description.trim().to_string(),
                image_url,
                product_url: product_url.trim().to_string(),
                fee,
            },
            Self::SubmitFeedback {
                product_id,
                comment,
                rating,
            } => ContractCall::SubmitFeedback {
                product_id,
                comment: comment.trim().to_string(),
                rating,
            },
            Self::ApproveFeedback { feedback_id } => ContractCall::ApproveFeedback { feedback_id },
            Self::RejectFeedback {
                feedback_id,
                reason,
            } => ContractCall::RejectFeedback {
                feedback_id,
                reason: reason.trim().to_string(),
            },
            Self::ClaimRewards => ContractCall::ClaimRewards,
            Self::DeactivateProduct { product_id } => {
                ContractCall::DeactivateProduct { product_id }
            }
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        Err(ClientError::Validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(rating: u8, comment: &str) -> Action {
        Action::SubmitFeedback {
            product_id: ProductId(1),
            comment: comment.into(),
            rating,
        }
    }

    #[test]
    fn feedback_needs_rating_and_long_enough_comment() {
        let rules = ValidationRules::default();
        assert!(feedback(0, "short").validate(&rules).is_err());
        assert!(feedback(6, "long enough comment").validate(&rules).is_err());
        assert!(feedback(4, "   padded   ").validate(&rules).is_err());
        assert!(feedback(4, "exactly10!").validate(&rules).is_ok());
    }

    #[test]
    fn comment_length_counts_characters() {
        let rules = ValidationRules { min_comment_len: 4 };
        assert!(feedback(3, "ééé").validate(&rules).is_err());
        assert!(feedback(3, "éééé").validate(&rules).is_ok());
    }

    #[test]
    fn rejection_needs_reason() {
        let rules = ValidationRules::default();
        let action = Action::RejectFeedback {
            feedback_id: FeedbackId(2),
            reason: " \t".into(),
        };
        assert!(matches!(action.validate(&rules), Err(ClientError::Validation(_))));
    }

    #[test]
    fn product_creation_checks_fields() {
        let rules = ValidationRules::default();
        let valid = Action::CreateProduct {
            name: "Lens".into(),
            description: "Explorer".into(),
            image_url: "https://ipfs.io/ipfs/cid".into(),
            product_url: "https://lens.example".into(),
            fee: Wei::new(1),
        };
        assert!(valid.validate(&rules).is_ok());

        let mut bad_url = valid.clone();
        if let Action::CreateProduct { product_url, .. } = &mut bad_url {
            *product_url = "lens.example".into();
        }
        assert!(bad_url.validate(&rules).is_err());

        let mut no_fee = valid;
        if let Action::CreateProduct { fee, .. } = &mut no_fee {
            *fee = Wei::ZERO;
        }
        assert!(no_fee.validate(&rules).is_err());
    }

    #[test]
    fn entity_keys() {
        let me = Address::new([9; 20]);
        assert_eq!(Action::ClaimRewards.entity_key(&me), EntityKey::Rewards(me));
        assert_eq!(
            feedback(5, "great product").entity_key(&me),
            EntityKey::Product(ProductId(1))
        );
        assert_eq!(
            Action::ApproveFeedback {
                feedback_id: FeedbackId(4)
            }
            .entity_key(&me),
            EntityKey::Feedback(FeedbackId(4))
        );
    }

    #[test]
    fn call_carries_trimmed_text() {
        let call = feedback(5, "  great product  ").into_call();
        assert_eq!(
            call,
            ContractCall::SubmitFeedback {
                product_id: ProductId(1),
                comment: "great product".into(),
                rating: 5,
            }
        );
    }
}
