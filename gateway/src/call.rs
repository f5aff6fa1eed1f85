//! Write calls accepted by the marketplace contract.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use market_types::{ActionKind, FeedbackId, ProductId, TxHash, Wei};

/// A state-changing contract call, fully parameterised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContractCall {
    CreateProduct {
        name: String,
        description: String,
        image_url: String,
        product_url: String,
        /// Listing fee sent along with the call.
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

impl ContractCall {
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

    /// Contract function name as it appears in the ABI.
    pub fn function_name(&self) -> &'static str {
        match self {
            Self::CreateProduct { .. } => "createProduct",
            Self::SubmitFeedback { .. } => "submitFeedback",
            Self::ApproveFeedback { .. } => "approveFeedback",
            Self::RejectFeedback { .. } => "rejectFeedback",
            Self::ClaimRewards => "claimRewards",
            Self::DeactivateProduct { .. } => "deactivateProduct",
        }
    }

    /// Positional arguments in ABI order. uint256 values are sent as strings.
    pub fn args(&self) -> Value {
        match self {
            Self::CreateProduct {
                name,
                description,
                image_url,
                product_url,
                ..
            } => json!([name, description, image_url, product_url]),
            Self::SubmitFeedback {
                product_id,
                comment,
                rating,
            } => json!([product_id.0.to_string(), comment, rating]),
            Self::ApproveFeedback { feedback_id } => json!([feedback_id.0.to_string()]),
            Self::RejectFeedback {
                feedback_id,
                reason,
            } => json!([feedback_id.0.to_string(), reason]),
            Self::ClaimRewards => json!([]),
            Self::DeactivateProduct { product_id } => json!([product_id.0.to_string()]),
        }
    }

    /// Native value attached to the call; only product creation is payable.
    pub fn value(&self) -> Wei {
        match self {
            Self::CreateProduct { fee, .. } => *fee,
            _ => Wei::ZERO,
        }
    }
}

/// Confirmation of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
}
