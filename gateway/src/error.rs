use thiserror::Error;

/// Failures reported by the contract gateway or the image host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("request was rejected in the wallet")]
    UserRejected,

    #[error("contract precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("gateway RPC error: {0}")]
    Rpc(String),

    #[error("invalid gateway response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("image upload failed: {0}")]
    Upload(String),
}

impl GatewayError {
    /// Classify an error message returned by the signing bridge.
    pub fn from_rpc_message(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();
        if lower.contains("user rejected") || lower.contains("user denied") {
            Self::UserRejected
        } else if lower.contains("reverted") {
            Self::Reverted(message.to_string())
        } else if lower.contains("precondition") || lower.contains("simulation failed") {
            Self::PreconditionFailed(message.to_string())
        } else if lower.contains("not found") || lower.contains("does not exist") {
            Self::NotFound(message.to_string())
        } else {
            Self::Rpc(message.to_string())
        }
    }

    /// Whether a failure while awaiting confirmation says nothing about
    /// whether the submitted transaction landed.
    pub fn leaves_outcome_unknown(&self) -> bool {
        !matches!(
            self,
            Self::UserRejected | Self::PreconditionFailed(_) | Self::Reverted(_)
        )
    }
}
