use std::time::Duration;

use market_gateway::GatewayError;
use market_types::{ActionKind, EntityKey, MarketError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("please connect your wallet first")]
    AuthRequired,

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("an action on {0} is already in progress")]
    AlreadyInProgress(EntityKey),

    #[error("{kind} on {key} already finished; reset it before retrying")]
    ResetRequired { key: EntityKey, kind: ActionKind },

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("failed to load data: {0}")]
    Fetch(#[source] GatewayError),

    #[error("transaction not confirmed within {0:?}")]
    Timeout(Duration),

    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Market(#[from] MarketError),
}

impl ClientError {
    /// Whether the error was raised locally, before any gateway write.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::AuthRequired
                | Self::PreconditionFailed(_)
                | Self::AlreadyInProgress(_)
                | Self::ResetRequired { .. }
        )
    }
}
