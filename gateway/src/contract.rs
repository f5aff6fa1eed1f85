//! The contract gateway seam.

use async_trait::async_trait;

use market_types::{
    Address, Feedback, FeedbackFlags, FeedbackId, Product, ProductId, RewardPoolStatus, TxHash,
    Wei,
};

use crate::call::{ContractCall, Receipt};
use crate::error::GatewayError;

/// Read and write access to the marketplace contract.
///
/// Writes are two-step: [`submit`](Self::submit) returns as soon as the
/// transaction is accepted for broadcast, and
/// [`wait_for_confirmation`](Self::wait_for_confirmation) resolves once it is
/// mined. Implementations must not retry writes internally.
#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn all_products(&self) -> Result<Vec<Product>, GatewayError>;

    async fn products_paginated(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, GatewayError>;

    async fn product(&self, id: ProductId) -> Result<Product, GatewayError>;

    async fn user_products(&self, owner: &Address) -> Result<Vec<Product>, GatewayError>;

    async fn product_feedbacks(&self, id: ProductId) -> Result<Vec<Feedback>, GatewayError>;

    /// Feedback awaiting moderation on products owned by `owner`.
    async fn pending_feedbacks(&self, owner: &Address) -> Result<Vec<Feedback>, GatewayError>;

    async fn pending_rewards(&self, account: &Address) -> Result<Wei, GatewayError>;

    async fn has_reviewed(
        &self,
        account: &Address,
        product: ProductId,
    ) -> Result<bool, GatewayError>;

    /// The approved / rejected / rewarded predicates for one feedback entry.
    async fn feedback_flags(&self, id: FeedbackId) -> Result<FeedbackFlags, GatewayError>;

    /// Predicates for many entries, in the order of `ids`.
    ///
    /// The default issues one query per entry; transports that can batch
    /// should override it.
    async fn feedback_flags_batch(
        &self,
        ids: &[FeedbackId],
    ) -> Result<Vec<FeedbackFlags>, GatewayError> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            out.push(self.feedback_flags(*id).await?);
        }
        Ok(out)
    }

    async fn product_creation_fee(&self) -> Result<Wei, GatewayError>;

    async fn reward_pool_status(&self) -> Result<RewardPoolStatus, GatewayError>;

    /// Sign and broadcast `call` from `from`. Returns the pending transaction.
    async fn submit(&self, from: &Address, call: &ContractCall) -> Result<TxHash, GatewayError>;

    /// Resolve once `tx` is mined. Reverted transactions are errors.
    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<Receipt, GatewayError>;
}
