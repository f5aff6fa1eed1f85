//! Data-fetch boundary between the client and the ledger.
//!
//! Every collection read from the gateway is kept as a [`FetchState`] so an
//! empty collection is never confused with a failed fetch. Feedback status
//! is derived here, from one batched predicate query per list. The catalog
//! is also the refetch target the lifecycle controller calls on settlement.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use market_gateway::{ContractGateway, GatewayError};
use market_types::{
    ActionKind, Address, EntityKey, Feedback, FeedbackId, Product, ProductId, ReviewedFeedback,
    RewardPoolStatus, Wei,
};

use crate::action::Action;
use crate::error::ClientError;
use crate::known_state::KnownState;
use crate::lifecycle::DataRefresher;
use crate::metrics::ClientMetrics;
use crate::stats::OwnerStats;

/// Result of the most recent fetch of one collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FetchState<T> {
    #[default]
    NotLoaded,
    Loaded(T),
    /// The fetch failed; the message is suitable for display next to a
    /// retry affordance.
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Everything fetched so far.
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    pub products: FetchState<Vec<Product>>,
    pub owned: BTreeMap<Address, FetchState<Vec<Product>>>,
    pub feedback: BTreeMap<ProductId, FetchState<Vec<ReviewedFeedback>>>,
    /// Pending feedback awaiting moderation, per product owner.
    pub pending: BTreeMap<Address, FetchState<Vec<ReviewedFeedback>>>,
    pub rewards: BTreeMap<Address, FetchState<Wei>>,
}

fn holds_feedback(state: &FetchState<Vec<ReviewedFeedback>>, id: FeedbackId) -> bool {
    state
        .loaded()
        .is_some_and(|list| list.iter().any(|r| r.feedback.id == id))
}

pub struct Catalog {
    gateway: Arc<dyn ContractGateway>,
    metrics: Arc<ClientMetrics>,
    snapshot: Mutex<Snapshot>,
}

impl Catalog {
    pub fn new(gateway: Arc<dyn ContractGateway>) -> Self {
        Self {
            gateway,
            metrics: Arc::new(ClientMetrics::new()),
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn ContractGateway> {
        &self.gateway
    }

    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    fn fetch_failed(&self, what: &str, err: GatewayError) -> (String, ClientError) {
        self.metrics.fetch_failures.inc();
        tracing::warn!(what, error = %err, "fetch failed");
        (err.to_string(), ClientError::Fetch(err))
    }

    /// Drop products whose rating totals could not come from 1–5 stars.
    fn sane(products: Vec<Product>) -> Vec<Product> {
        products
            .into_iter()
            .filter(|p| match p.check_invariants() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping product with inconsistent ratings");
                    false
                }
            })
            .collect()
    }

    /// Pair every entry with the status derived from its ledger predicates.
    async fn derive_statuses(
        &self,
        feedback: Vec<Feedback>,
    ) -> Result<Vec<ReviewedFeedback>, ClientError> {
        if feedback.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<FeedbackId> = feedback.iter().map(|f| f.id).collect();
        let flags = self
            .gateway
            .feedback_flags_batch(&ids)
            .await
            .map_err(|e| self.fetch_failed("feedback status", e).1)?;
        if flags.len() != feedback.len() {
            return Err(ClientError::Fetch(GatewayError::Decode(format!(
                "{} status results for {} feedback entries",
                flags.len(),
                feedback.len()
            ))));
        }
        let reviewed = feedback
            .into_iter()
            .zip(flags)
            .map(|(f, flags)| ReviewedFeedback::from_flags(f, flags))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reviewed)
    }

    pub async fn load_products(&self) -> Result<Vec<Product>, ClientError> {
        match self.gateway.all_products().await {
            Ok(products) => {
                let products = Self::sane(products);
                tracing::debug!(count = products.len(), "products loaded");
                self.lock().products = FetchState::Loaded(products.clone());
                Ok(products)
            }
            Err(e) => {
                let (msg, err) = self.fetch_failed("products", e);
                self.lock().products = FetchState::Failed(msg);
                Err(err)
            }
        }
    }

    /// One page of products straight from the ledger, in ledger order.
    pub async fn load_products_page(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, ClientError> {
        self.gateway
            .products_paginated(offset, limit)
            .await
            .map(Self::sane)
            .map_err(|e| self.fetch_failed("product page", e).1)
    }

    /// Fetch one product and patch it into every cached list holding it.
    pub async fn load_product(&self, id: ProductId) -> Result<Product, ClientError> {
        let product = self
            .gateway
            .product(id)
            .await
            .map_err(|e| self.fetch_failed("product", e).1)?;
        product.check_invariants()?;

        let mut guard = self.lock();
        let snapshot: &mut Snapshot = &mut guard;
        let lists = std::iter::once(&mut snapshot.products).chain(snapshot.owned.values_mut());
        for state in lists {
            if let FetchState::Loaded(list) = state {
                if let Some(slot) = list.iter_mut().find(|p| p.id == id) {
                    *slot = product.clone();
                }
            }
        }
        Ok(product)
    }

    pub async fn load_owner_products(&self, owner: &Address) -> Result<Vec<Product>, ClientError> {
        match self.gateway.user_products(owner).await {
            Ok(products) => {
                let products = Self::sane(products);
                self.lock()
                    .owned
                    .insert(*owner, FetchState::Loaded(products.clone()));
                Ok(products)
            }
            Err(e) => {
                let (msg, err) = self.fetch_failed("owner products", e);
                self.lock().owned.insert(*owner, FetchState::Failed(msg));
                Err(err)
            }
        }
    }

    pub async fn load_feedback(
        &self,
        product: ProductId,
    ) -> Result<Vec<ReviewedFeedback>, ClientError> {
        let result = match self.gateway.product_feedbacks(product).await {
            Ok(feedback) => self.derive_statuses(feedback).await,
            Err(e) => Err(self.fetch_failed("feedback", e).1),
        };
        let state = match &result {
            Ok(list) => FetchState::Loaded(list.clone()),
            Err(e) => FetchState::Failed(e.to_string()),
        };
        self.lock().feedback.insert(product, state);
        result
    }

    /// Feedback awaiting `owner`'s moderation.
    pub async fn load_pending(&self, owner: &Address) -> Result<Vec<ReviewedFeedback>, ClientError> {
        let result = match self.gateway.pending_feedbacks(owner).await {
            Ok(feedback) => self.derive_statuses(feedback).await,
            Err(e) => Err(self.fetch_failed("pending feedback", e).1),
        };
        let state = match &result {
            Ok(list) => FetchState::Loaded(list.clone()),
            Err(e) => FetchState::Failed(e.to_string()),
        };
        self.lock().pending.insert(*owner, state);
        result
    }

    pub async fn load_rewards(&self, account: &Address) -> Result<Wei, ClientError> {
        match self.gateway.pending_rewards(account).await {
            Ok(amount) => {
                self.lock()
                    .rewards
                    .insert(*account, FetchState::Loaded(amount));
                Ok(amount)
            }
            Err(e) => {
                let (msg, err) = self.fetch_failed("rewards", e);
                self.lock().rewards.insert(*account, FetchState::Failed(msg));
                Err(err)
            }
        }
    }

    pub async fn reward_pool(&self) -> Result<RewardPoolStatus, ClientError> {
        self.gateway
            .reward_pool_status()
            .await
            .map_err(|e| self.fetch_failed("reward pool", e).1)
    }

    pub async fn creation_fee(&self) -> Result<Wei, ClientError> {
        self.gateway
            .product_creation_fee()
            .await
            .map_err(|e| self.fetch_failed("creation fee", e).1)
    }

    pub async fn has_reviewed(
        &self,
        account: &Address,
        product: ProductId,
    ) -> Result<bool, ClientError> {
        self.gateway
            .has_reviewed(account, product)
            .await
            .map_err(|e| self.fetch_failed("review check", e).1)
    }

    pub async fn owner_stats(&self, owner: &Address) -> Result<OwnerStats, ClientError> {
        let products = self.load_owner_products(owner).await?;
        Ok(OwnerStats::from_products(&products))
    }

    /// Fetch the ledger facts `action` by `account` depends on.
    pub async fn known_state(
        &self,
        action: &Action,
        account: &Address,
    ) -> Result<KnownState, ClientError> {
        let mut known = KnownState::unknown();
        match action {
            Action::SubmitFeedback { product_id, .. } => {
                let product = self.load_product(*product_id).await?;
                known.product_owner = Some(product.owner);
                known.product_active = Some(product.is_active);
                known.has_reviewed = Some(self.has_reviewed(account, *product_id).await?);
            }
            Action::DeactivateProduct { product_id } => {
                let product = self.load_product(*product_id).await?;
                known.product_owner = Some(product.owner);
                known.product_active = Some(product.is_active);
            }
            Action::ApproveFeedback { feedback_id } | Action::RejectFeedback { feedback_id, .. } => {
                let flags = self
                    .gateway
                    .feedback_flags(*feedback_id)
                    .await
                    .map_err(|e| self.fetch_failed("feedback status", e).1)?;
                known.feedback_status = Some(flags.status(*feedback_id)?);
            }
            Action::ClaimRewards => {
                known.pending_rewards = Some(self.load_rewards(account).await?);
            }
            Action::CreateProduct { .. } => {}
        }
        Ok(known)
    }
}

#[async_trait]
impl DataRefresher for Catalog {
    async fn refresh(&self, key: &EntityKey, kind: ActionKind) -> Result<(), ClientError> {
        tracing::debug!(%key, %kind, "refetching after write");
        let products_loaded = self.lock().products.is_loaded();
        match key {
            EntityKey::Product(id) => {
                self.load_product(*id).await?;
                if kind == ActionKind::SubmitFeedback {
                    self.load_feedback(*id).await?;
                }
            }
            EntityKey::Catalog(owner) => {
                self.load_owner_products(owner).await?;
                if products_loaded {
                    self.load_products().await?;
                }
            }
            EntityKey::Feedback(id) => {
                let (products, owners): (Vec<ProductId>, Vec<Address>) = {
                    let snapshot = self.lock();
                    (
                        snapshot
                            .feedback
                            .iter()
                            .filter(|(_, state)| holds_feedback(state, *id))
                            .map(|(product, _)| *product)
                            .collect(),
                        snapshot
                            .pending
                            .iter()
                            .filter(|(_, state)| holds_feedback(state, *id))
                            .map(|(owner, _)| *owner)
                            .collect(),
                    )
                };
                if products.is_empty() && owners.is_empty() {
                    self.gateway
                        .feedback_flags(*id)
                        .await
                        .map_err(|e| self.fetch_failed("feedback status", e).1)?;
                }
                for product in products {
                    self.load_feedback(product).await?;
                }
                for owner in owners {
                    self.load_pending(&owner).await?;
                }
            }
            EntityKey::Rewards(account) => {
                self.load_rewards(account).await?;
            }
        }
        Ok(())
    }
}
