//! Nullable contract gateway: an in-memory ledger with scripted outcomes.
//!
//! Writes are recorded when submitted and applied to the in-memory state
//! only once confirmed, so a refetch after settlement observes the change
//! the same way it would against the real contract.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

use market_gateway::{ContractCall, ContractGateway, GatewayError, Receipt};
use market_types::{
    Address, Feedback, FeedbackFlags, FeedbackId, Product, ProductId, RewardPoolStatus,
    Timestamp, TxHash, Wei,
};

/// What the next `submit` call does.
#[derive(Clone, Debug)]
pub enum SubmitOutcome {
    Accept,
    Fail(GatewayError),
}

/// What the next `wait_for_confirmation` call does.
#[derive(Clone, Debug)]
pub enum ConfirmOutcome {
    Confirm,
    Fail(GatewayError),
    /// Never resolves.
    Hang,
    /// Confirms once the notify is signalled.
    Gate(Arc<Notify>),
}

struct State {
    products: BTreeMap<ProductId, Product>,
    feedback: BTreeMap<FeedbackId, Feedback>,
    flags: HashMap<FeedbackId, FeedbackFlags>,
    reviewed: HashSet<(Address, ProductId)>,
    rewards: HashMap<Address, Wei>,
    creation_fee: Wei,
    pool: RewardPoolStatus,
    now: Timestamp,

    submit_script: VecDeque<SubmitOutcome>,
    confirm_script: VecDeque<ConfirmOutcome>,
    read_failure: Option<GatewayError>,

    submitted: Vec<(Address, ContractCall)>,
    in_flight: HashMap<TxHash, (Address, ContractCall)>,
    next_tx: u64,
    block: u64,
    reads: usize,
    flag_batches: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            products: BTreeMap::new(),
            feedback: BTreeMap::new(),
            flags: HashMap::new(),
            reviewed: HashSet::new(),
            rewards: HashMap::new(),
            creation_fee: Wei::new(1_000_000_000_000_000),
            pool: RewardPoolStatus {
                current_pool: Wei::new(100_000_000_000_000_000),
                reward_per_feedback: Wei::new(100_000_000_000_000),
                remaining_rewards: 1_000,
            },
            now: Timestamp::new(1_700_000_000),
            submit_script: VecDeque::new(),
            confirm_script: VecDeque::new(),
            read_failure: None,
            submitted: Vec::new(),
            in_flight: HashMap::new(),
            next_tx: 1,
            block: 100,
            reads: 0,
            flag_batches: 0,
        }
    }
}

impl State {
    fn flags_of(&self, id: FeedbackId) -> FeedbackFlags {
        self.flags.get(&id).copied().unwrap_or_default()
    }

    fn is_pending(&self, id: FeedbackId) -> bool {
        self.flags_of(id) == FeedbackFlags::default()
    }

    fn apply(&mut self, from: Address, call: ContractCall) {
        match call {
            ContractCall::CreateProduct {
                name,
                description,
                image_url,
                product_url,
                ..
            } => {
                let id = ProductId(self.products.keys().last().map_or(1, |id| id.0 + 1));
                self.products.insert(
                    id,
                    Product {
                        id,
                        owner: from,
                        name,
                        description,
                        image_url,
                        product_url,
                        created_at: self.now,
                        total_rating: 0,
                        rating_count: 0,
                        is_active: true,
                    },
                );
            }
            ContractCall::SubmitFeedback {
                product_id,
                comment,
                rating,
            } => {
                let id = FeedbackId(self.feedback.keys().last().map_or(1, |id| id.0 + 1));
                self.feedback.insert(
                    id,
                    Feedback {
                        id,
                        product_id,
                        reviewer: from,
                        comment,
                        rating,
                        created_at: self.now,
                        is_verified: true,
                    },
                );
                self.reviewed.insert((from, product_id));
                if let Some(product) = self.products.get_mut(&product_id) {
                    product.total_rating += u64::from(rating);
                    product.rating_count += 1;
                }
            }
            ContractCall::ApproveFeedback { feedback_id } => {
                self.flags.insert(
                    feedback_id,
                    FeedbackFlags {
                        approved: true,
                        rejected: false,
                        rewarded: true,
                    },
                );
                if let Some(reviewer) = self.feedback.get(&feedback_id).map(|f| f.reviewer) {
                    let reward = self.pool.reward_per_feedback;
                    let balance = self.rewards.entry(reviewer).or_default();
                    *balance = balance.saturating_add(reward);
                    self.pool.current_pool = self.pool.current_pool.saturating_sub(reward);
                    self.pool.remaining_rewards = self.pool.remaining_rewards.saturating_sub(1);
                }
            }
            ContractCall::RejectFeedback { feedback_id, .. } => {
                self.flags.insert(
                    feedback_id,
                    FeedbackFlags {
                        approved: false,
                        rejected: true,
                        rewarded: false,
                    },
                );
            }
            ContractCall::ClaimRewards => {
                self.rewards.remove(&from);
            }
            ContractCall::DeactivateProduct { product_id } => {
                if let Some(product) = self.products.get_mut(&product_id) {
                    product.is_active = false;
                }
            }
        }
    }
}

/// A contract gateway backed by memory.
///
/// By default every submit is accepted and every confirmation succeeds;
/// script other outcomes with [`script_submit`](Self::script_submit) and
/// [`script_confirm`](Self::script_confirm).
#[derive(Default)]
pub struct NullGateway {
    state: Mutex<State>,
}

impl NullGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> Result<MutexGuard<'_, State>, GatewayError> {
        let mut state = self.lock();
        state.reads += 1;
        match &state.read_failure {
            Some(err) => Err(err.clone()),
            None => Ok(state),
        }
    }

    // --- seeding ---

    pub fn add_product(&self, product: Product) {
        self.lock().products.insert(product.id, product);
    }

    pub fn add_feedback(&self, feedback: Feedback) {
        let mut state = self.lock();
        state.reviewed.insert((feedback.reviewer, feedback.product_id));
        state.feedback.insert(feedback.id, feedback);
    }

    pub fn set_flags(&self, id: FeedbackId, flags: FeedbackFlags) {
        self.lock().flags.insert(id, flags);
    }

    pub fn set_pending_rewards(&self, account: Address, amount: Wei) {
        self.lock().rewards.insert(account, amount);
    }

    pub fn mark_reviewed(&self, account: Address, product: ProductId) {
        self.lock().reviewed.insert((account, product));
    }

    pub fn set_creation_fee(&self, fee: Wei) {
        self.lock().creation_fee = fee;
    }

    pub fn set_pool(&self, pool: RewardPoolStatus) {
        self.lock().pool = pool;
    }

    /// Ledger time stamped onto entities created by confirmed writes.
    pub fn set_time(&self, now: Timestamp) {
        self.lock().now = now;
    }

    // --- scripting ---

    pub fn script_submit(&self, outcome: SubmitOutcome) {
        self.lock().submit_script.push_back(outcome);
    }

    pub fn script_confirm(&self, outcome: ConfirmOutcome) {
        self.lock().confirm_script.push_back(outcome);
    }

    /// Make every read fail with `error` (`None` restores normal reads).
    pub fn fail_reads(&self, error: Option<GatewayError>) {
        self.lock().read_failure = error;
    }

    // --- observation ---

    /// Every call passed to `submit`, accepted or not.
    pub fn submitted(&self) -> Vec<ContractCall> {
        self.lock().submitted.iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn submit_count(&self) -> usize {
        self.lock().submitted.len()
    }

    pub fn read_count(&self) -> usize {
        self.lock().reads
    }

    /// Number of `feedback_flags_batch` round trips.
    pub fn flag_batch_count(&self) -> usize {
        self.lock().flag_batches
    }
}

#[async_trait]
impl ContractGateway for NullGateway {
    async fn all_products(&self) -> Result<Vec<Product>, GatewayError> {
        Ok(self.read()?.products.values().cloned().collect())
    }

    async fn products_paginated(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Product>, GatewayError> {
        let state = self.read()?;
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(state.products.values().skip(skip).take(take).cloned().collect())
    }

    async fn product(&self, id: ProductId) -> Result<Product, GatewayError> {
        self.read()?
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("product {id}")))
    }

    async fn user_products(&self, owner: &Address) -> Result<Vec<Product>, GatewayError> {
        Ok(self
            .read()?
            .products
            .values()
            .filter(|p| p.is_owned_by(owner))
            .cloned()
            .collect())
    }

    async fn product_feedbacks(&self, id: ProductId) -> Result<Vec<Feedback>, GatewayError> {
        Ok(self
            .read()?
            .feedback
            .values()
            .filter(|f| f.product_id == id)
            .cloned()
            .collect())
    }

    async fn pending_feedbacks(&self, owner: &Address) -> Result<Vec<Feedback>, GatewayError> {
        let state = self.read()?;
        Ok(state
            .feedback
            .values()
            .filter(|f| {
                state
                    .products
                    .get(&f.product_id)
                    .is_some_and(|p| p.is_owned_by(owner))
                    && state.is_pending(f.id)
            })
            .cloned()
            .collect())
    }

    async fn pending_rewards(&self, account: &Address) -> Result<Wei, GatewayError> {
        Ok(self.read()?.rewards.get(account).copied().unwrap_or_default())
    }

    async fn has_reviewed(
        &self,
        account: &Address,
        product: ProductId,
    ) -> Result<bool, GatewayError> {
        Ok(self.read()?.reviewed.contains(&(*account, product)))
    }

    async fn feedback_flags(&self, id: FeedbackId) -> Result<FeedbackFlags, GatewayError> {
        Ok(self.read()?.flags_of(id))
    }

    async fn feedback_flags_batch(
        &self,
        ids: &[FeedbackId],
    ) -> Result<Vec<FeedbackFlags>, GatewayError> {
        let mut state = self.read()?;
        state.flag_batches += 1;
        Ok(ids.iter().map(|id| state.flags_of(*id)).collect())
    }

    async fn product_creation_fee(&self) -> Result<Wei, GatewayError> {
        Ok(self.read()?.creation_fee)
    }

    async fn reward_pool_status(&self) -> Result<RewardPoolStatus, GatewayError> {
        Ok(self.read()?.pool)
    }

    async fn submit(&self, from: &Address, call: &ContractCall) -> Result<TxHash, GatewayError> {
        let mut state = self.lock();
        state.submitted.push((*from, call.clone()));
        match state.submit_script.pop_front().unwrap_or(SubmitOutcome::Accept) {
            SubmitOutcome::Fail(err) => Err(err),
            SubmitOutcome::Accept => {
                let mut bytes = [0u8; 32];
                bytes[24..].copy_from_slice(&state.next_tx.to_be_bytes());
                state.next_tx += 1;
                let tx = TxHash::new(bytes);
                state.in_flight.insert(tx, (*from, call.clone()));
                Ok(tx)
            }
        }
    }

    async fn wait_for_confirmation(&self, tx: &TxHash) -> Result<Receipt, GatewayError> {
        let outcome = self
            .lock()
            .confirm_script
            .pop_front()
            .unwrap_or(ConfirmOutcome::Confirm);
        match outcome {
            ConfirmOutcome::Fail(err) => return Err(err),
            ConfirmOutcome::Hang => return std::future::pending().await,
            ConfirmOutcome::Gate(gate) => gate.notified().await,
            ConfirmOutcome::Confirm => {}
        }

        let mut state = self.lock();
        let (from, call) = state
            .in_flight
            .remove(tx)
            .ok_or_else(|| GatewayError::NotFound(format!("transaction {tx}")))?;
        state.apply(from, call);
        state.block += 1;
        Ok(Receipt {
            tx_hash: *tx,
            block_number: state.block,
        })
    }
}
