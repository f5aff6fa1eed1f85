//! Transaction lifecycle controller.
//!
//! Every write goes through the same state machine:
//!
//! ```text
//! Idle -> Submitting -> AwaitingConfirmation -> Settled
//!              \                 \
//!               +-----------------+-> Failed
//! ```
//!
//! [`LifecycleController::begin`] performs every local check and reserves
//! the entity key; [`LifecycleController::drive`] talks to the gateway.
//! At most one non-terminal record exists per [`EntityKey`]. Terminal
//! records stay visible until [`LifecycleController::reset`] dismisses them.
//!
//! The registry lock is only held for bookkeeping, never across an await.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use market_gateway::{ContractCall, ContractGateway, GatewayError, Receipt};
use market_types::{ActionKind, Address, Clock, EntityKey, SystemClock, Timestamp, TxHash};

use crate::action::{Action, ValidationRules};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::event::{EventBus, LifecycleEvent};
use crate::known_state::KnownState;
use crate::metrics::ClientMetrics;
use crate::session::Session;

const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Submitting,
    AwaitingConfirmation,
    Settled,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::AwaitingConfirmation => "awaiting confirmation",
            Self::Settled => "settled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a write ended in [`Phase::Failed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// The user declined to sign.
    UserRejected,
    /// The contract's own checks refused the call.
    PreconditionFailed,
    /// Network failure, revert, or any other gateway error.
    Gateway,
    /// No confirmation within the configured timeout. The write may still
    /// land; the key is flagged for reconciliation.
    Timeout,
}

impl FailureReason {
    pub fn classify(err: &GatewayError) -> Self {
        match err {
            GatewayError::UserRejected => Self::UserRejected,
            GatewayError::PreconditionFailed(_) => Self::PreconditionFailed,
            _ => Self::Gateway,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRejected => "user_rejected",
            Self::PreconditionFailed => "precondition_failed",
            Self::Gateway => "gateway",
            Self::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub reason: FailureReason,
    pub message: String,
}

/// Local progress of one write action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleRecord {
    pub key: EntityKey,
    pub kind: ActionKind,
    pub phase: Phase,
    pub tx: Option<TxHash>,
    pub failure: Option<Failure>,
    pub started_at: Timestamp,
    pub updated_at: Timestamp,
    generation: u64,
}

/// Re-reads the data a settled write affects.
#[async_trait]
pub trait DataRefresher: Send + Sync {
    async fn refresh(&self, key: &EntityKey, kind: ActionKind) -> Result<(), ClientError>;
}

#[derive(Default)]
struct Registry {
    records: HashMap<EntityKey, LifecycleRecord>,
    /// Keys whose last write ended with an unknown outcome, with the action
    /// that was pending.
    unreconciled: HashMap<EntityKey, ActionKind>,
    next_generation: u64,
}

#[derive(Default)]
struct Shared {
    registry: Mutex<Registry>,
    events: EventBus,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A reserved, not yet driven write.
///
/// Dropping a ticket before its action reaches a terminal phase discards
/// the local record and frees the entity key. A transaction already handed
/// to the gateway is not cancelled.
pub struct Ticket {
    key: EntityKey,
    kind: ActionKind,
    account: Address,
    call: ContractCall,
    generation: u64,
    shared: Arc<Shared>,
    metrics: Arc<ClientMetrics>,
    armed: bool,
}

impl Ticket {
    pub fn key(&self) -> EntityKey {
        self.key
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn call(&self) -> &ContractCall {
        &self.call
    }
}

impl fmt::Debug for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ticket")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let removed = {
            let mut registry = self.shared.lock();
            let owned = registry.records.get(&self.key).is_some_and(|r| {
                r.generation == self.generation && !r.phase.is_terminal()
            });
            if owned {
                registry.records.remove(&self.key);
            }
            owned
        };
        if removed {
            self.metrics.actions_in_flight.dec();
            tracing::warn!(key = %self.key, kind = %self.kind, "in-flight action abandoned");
            self.shared.events.emit(&LifecycleEvent::Abandoned {
                key: self.key,
                kind: self.kind,
            });
        }
    }
}

/// Drives write actions against the ledger. Cheap to clone; clones share
/// the same registry and subscribers.
#[derive(Clone)]
pub struct LifecycleController {
    gateway: Arc<dyn ContractGateway>,
    refresher: Arc<dyn DataRefresher>,
    rules: ValidationRules,
    confirmation_timeout: Duration,
    clock: Arc<dyn Clock>,
    metrics: Arc<ClientMetrics>,
    shared: Arc<Shared>,
}

impl LifecycleController {
    pub fn new(gateway: Arc<dyn ContractGateway>, refresher: Arc<dyn DataRefresher>) -> Self {
        Self {
            gateway,
            refresher,
            rules: ValidationRules::default(),
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            clock: Arc::new(SystemClock),
            metrics: Arc::new(ClientMetrics::new()),
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn from_config(
        gateway: Arc<dyn ContractGateway>,
        refresher: Arc<dyn DataRefresher>,
        config: &ClientConfig,
    ) -> Self {
        Self::new(gateway, refresher)
            .with_rules(ValidationRules {
                min_comment_len: config.min_comment_len,
            })
            .with_confirmation_timeout(config.confirmation_timeout())
    }

    pub fn with_rules(mut self, rules: ValidationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }

    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    pub fn subscribe(&self, listener: Box<dyn Fn(&LifecycleEvent) + Send + Sync>) {
        self.shared.events.subscribe(listener);
    }

    /// Whether an action of `kind` on `key` would be admitted right now.
    ///
    /// Lets callers with expensive preparation (uploads, extra reads) fail
    /// early with the same error [`begin`](Self::begin) would return.
    pub fn can_begin(&self, key: &EntityKey, kind: ActionKind) -> Result<(), ClientError> {
        let registry = self.shared.lock();
        self.admit(registry.records.get(key), *key, kind)
    }

    fn admit(
        &self,
        existing: Option<&LifecycleRecord>,
        key: EntityKey,
        kind: ActionKind,
    ) -> Result<(), ClientError> {
        let Some(existing) = existing else {
            return Ok(());
        };
        if !existing.phase.is_terminal() {
            self.metrics.duplicate_submissions.inc();
            tracing::debug!(%key, %kind, "duplicate submission refused");
            return Err(ClientError::AlreadyInProgress(key));
        }
        if existing.kind == kind {
            self.metrics.local_rejections.inc();
            return Err(ClientError::ResetRequired { key, kind });
        }
        Ok(())
    }

    /// Validate, authenticate, check known preconditions, then reserve the
    /// entity key. Nothing is sent to the gateway.
    pub fn begin(
        &self,
        session: &Session,
        action: Action,
        known: &KnownState,
    ) -> Result<Ticket, ClientError> {
        let account = match self.check(session, &action, known) {
            Ok(account) => account,
            Err(e) => {
                self.metrics.local_rejections.inc();
                tracing::debug!(kind = %action.kind(), error = %e, "action refused locally");
                return Err(e);
            }
        };
        let key = action.entity_key(&account);
        let kind = action.kind();
        let now = self.clock.now();

        let generation = {
            let mut registry = self.shared.lock();
            self.admit(registry.records.get(&key), key, kind)?;
            registry.next_generation += 1;
            let generation = registry.next_generation;
            registry.records.insert(
                key,
                LifecycleRecord {
                    key,
                    kind,
                    phase: Phase::Submitting,
                    tx: None,
                    failure: None,
                    started_at: now,
                    updated_at: now,
                    generation,
                },
            );
            generation
        };

        self.metrics.actions_started.inc();
        self.metrics.actions_in_flight.inc();
        tracing::info!(%key, %kind, "action started");
        self.shared
            .events
            .emit(&LifecycleEvent::Started { key, kind });

        Ok(Ticket {
            key,
            kind,
            account,
            call: action.into_call(),
            generation,
            shared: Arc::clone(&self.shared),
            metrics: Arc::clone(&self.metrics),
            armed: true,
        })
    }

    /// Submit the reserved action and follow it to a terminal phase.
    ///
    /// On confirmation the affected data is refetched before the record
    /// becomes [`Phase::Settled`]. Failures leave local data untouched.
    pub async fn drive(&self, mut ticket: Ticket) -> Result<Receipt, ClientError> {
        let outcome = self.run(&ticket).await;
        ticket.armed = false;
        outcome
    }

    /// [`begin`](Self::begin) followed by [`drive`](Self::drive).
    pub async fn execute(
        &self,
        session: &Session,
        action: Action,
        known: &KnownState,
    ) -> Result<Receipt, ClientError> {
        let ticket = self.begin(session, action, known)?;
        self.drive(ticket).await
    }

    async fn run(&self, ticket: &Ticket) -> Result<Receipt, ClientError> {
        let (key, kind) = (ticket.key, ticket.kind);

        let tx = match self.gateway.submit(&ticket.account, &ticket.call).await {
            Ok(tx) => tx,
            Err(e) => {
                let reason = FailureReason::classify(&e);
                return Err(self.fail(ticket, reason, e.to_string(), ClientError::Gateway(e)));
            }
        };
        self.update(ticket, |record| {
            record.phase = Phase::AwaitingConfirmation;
            record.tx = Some(tx);
        });
        tracing::info!(%key, %kind, %tx, "transaction submitted");
        self.shared
            .events
            .emit(&LifecycleEvent::Submitted { key, kind, tx });

        let submitted_at = Instant::now();
        let confirmation = tokio::time::timeout(
            self.confirmation_timeout,
            self.gateway.wait_for_confirmation(&tx),
        )
        .await;
        let receipt = match confirmation {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                if e.leaves_outcome_unknown() {
                    self.shared.lock().unreconciled.insert(key, kind);
                }
                let reason = FailureReason::classify(&e);
                return Err(self.fail(ticket, reason, e.to_string(), ClientError::Gateway(e)));
            }
            Err(_) => {
                self.shared.lock().unreconciled.insert(key, kind);
                self.metrics.actions_timed_out.inc();
                let message = format!(
                    "transaction {tx} not confirmed within {}s; it may still land",
                    self.confirmation_timeout.as_secs()
                );
                return Err(self.fail(
                    ticket,
                    FailureReason::Timeout,
                    message,
                    ClientError::Timeout(self.confirmation_timeout),
                ));
            }
        };
        self.metrics
            .confirmation_latency_ms
            .observe(submitted_at.elapsed().as_secs_f64() * 1_000.0);

        let refreshed = match self.refresher.refresh(&key, kind).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%key, %kind, error = %e, "refetch after settlement failed");
                false
            }
        };

        self.update(ticket, |record| record.phase = Phase::Settled);
        if refreshed {
            self.shared.lock().unreconciled.remove(&key);
        }
        self.metrics.actions_settled.inc();
        self.metrics.actions_in_flight.dec();
        tracing::info!(%key, %kind, %tx, block = receipt.block_number, "action settled");
        self.shared.events.emit(&LifecycleEvent::Settled {
            key,
            kind,
            tx,
            refreshed,
        });
        Ok(receipt)
    }

    fn check(
        &self,
        session: &Session,
        action: &Action,
        known: &KnownState,
    ) -> Result<Address, ClientError> {
        action.validate(&self.rules)?;
        let account = session.require_account()?;
        known.check(action, &account)?;
        Ok(account)
    }

    fn update(&self, ticket: &Ticket, f: impl FnOnce(&mut LifecycleRecord)) {
        let now = self.clock.now();
        let mut registry = self.shared.lock();
        if let Some(record) = registry
            .records
            .get_mut(&ticket.key)
            .filter(|r| r.generation == ticket.generation)
        {
            f(record);
            record.updated_at = now;
        }
    }

    fn fail(
        &self,
        ticket: &Ticket,
        reason: FailureReason,
        message: String,
        error: ClientError,
    ) -> ClientError {
        self.update(ticket, |record| {
            record.phase = Phase::Failed;
            record.failure = Some(Failure {
                reason,
                message: message.clone(),
            });
        });
        self.metrics.actions_failed.inc();
        self.metrics.actions_in_flight.dec();
        tracing::warn!(key = %ticket.key, kind = %ticket.kind, %reason, %message, "action failed");
        self.shared.events.emit(&LifecycleEvent::Failed {
            key: ticket.key,
            kind: ticket.kind,
            reason,
            message,
        });
        error
    }

    /// Dismiss a terminal record, returning the key to [`Phase::Idle`].
    pub fn reset(&self, key: &EntityKey) -> Result<(), ClientError> {
        {
            let mut registry = self.shared.lock();
            let terminal = match registry.records.get(key) {
                None => return Ok(()),
                Some(record) => record.phase.is_terminal(),
            };
            if !terminal {
                return Err(ClientError::AlreadyInProgress(*key));
            }
            registry.records.remove(key);
        }
        self.shared.events.emit(&LifecycleEvent::Reset { key: *key });
        Ok(())
    }

    pub fn phase(&self, key: &EntityKey) -> Phase {
        self.shared
            .lock()
            .records
            .get(key)
            .map_or(Phase::Idle, |r| r.phase)
    }

    pub fn record(&self, key: &EntityKey) -> Option<LifecycleRecord> {
        self.shared.lock().records.get(key).cloned()
    }

    /// Every record, oldest first.
    pub fn records(&self) -> Vec<LifecycleRecord> {
        let mut records: Vec<_> = self.shared.lock().records.values().cloned().collect();
        records.sort_by_key(|r| r.generation);
        records
    }

    /// Keys whose last write ended with an unknown outcome (a timeout or a
    /// transport failure after submission) and whose data may be stale.
    pub fn needs_reconciliation(&self) -> Vec<EntityKey> {
        let mut keys: Vec<_> = self.shared.lock().unreconciled.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Refetch the data behind every timed-out key. Returns the keys
    /// reconciled; on error, keys not yet refreshed stay flagged.
    pub async fn reconcile(&self) -> Result<Vec<EntityKey>, ClientError> {
        let mut pending: Vec<(EntityKey, ActionKind)> = self
            .shared
            .lock()
            .unreconciled
            .iter()
            .map(|(k, v)| (*k, *v))
            .collect();
        pending.sort();

        let mut done = Vec::with_capacity(pending.len());
        for (key, kind) in pending {
            self.refresher.refresh(&key, kind).await?;
            self.shared.lock().unreconciled.remove(&key);
            tracing::info!(%key, %kind, "reconciled");
            done.push(key);
        }
        Ok(done)
    }
}
