use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use market_client::{
    Action, Catalog, ClientError, DataRefresher, FailureReason, KnownState, LifecycleController,
    LifecycleEvent, Phase, Session,
};
use market_gateway::{ContractGateway, GatewayError};
use market_nullables::{ConfirmOutcome, NullGateway, SubmitOutcome};
use market_types::{
    ActionKind, Address, EntityKey, Feedback, FeedbackId, Product, ProductId, Timestamp, Wei,
};

fn owner() -> Address {
    Address::new([0xaa; 20])
}

fn reviewer() -> Address {
    Address::new([0xbb; 20])
}

fn product(id: u64) -> Product {
    Product {
        id: ProductId(id),
        owner: owner(),
        name: format!("product {id}"),
        description: "a product".into(),
        image_url: String::new(),
        product_url: "https://p.example".into(),
        created_at: Timestamp::new(1_000 + id),
        total_rating: 0,
        rating_count: 0,
        is_active: true,
    }
}

fn review(product: u64) -> Action {
    Action::SubmitFeedback {
        product_id: ProductId(product),
        comment: "clear docs, fast support".into(),
        rating: 5,
    }
}

/// Records refetches into a log shared with event listeners.
#[derive(Default)]
struct LoggingRefresher {
    log: Arc<Mutex<Vec<String>>>,
    calls: AtomicUsize,
}

#[async_trait]
impl DataRefresher for LoggingRefresher {
    async fn refresh(&self, key: &EntityKey, _: ActionKind) -> Result<(), ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(format!("refresh {key}"));
        Ok(())
    }
}

fn setup() -> (Arc<NullGateway>, Arc<LoggingRefresher>, LifecycleController) {
    let gateway = Arc::new(NullGateway::new());
    gateway.add_product(product(1));
    let refresher = Arc::new(LoggingRefresher::default());
    let lifecycle = LifecycleController::new(gateway.clone(), refresher.clone());
    (gateway, refresher, lifecycle)
}

async fn wait_for_phase(lifecycle: &LifecycleController, key: &EntityKey, phase: Phase) {
    for _ in 0..200 {
        if lifecycle.phase(key) == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("{key} never reached {phase}");
}

#[tokio::test]
async fn second_begin_while_reserved_is_refused_without_gateway_call() {
    let (gateway, _, lifecycle) = setup();
    let session = Session::connected(reviewer());

    let ticket = lifecycle
        .begin(&session, review(1), &KnownState::unknown())
        .unwrap();
    let err = lifecycle
        .begin(&session, review(1), &KnownState::unknown())
        .unwrap_err();
    assert!(matches!(err, ClientError::AlreadyInProgress(EntityKey::Product(ProductId(1)))));
    assert_eq!(gateway.submit_count(), 0);

    lifecycle.drive(ticket).await.unwrap();
    assert_eq!(gateway.submit_count(), 1);
    assert_eq!(lifecycle.metrics().duplicate_submissions.get(), 1);
}

#[tokio::test]
async fn duplicate_while_awaiting_confirmation_is_refused() {
    let (gateway, _, lifecycle) = setup();
    let session = Session::connected(reviewer());
    let gate = Arc::new(Notify::new());
    gateway.script_confirm(ConfirmOutcome::Gate(gate.clone()));
    let key = EntityKey::Product(ProductId(1));

    let runner = lifecycle.clone();
    let first = tokio::spawn(async move {
        runner
            .execute(&session, review(1), &KnownState::unknown())
            .await
    });
    wait_for_phase(&lifecycle, &key, Phase::AwaitingConfirmation).await;

    let err = lifecycle
        .execute(&session, review(1), &KnownState::unknown())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AlreadyInProgress(_)));

    gate.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(gateway.submit_count(), 1);
    assert_eq!(lifecycle.phase(&key), Phase::Settled);
}

#[tokio::test]
async fn invalid_feedback_never_reaches_gateway() {
    let (gateway, refresher, lifecycle) = setup();
    let action = Action::SubmitFeedback {
        product_id: ProductId(1),
        comment: "short".into(),
        rating: 0,
    };
    let err = lifecycle
        .execute(&Session::connected(reviewer()), action, &KnownState::unknown())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(err.is_local());
    assert_eq!(gateway.submit_count(), 0);
    assert_eq!(gateway.read_count(), 0);
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    assert!(lifecycle.records().is_empty());
}

#[tokio::test]
async fn disconnected_session_needs_auth() {
    let (gateway, _, lifecycle) = setup();
    let err = lifecycle
        .execute(&Session::disconnected(), review(1), &KnownState::unknown())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::AuthRequired));
    assert_eq!(gateway.submit_count(), 0);
}

#[tokio::test]
async fn claim_with_zero_balance_is_refused_locally() {
    let gateway = Arc::new(NullGateway::new());
    let catalog = Arc::new(Catalog::new(gateway.clone()));
    let lifecycle = LifecycleController::new(gateway.clone(), catalog.clone());

    let known = catalog
        .known_state(&Action::ClaimRewards, &reviewer())
        .await
        .unwrap();
    let err = lifecycle
        .execute(&Session::connected(reviewer()), Action::ClaimRewards, &known)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::PreconditionFailed(_)));
    assert_eq!(gateway.submit_count(), 0);
    assert_eq!(lifecycle.phase(&EntityKey::Rewards(reviewer())), Phase::Idle);
}

#[tokio::test]
async fn refetch_happens_before_settled_is_published() {
    let (_, refresher, lifecycle) = setup();
    let log = refresher.log.clone();
    let events = log.clone();
    lifecycle.subscribe(Box::new(move |event| {
        if let LifecycleEvent::Settled { refreshed, .. } = event {
            events.lock().unwrap().push(format!("settled refreshed={refreshed}"));
        }
    }));

    lifecycle
        .execute(
            &Session::connected(reviewer()),
            review(1),
            &KnownState::unknown(),
        )
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "refresh product #1".to_string(),
            "settled refreshed=true".to_string()
        ]
    );
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn events_follow_the_phase_order() {
    let (_, _, lifecycle) = setup();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    lifecycle.subscribe(Box::new(move |event| {
        let name = match event {
            LifecycleEvent::Started { .. } => "started",
            LifecycleEvent::Submitted { .. } => "submitted",
            LifecycleEvent::Settled { .. } => "settled",
            LifecycleEvent::Failed { .. } => "failed",
            LifecycleEvent::Abandoned { .. } => "abandoned",
            LifecycleEvent::Reset { .. } => "reset",
        };
        sink.lock().unwrap().push(name);
    }));

    let key = EntityKey::Product(ProductId(1));
    lifecycle
        .execute(
            &Session::connected(reviewer()),
            review(1),
            &KnownState::unknown(),
        )
        .await
        .unwrap();
    lifecycle.reset(&key).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["started", "submitted", "settled", "reset"]
    );
    assert_eq!(lifecycle.phase(&key), Phase::Idle);
}

#[tokio::test]
async fn wallet_rejection_fails_and_requires_reset() {
    let (gateway, refresher, lifecycle) = setup();
    let session = Session::connected(reviewer());
    let key = EntityKey::Product(ProductId(1));
    gateway.script_submit(SubmitOutcome::Fail(GatewayError::UserRejected));

    let err = lifecycle
        .execute(&session, review(1), &KnownState::unknown())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Gateway(GatewayError::UserRejected)));
    let record = lifecycle.record(&key).unwrap();
    assert_eq!(record.phase, Phase::Failed);
    assert_eq!(record.tx, None);
    assert_eq!(
        record.failure.map(|f| f.reason),
        Some(FailureReason::UserRejected)
    );
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);

    let err = lifecycle
        .execute(&session, review(1), &KnownState::unknown())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::ResetRequired { .. }));
    assert_eq!(gateway.submit_count(), 1);

    lifecycle.reset(&key).unwrap();
    lifecycle
        .execute(&session, review(1), &KnownState::unknown())
        .await
        .unwrap();
    assert_eq!(gateway.submit_count(), 2);
}

#[tokio::test]
async fn revert_after_submission_keeps_tx_reference() {
    let (gateway, _, lifecycle) = setup();
    gateway.script_confirm(ConfirmOutcome::Fail(GatewayError::Reverted(
        "Already reviewed".into(),
    )));
    let key = EntityKey::Product(ProductId(1));

    let err = lifecycle
        .execute(
            &Session::connected(reviewer()),
            review(1),
            &KnownState::unknown(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Gateway(GatewayError::Reverted(_))));
    let record = lifecycle.record(&key).unwrap();
    assert!(record.tx.is_some());
    assert_eq!(record.failure.unwrap().reason, FailureReason::Gateway);
    // Nothing was applied to the ledger.
    assert!(gateway.product_feedbacks(ProductId(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn confirmation_timeout_flags_key_for_reconciliation() {
    let (gateway, refresher, lifecycle) = setup();
    let lifecycle = lifecycle.with_confirmation_timeout(Duration::from_millis(30));
    gateway.script_confirm(ConfirmOutcome::Hang);
    let key = EntityKey::Product(ProductId(1));

    let err = lifecycle
        .execute(
            &Session::connected(reviewer()),
            review(1),
            &KnownState::unknown(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
    assert_eq!(
        lifecycle.record(&key).unwrap().failure.unwrap().reason,
        FailureReason::Timeout
    );
    assert_eq!(lifecycle.needs_reconciliation(), vec![key]);
    assert_eq!(lifecycle.metrics().actions_timed_out.get(), 1);

    let reconciled = lifecycle.reconcile().await.unwrap();
    assert_eq!(reconciled, vec![key]);
    assert!(lifecycle.needs_reconciliation().is_empty());
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn transport_failure_after_submission_flags_key() {
    let (gateway, _, lifecycle) = setup();
    gateway.script_confirm(ConfirmOutcome::Fail(GatewayError::Network(
        "connection reset".into(),
    )));
    let key = EntityKey::Product(ProductId(1));

    let err = lifecycle
        .execute(
            &Session::connected(reviewer()),
            review(1),
            &KnownState::unknown(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Gateway(GatewayError::Network(_))));
    let record = lifecycle.record(&key).unwrap();
    assert!(record.tx.is_some());
    assert_eq!(record.failure.unwrap().reason, FailureReason::Gateway);
    assert_eq!(lifecycle.needs_reconciliation(), vec![key]);
}

#[tokio::test]
async fn revert_is_not_flagged_for_reconciliation() {
    let (gateway, _, lifecycle) = setup();
    gateway.script_confirm(ConfirmOutcome::Fail(GatewayError::Reverted(
        "Already reviewed".into(),
    )));

    lifecycle
        .execute(
            &Session::connected(reviewer()),
            review(1),
            &KnownState::unknown(),
        )
        .await
        .unwrap_err();
    assert!(lifecycle.needs_reconciliation().is_empty());
}

#[tokio::test]
async fn later_settlement_clears_reconciliation_flag() {
    let (gateway, _, lifecycle) = setup();
    let lifecycle = lifecycle.with_confirmation_timeout(Duration::from_millis(30));
    gateway.script_confirm(ConfirmOutcome::Hang);
    let session = Session::connected(reviewer());
    let key = EntityKey::Product(ProductId(1));

    lifecycle
        .execute(&session, review(1), &KnownState::unknown())
        .await
        .unwrap_err();
    assert_eq!(lifecycle.needs_reconciliation(), vec![key]);

    lifecycle.reset(&key).unwrap();
    lifecycle
        .execute(&session, review(1), &KnownState::unknown())
        .await
        .unwrap();
    assert_eq!(lifecycle.phase(&key), Phase::Settled);
    assert!(lifecycle.needs_reconciliation().is_empty());
}

#[tokio::test]
async fn abandoning_the_drive_frees_the_key() {
    let (gateway, _, lifecycle) = setup();
    gateway.script_confirm(ConfirmOutcome::Hang);
    let session = Session::connected(reviewer());
    let key = EntityKey::Product(ProductId(1));
    let abandoned = Arc::new(AtomicUsize::new(0));
    let counter = abandoned.clone();
    lifecycle.subscribe(Box::new(move |event| {
        if matches!(event, LifecycleEvent::Abandoned { .. }) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let ticket = lifecycle
        .begin(&session, review(1), &KnownState::unknown())
        .unwrap();
    let outcome = tokio::time::timeout(Duration::from_millis(30), lifecycle.drive(ticket)).await;
    assert!(outcome.is_err());

    assert_eq!(lifecycle.phase(&key), Phase::Idle);
    assert_eq!(abandoned.load(Ordering::SeqCst), 1);
    assert_eq!(lifecycle.metrics().actions_in_flight.get(), 0);
    assert!(lifecycle
        .begin(&session, review(1), &KnownState::unknown())
        .is_ok());
}

#[tokio::test]
async fn reset_refuses_in_flight_record() {
    let (_, _, lifecycle) = setup();
    let ticket = lifecycle
        .begin(
            &Session::connected(reviewer()),
            review(1),
            &KnownState::unknown(),
        )
        .unwrap();
    assert!(matches!(
        lifecycle.reset(&ticket.key()),
        Err(ClientError::AlreadyInProgress(_))
    ));
}

#[tokio::test]
async fn different_action_replaces_terminal_record() {
    let (gateway, _, lifecycle) = setup();
    let session = Session::connected(owner());
    gateway.add_feedback(Feedback {
        id: FeedbackId(9),
        product_id: ProductId(1),
        reviewer: reviewer(),
        comment: "would buy again".into(),
        rating: 4,
        created_at: Timestamp::new(5),
        is_verified: true,
    });
    gateway.script_submit(SubmitOutcome::Fail(GatewayError::Network("offline".into())));
    let key = EntityKey::Feedback(FeedbackId(9));

    let approve = Action::ApproveFeedback {
        feedback_id: FeedbackId(9),
    };
    assert!(lifecycle
        .execute(&session, approve, &KnownState::unknown())
        .await
        .is_err());
    assert_eq!(lifecycle.phase(&key), Phase::Failed);

    let reject = Action::RejectFeedback {
        feedback_id: FeedbackId(9),
        reason: "off topic".into(),
    };
    lifecycle
        .execute(&session, reject, &KnownState::unknown())
        .await
        .unwrap();
    let record = lifecycle.record(&key).unwrap();
    assert_eq!(record.kind, ActionKind::RejectFeedback);
    assert_eq!(record.phase, Phase::Settled);
}

#[tokio::test]
async fn settled_claim_refetches_balance_through_catalog() {
    let gateway = Arc::new(NullGateway::new());
    gateway.set_pending_rewards(reviewer(), Wei::new(300));
    let catalog = Arc::new(Catalog::new(gateway.clone()));
    let lifecycle = LifecycleController::new(gateway.clone(), catalog.clone());
    let session = Session::connected(reviewer());

    let known = catalog
        .known_state(&Action::ClaimRewards, &reviewer())
        .await
        .unwrap();
    assert_eq!(known.pending_rewards, Some(Wei::new(300)));
    lifecycle
        .execute(&session, Action::ClaimRewards, &known)
        .await
        .unwrap();

    let snapshot = catalog.snapshot();
    assert_eq!(
        snapshot.rewards[&reviewer()].loaded().copied(),
        Some(Wei::ZERO)
    );
}
