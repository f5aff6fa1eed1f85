//! Lifecycle transitions published to subscribers.

use std::sync::RwLock;

use market_types::{ActionKind, EntityKey, TxHash};

use crate::lifecycle::FailureReason;

/// A phase transition of a write action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Validated and reserved; about to be submitted.
    Started { key: EntityKey, kind: ActionKind },
    /// Accepted by the gateway; awaiting confirmation.
    Submitted {
        key: EntityKey,
        kind: ActionKind,
        tx: TxHash,
    },
    /// Confirmed on the ledger. Dependent data was refetched before this
    /// event was published; `refreshed` is false if that refetch failed.
    Settled {
        key: EntityKey,
        kind: ActionKind,
        tx: TxHash,
        refreshed: bool,
    },
    Failed {
        key: EntityKey,
        kind: ActionKind,
        reason: FailureReason,
        message: String,
    },
    /// The caller dropped an in-flight action. The ledger transaction, if
    /// any, was not cancelled.
    Abandoned { key: EntityKey, kind: ActionKind },
    /// A terminal record was dismissed.
    Reset { key: EntityKey },
}

impl LifecycleEvent {
    pub fn key(&self) -> &EntityKey {
        match self {
            Self::Started { key, .. }
            | Self::Submitted { key, .. }
            | Self::Settled { key, .. }
            | Self::Failed { key, .. }
            | Self::Abandoned { key, .. }
            | Self::Reset { key } => key,
        }
    }
}

type Listener = Box<dyn Fn(&LifecycleEvent) + Send + Sync>;

/// Synchronous fan-out event bus for lifecycle events.
///
/// Listeners are invoked inline on the emitting task; keep handlers fast.
/// A listener must not subscribe from inside its own callback.
pub struct EventBus {
    listeners: RwLock<Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(listener);
    }

    pub fn emit(&self, event: &LifecycleEvent) {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_types::ProductId;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn key() -> EntityKey {
        EntityKey::Product(ProductId(1))
    }

    #[test]
    fn emit_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let bus = EventBus::new();

        let c1 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        }));

        let c2 = Arc::clone(&counter);
        bus.subscribe(Box::new(move |_| {
            c2.fetch_add(10, Ordering::SeqCst);
        }));

        bus.emit(&LifecycleEvent::Reset { key: key() });

        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn emit_with_no_listeners_is_noop() {
        let bus = EventBus::default();
        assert_eq!(bus.listener_count(), 0);
        bus.emit(&LifecycleEvent::Abandoned {
            key: key(),
            kind: ActionKind::SubmitFeedback,
        });
    }

    #[test]
    fn listener_receives_correct_event_variant() {
        let saw_started = Arc::new(AtomicUsize::new(0));
        let saw_failed = Arc::new(AtomicUsize::new(0));
        let bus = EventBus::new();

        let ss = Arc::clone(&saw_started);
        let sf = Arc::clone(&saw_failed);
        bus.subscribe(Box::new(move |event| match event {
            LifecycleEvent::Started { .. } => {
                ss.fetch_add(1, Ordering::SeqCst);
            }
            LifecycleEvent::Failed { .. } => {
                sf.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }));

        bus.emit(&LifecycleEvent::Started {
            key: key(),
            kind: ActionKind::SubmitFeedback,
        });
        bus.emit(&LifecycleEvent::Failed {
            key: key(),
            kind: ActionKind::SubmitFeedback,
            reason: FailureReason::UserRejected,
            message: "rejected".into(),
        });

        assert_eq!(saw_started.load(Ordering::SeqCst), 1);
        assert_eq!(saw_failed.load(Ordering::SeqCst), 1);
    }
}
