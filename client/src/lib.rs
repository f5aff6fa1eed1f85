//! Client logic for the review marketplace.
//!
//! The ledger (a smart contract reached through [`market_gateway`]) owns all
//! durable state. This crate holds what happens on the client side of it:
//! - [`lifecycle`]: the single state machine every write goes through, with
//!   duplicate-submission guarding and refetch on settlement
//! - [`list_view`]: search, filter, sort and pagination over fetched lists
//! - [`catalog`]: the data-fetch boundary and feedback status derivation
//! - [`publish`]: the image-then-listing product creation flow

pub mod action;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod known_state;
pub mod lifecycle;
pub mod list_view;
pub mod metrics;
pub mod publish;
pub mod session;
pub mod stats;

pub use action::{Action, ValidationRules};
pub use catalog::{Catalog, FetchState, Snapshot};
pub use config::ClientConfig;
pub use error::ClientError;
pub use event::{EventBus, LifecycleEvent};
pub use known_state::KnownState;
pub use lifecycle::{
    DataRefresher, Failure, FailureReason, LifecycleController, LifecycleRecord, Phase, Ticket,
};
pub use list_view::{ListViewController, Listable, PageView, SortKey, ViewParams};
pub use metrics::ClientMetrics;
pub use publish::{ImageSource, ProductDraft, ProductPublisher, PublishedProduct};
pub use session::Session;
pub use stats::OwnerStats;
