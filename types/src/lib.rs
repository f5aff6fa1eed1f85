//! Domain types for the review marketplace client.
//!
//! Everything here mirrors state owned by the external marketplace contract:
//! products, feedback, reward balances, plus the identifiers and amounts used
//! to address them. Derived values (average rating, feedback status) are
//! computed from ledger fields and never stored.

pub mod address;
pub mod amount;
pub mod entity;
pub mod error;
pub mod feedback;
pub mod hash;
pub mod ids;
pub mod product;
pub mod rating;
pub mod reward;
pub mod time;

pub use address::Address;
pub use amount::{Wei, WEI_PER_ETHER};
pub use entity::{ActionKind, EntityKey};
pub use error::MarketError;
pub use feedback::{Feedback, FeedbackFlags, FeedbackStatus, ReviewedFeedback};
pub use hash::TxHash;
pub use ids::{ContentId, FeedbackId, ProductId};
pub use product::Product;
pub use rating::{Rating, RatingDistribution, RatingRatio};
pub use reward::RewardPoolStatus;
pub use time::{Clock, SystemClock, Timestamp};
