//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator of the client (clock, contract gateway,
//! image host) is abstracted behind a trait. This crate provides
//! test-friendly implementations that:
//! - Return deterministic values
//! - Can be scripted programmatically (outcomes, failures, stalls)
//! - Record every call for later assertions
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod gateway;
pub mod image;

pub use clock::NullClock;
pub use gateway::{ConfirmOutcome, NullGateway, SubmitOutcome};
pub use image::NullImageHost;
