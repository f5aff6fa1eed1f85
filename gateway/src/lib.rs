//! Access to the marketplace contract and the image pinning service.
//!
//! Both collaborators live outside this workspace. This crate defines the
//! seams ([`ContractGateway`], [`ImageHost`]) the client is written against,
//! and ships HTTP implementations of each:
//! - [`JsonRpcGateway`]: JSON-RPC to a signing bridge that holds the wallet
//!   and forwards calls to the contract.
//! - [`PinataImageHost`]: uploads to Pinata and resolves public gateway URLs.

pub mod call;
pub mod contract;
pub mod error;
pub mod image;
pub mod json_rpc;
pub mod pinata;

pub use call::{ContractCall, Receipt};
pub use contract::ContractGateway;
pub use error::GatewayError;
pub use image::{ImageFile, ImageHost};
pub use json_rpc::JsonRpcGateway;
pub use pinata::PinataImageHost;
