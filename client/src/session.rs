//! The identity a user acts under.

use market_types::Address;

use crate::error::ClientError;

/// Wallet session passed explicitly to every operation that needs an
/// identity. A disconnected session can still read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Session {
    account: Option<Address>,
}

impl Session {
    pub fn connected(account: Address) -> Self {
        Self {
            account: Some(account),
        }
    }

    pub fn disconnected() -> Self {
        Self { account: None }
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub fn require_account(&self) -> Result<Address, ClientError> {
        self.account.ok_or(ClientError::AuthRequired)
    }
}
