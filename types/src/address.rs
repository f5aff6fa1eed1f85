//! Ledger account address (`0x`-prefixed, 20 bytes).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::MarketError;

/// An account on the marketplace ledger.
///
/// Parsing is case-insensitive; display is always lowercase hex so two
/// spellings of the same account compare and hash equal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Self = Self([0u8; 20]);

    pub const PREFIX: &'static str = "0x";

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a `0x`-prefixed, 40 hex digit address.
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| MarketError::InvalidAddress(raw.to_string()))?;
        if body.len() != 40 {
            return Err(MarketError::InvalidAddress(raw.to_string()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|_| MarketError::InvalidAddress(raw.to_string()))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Shortened display form, e.g. `0x1234...abcd`.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl FromStr for Address {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0x71C7656EC7ab88b098defB751B7401B5f6d8976F";

    #[test]
    fn parse_is_case_insensitive() {
        let upper = Address::parse(ALICE).unwrap();
        let lower = Address::parse(&ALICE.to_lowercase()).unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), ALICE.to_lowercase());
    }

    #[test]
    fn rejects_missing_prefix_and_bad_length() {
        assert!(Address::parse("71C7656EC7ab88b098defB751B7401B5f6d8976F").is_err());
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("0xZZC7656EC7ab88b098defB751B7401B5f6d8976F").is_err());
    }

    #[test]
    fn short_form_keeps_prefix_and_tail() {
        let addr = Address::parse(ALICE).unwrap();
        assert_eq!(addr.short(), "0x71c7...976f");
    }

    #[test]
    fn serde_uses_hex_string() {
        let addr = Address::parse(ALICE).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", ALICE.to_lowercase()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
