//! Native-token amounts in wei.
//!
//! Amounts are fixed-point integers (u128) to avoid floating-point errors.
//! Conversion to and from decimal ether strings is exact.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::MarketError;

/// Wei per ether (10^18).
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

const ETHER_DECIMALS: usize = 18;

/// An amount of the ledger's native token, in wei.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Wei(u128);

impl Wei {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Parse a decimal ether string such as `"0.001"` or `"2"`.
    pub fn from_ether_str(s: &str) -> Result<Self, MarketError> {
        let invalid = || MarketError::InvalidAmount(s.to_string());
        let trimmed = s.trim();
        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, f),
            None => (trimmed, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if frac.len() > ETHER_DECIMALS
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac_wei: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = ETHER_DECIMALS);
            padded.parse().map_err(|_| invalid())?
        };
        whole
            .checked_mul(WEI_PER_ETHER)
            .and_then(|w| w.checked_add(frac_wei))
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Format as ether with `decimals` fractional digits, rounding half up.
    pub fn to_ether_string(&self, decimals: usize) -> String {
        let decimals = decimals.min(ETHER_DECIMALS);
        let scale = 10u128.pow((ETHER_DECIMALS - decimals) as u32);
        let rounded = self.0 / scale + u128::from(self.0 % scale >= scale / 2 && scale > 1);
        if decimals == 0 {
            return rounded.to_string();
        }
        let unit = 10u128.pow(decimals as u32);
        format!(
            "{}.{:0width$}",
            rounded / unit,
            rounded % unit,
            width = decimals
        )
    }
}

impl fmt::Display for Wei {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ETH", self.to_ether_string(4))
    }
}

impl Serialize for Wei {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Wei {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // uint256 values arrive as decimal strings; small ones sometimes as numbers.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(u64),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(Self(u128::from(n))),
            Repr::Text(s) => s
                .trim()
                .parse::<u128>()
                .map(Self)
                .map_err(|_| serde::de::Error::custom(format!("invalid wei amount: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_creation_fee() {
        let fee = Wei::from_ether_str("0.001").unwrap();
        assert_eq!(fee.raw(), 1_000_000_000_000_000);
        assert_eq!(Wei::from_ether_str("2").unwrap().raw(), 2 * WEI_PER_ETHER);
        assert_eq!(Wei::from_ether_str(".5").unwrap().raw(), WEI_PER_ETHER / 2);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Wei::from_ether_str("").is_err());
        assert!(Wei::from_ether_str(".").is_err());
        assert!(Wei::from_ether_str("1.2.3").is_err());
        assert!(Wei::from_ether_str("-1").is_err());
        assert!(Wei::from_ether_str("0.0000000000000000001").is_err());
    }

    #[test]
    fn formats_with_rounding() {
        assert_eq!(Wei::new(1_000_000_000_000_000).to_ether_string(4), "0.0010");
        assert_eq!(Wei::new(123_456_789_000_000_000).to_ether_string(4), "0.1235");
        assert_eq!(Wei::ZERO.to_ether_string(4), "0.0000");
        assert_eq!(Wei::new(3 * WEI_PER_ETHER).to_ether_string(0), "3");
        assert_eq!(Wei::new(1).to_ether_string(18), "0.000000000000000001");
    }

    #[test]
    fn arithmetic_never_wraps() {
        let max = Wei::new(u128::MAX);
        assert_eq!(max.checked_add(Wei::new(1)), None);
        assert_eq!(max.saturating_add(Wei::new(1)), max);
        assert_eq!(Wei::new(1).saturating_sub(Wei::new(2)), Wei::ZERO);
        assert_eq!(Wei::new(1).checked_sub(Wei::new(2)), None);
        assert_eq!(Wei::new(2).saturating_add(Wei::new(3)).raw(), 5);
    }

    #[test]
    fn display_uses_four_decimals() {
        assert_eq!(Wei::new(WEI_PER_ETHER / 4).to_string(), "0.2500 ETH");
    }

    #[test]
    fn deserializes_string_or_number() {
        let a: Wei = serde_json::from_str("\"1000000000000000000000\"").unwrap();
        assert_eq!(a.raw(), 1000 * WEI_PER_ETHER);
        let b: Wei = serde_json::from_str("42").unwrap();
        assert_eq!(b.raw(), 42);
    }
}
