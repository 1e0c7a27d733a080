//! Oracle price resolution.
//!
//! Collaborators report prices either as a mid price plus a protocol-wide
//! oracle error, or as `(low, high)` bounds where `high == Fix::MAX` means the
//! asset is unpriced. Both forms resolve to [`Price`], which keeps a real zero
//! price apart from an unknown one.

use serde::{Deserialize, Serialize};

use lens_common::fixed::{Fix, Rounding};

/// Which end of a price range a computation values at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Posture {
    /// Low bound. Used wherever overstating value would be unsafe.
    Pessimistic,
    /// Average of both bounds.
    Midpoint,
    /// High bound.
    Optimistic,
}

/// Three-state price in unit of account per whole token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Price {
    Known { low: Fix, high: Fix },
    Zero,
    Unknown,
}

impl Price {
    /// Bounds from a mid price and an oracle error fraction (e.g. 0.01).
    pub fn from_mid(mid: Fix, oracle_error: Fix) -> Price {
        if mid.is_max() {
            return Price::Unknown;
        }
        if mid.is_zero() {
            return Price::Zero;
        }
        let low = mid.mul(Fix::ONE.saturating_sub(oracle_error), Rounding::Floor);
        let high = mid.mul(Fix::ONE.saturating_add(oracle_error), Rounding::Ceil);
        Price::Known { low, high }
    }

    /// Classify bounds as reported by an asset.
    pub fn from_bounds(low: Fix, high: Fix) -> Price {
        if high.is_max() {
            Price::Unknown
        } else if high.is_zero() {
            Price::Zero
        } else {
            Price::Known {
                low: low.min(high),
                high,
            }
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Price::Unknown)
    }

    pub fn low(&self) -> Option<Fix> {
        self.at(Posture::Pessimistic)
    }

    pub fn high(&self) -> Option<Fix> {
        self.at(Posture::Optimistic)
    }

    /// Price at a posture. `None` when unknown, `Some(0)` for a real zero.
    pub fn at(&self, posture: Posture) -> Option<Fix> {
        match *self {
            Price::Unknown => None,
            Price::Zero => Some(Fix::ZERO),
            Price::Known { low, high } => Some(match posture {
                Posture::Pessimistic => low,
                Posture::Optimistic => high,
                Posture::Midpoint => {
                    let sum = low.saturating_add(high);
                    sum.div(Fix::from_int(2), Rounding::Floor).unwrap_or(sum)
                }
            }),
        }
    }

    /// Value of `amount` whole tokens at a posture; unknown prices value at 0.
    pub fn value_of(&self, amount: Fix, posture: Posture) -> Fix {
        self.at(posture)
            .map(|price| amount.mul(price, Rounding::Floor))
            .unwrap_or(Fix::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(s: &str) -> Fix {
        s.parse().unwrap()
    }

    #[test]
    fn test_from_mid_applies_oracle_error() {
        let price = Price::from_mid(Fix::ONE, fix("0.01"));
        assert_eq!(
            price,
            Price::Known {
                low: fix("0.99"),
                high: fix("1.01")
            }
        );
        assert_eq!(price.at(Posture::Midpoint), Some(Fix::ONE));
    }

    #[test]
    fn test_from_mid_unknown_is_not_bounded() {
        assert_eq!(Price::from_mid(Fix::MAX, fix("0.01")), Price::Unknown);
        assert_eq!(Price::Unknown.low(), None);
        assert_eq!(Price::Unknown.high(), None);
    }

    #[test]
    fn test_zero_is_distinct_from_unknown() {
        let zero = Price::from_mid(Fix::ZERO, fix("0.01"));
        assert_eq!(zero, Price::Zero);
        assert_eq!(zero.low(), Some(Fix::ZERO));
        assert_ne!(zero, Price::Unknown);
    }

    #[test]
    fn test_from_bounds() {
        assert_eq!(Price::from_bounds(Fix::ZERO, Fix::MAX), Price::Unknown);
        assert_eq!(Price::from_bounds(Fix::ZERO, Fix::ZERO), Price::Zero);
        assert_eq!(
            Price::from_bounds(fix("0.5"), fix("0.6")).low(),
            Some(fix("0.5"))
        );
    }

    #[test]
    fn test_value_of() {
        let price = Price::from_bounds(fix("0.99"), fix("1.01"));
        assert_eq!(price.value_of(Fix::from_int(100), Posture::Pessimistic), Fix::from_int(99));
        assert_eq!(Price::Unknown.value_of(Fix::from_int(100), Posture::Optimistic), Fix::ZERO);
    }
}
