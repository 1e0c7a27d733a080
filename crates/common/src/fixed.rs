//! 18-decimal fixed-point arithmetic over 256-bit integers.
//!
//! `Fix` mirrors the protocol's on-chain `uint192` fixed-point values: a raw
//! integer scaled by 1e18. `Fix::MAX` (2^192 - 1) is the saturation ceiling.
//! Anything that reaches it stays there, which is how the protocol spells
//! "unbounded" or "unknown".
//!
//! Token quantities are plain `U256` integers in the token's own decimals and
//! must be rescaled explicitly with [`Fix::from_token_units`] and
//! [`Fix::to_token_units`].

use std::fmt;
use std::str::FromStr;

use alloy::primitives::{U256, U512};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of decimals in the fixed-point scale.
pub const FIX_DECIMALS: u8 = 18;

const ONE_RAW: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);
const MAX_RAW: U256 = U256::from_limbs([u64::MAX, u64::MAX, u64::MAX, 0]);

/// Rounding applied to the last digit of a scaled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    Floor,
    Round,
    Ceil,
}

/// Numeric kernel failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("numeric overflow")]
    Overflow,

    #[error("invalid fixed-point literal: {0}")]
    Parse(String),
}

/// An 18-decimal fixed-point number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fix(U256);

impl Fix {
    pub const ZERO: Fix = Fix(U256::ZERO);
    pub const ONE: Fix = Fix(ONE_RAW);
    pub const MAX: Fix = Fix(MAX_RAW);

    /// Wrap a raw 1e18-scaled integer, saturating at `Fix::MAX`.
    pub fn from_raw(raw: U256) -> Fix {
        if raw >= MAX_RAW { Fix::MAX } else { Fix(raw) }
    }

    /// Whole number `n`, i.e. `n * 1e18` raw.
    pub fn from_int(n: u64) -> Fix {
        Fix::from_raw(U256::from(n) * ONE_RAW)
    }

    pub fn raw(self) -> U256 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// True when the value sits at the saturation ceiling.
    pub fn is_max(self) -> bool {
        self.0 >= MAX_RAW
    }

    /// `self * rhs`. Zero absorbs, MAX saturates, overflow saturates.
    pub fn mul(self, rhs: Fix, rounding: Rounding) -> Fix {
        if self.is_zero() || rhs.is_zero() {
            return Fix::ZERO;
        }
        if self.is_max() || rhs.is_max() {
            return Fix::MAX;
        }
        match mul_div(self.0, rhs.0, ONE_RAW, rounding) {
            Ok(raw) => Fix::from_raw(raw),
            Err(_) => Fix::MAX,
        }
    }

    /// `self / rhs`. A zero divisor is an error; a MAX dividend stays MAX.
    pub fn div(self, rhs: Fix, rounding: Rounding) -> Result<Fix, FixError> {
        if rhs.is_zero() {
            return Err(FixError::DivisionByZero);
        }
        if self.is_max() {
            return Ok(Fix::MAX);
        }
        match mul_div(self.0, ONE_RAW, rhs.0, rounding) {
            Ok(raw) => Ok(Fix::from_raw(raw)),
            Err(FixError::Overflow) => Ok(Fix::MAX),
            Err(e) => Err(e),
        }
    }

    /// `self * num / den` with a single rounding step.
    pub fn mul_div(self, num: Fix, den: Fix, rounding: Rounding) -> Result<Fix, FixError> {
        if den.is_zero() {
            return Err(FixError::DivisionByZero);
        }
        if self.is_max() || num.is_max() {
            return Ok(if self.is_zero() || num.is_zero() { Fix::ZERO } else { Fix::MAX });
        }
        match mul_div(self.0, num.0, den.0, rounding) {
            Ok(raw) => Ok(Fix::from_raw(raw)),
            Err(FixError::Overflow) => Ok(Fix::MAX),
            Err(e) => Err(e),
        }
    }

    pub fn saturating_add(self, rhs: Fix) -> Fix {
        Fix::from_raw(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: Fix) -> Fix {
        Fix(self.0.saturating_sub(rhs.0))
    }

    /// Convert a token amount with `decimals` decimals into whole tokens.
    pub fn from_token_units(amount: U256, decimals: u8) -> Fix {
        match mul_div(amount, ONE_RAW, pow10(decimals), Rounding::Floor) {
            Ok(raw) => Fix::from_raw(raw),
            Err(_) => Fix::MAX,
        }
    }

    /// Convert whole tokens into an integer amount with `decimals` decimals.
    pub fn to_token_units(self, decimals: u8, rounding: Rounding) -> Result<U256, FixError> {
        mul_div(self.0, pow10(decimals), ONE_RAW, rounding)
    }
}

/// `10^exp` as a 256-bit integer.
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// `a * b / c` through a 512-bit intermediate, rounded once.
pub fn mul_div(a: U256, b: U256, c: U256, rounding: Rounding) -> Result<U256, FixError> {
    if c.is_zero() {
        return Err(FixError::DivisionByZero);
    }
    let product: U512 = a.widening_mul(b);
    let divisor = widen(c);
    let quotient = product / divisor;
    let remainder = product % divisor;

    let round_up = match rounding {
        Rounding::Floor => false,
        Rounding::Ceil => !remainder.is_zero(),
        Rounding::Round => (remainder << 1usize) >= divisor,
    };
    let quotient = if round_up {
        quotient + U512::from(1u64)
    } else {
        quotient
    };
    narrow(quotient).ok_or(FixError::Overflow)
}

/// Exact comparison of `a * b` against `c * d` without rounding.
pub fn cmp_products(a: U256, b: U256, c: U256, d: U256) -> std::cmp::Ordering {
    let lhs: U512 = a.widening_mul(b);
    let rhs: U512 = c.widening_mul(d);
    lhs.cmp(&rhs)
}

fn widen(value: U256) -> U512 {
    let mut limbs = [0u64; 8];
    limbs[..4].copy_from_slice(value.as_limbs());
    U512::from_limbs(limbs)
}

fn narrow(value: U512) -> Option<U256> {
    let limbs = value.as_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return None;
    }
    Some(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ONE_RAW;
        let frac = self.0 % ONE_RAW;
        if frac.is_zero() {
            return write!(f, "{}", whole);
        }
        let digits = format!("{:0>18}", frac.to_string());
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl FromStr for Fix {
    type Err = FixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(FixError::Parse(s.to_string()));
        }
        if frac.len() > FIX_DECIMALS as usize {
            return Err(FixError::Parse(format!("{s}: more than 18 decimals")));
        }

        let parse = |digits: &str| -> Result<U256, FixError> {
            if digits.is_empty() {
                return Ok(U256::ZERO);
            }
            if !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FixError::Parse(s.to_string()));
            }
            U256::from_str_radix(digits, 10).map_err(|e| FixError::Parse(e.to_string()))
        };

        let whole = parse(whole)?;
        let frac = parse(&format!("{:0<18}", frac))?;
        let raw = whole
            .checked_mul(ONE_RAW)
            .and_then(|w| w.checked_add(frac))
            .ok_or(FixError::Overflow)?;
        Ok(Fix::from_raw(raw))
    }
}

impl Serialize for Fix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(s: &str) -> Fix {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(fix("1"), Fix::ONE);
        assert_eq!(fix("0.25").raw(), U256::from(250_000_000_000_000_000u64));
        assert_eq!(fix("12.5").to_string(), "12.5");
        assert_eq!(Fix::ZERO.to_string(), "0");
        assert_eq!(fix(".5"), fix("0.5"));
        assert!("1.0000000000000000001".parse::<Fix>().is_err());
        assert!("abc".parse::<Fix>().is_err());
    }

    #[test]
    fn test_mul_rounding() {
        // 1/3 * 1/3 with every rounding mode
        let third = Fix::ONE.div(Fix::from_int(3), Rounding::Floor).unwrap();
        let floor = third.mul(third, Rounding::Floor);
        let ceil = third.mul(third, Rounding::Ceil);
        assert_eq!(ceil.raw() - floor.raw(), U256::from(1u64));
        assert_eq!(fix("0.5").mul(fix("0.5"), Rounding::Floor), fix("0.25"));
    }

    #[test]
    fn test_div_rounding_modes() {
        let two_thirds_floor = Fix::from_int(2).div(Fix::from_int(3), Rounding::Floor).unwrap();
        let two_thirds_round = Fix::from_int(2).div(Fix::from_int(3), Rounding::Round).unwrap();
        let two_thirds_ceil = Fix::from_int(2).div(Fix::from_int(3), Rounding::Ceil).unwrap();
        assert_eq!(two_thirds_floor.to_string(), "0.666666666666666666");
        assert_eq!(two_thirds_round.to_string(), "0.666666666666666667");
        assert_eq!(two_thirds_ceil, two_thirds_round);
    }

    #[test]
    fn test_div_by_zero() {
        assert_eq!(
            Fix::ONE.div(Fix::ZERO, Rounding::Floor),
            Err(FixError::DivisionByZero)
        );
        assert_eq!(
            mul_div(U256::from(1u64), U256::from(1u64), U256::ZERO, Rounding::Floor),
            Err(FixError::DivisionByZero)
        );
    }

    #[test]
    fn test_max_saturates() {
        assert!(Fix::MAX.mul(fix("0.5"), Rounding::Floor).is_max());
        assert!(Fix::MAX.mul(Fix::ZERO, Rounding::Floor).is_zero());
        assert!(Fix::MAX.div(Fix::from_int(2), Rounding::Floor).unwrap().is_max());
        assert!(Fix::MAX.saturating_add(Fix::ONE).is_max());
        assert!(Fix::from_raw(U256::MAX).is_max());
    }

    #[test]
    fn test_token_unit_rescaling() {
        // 25 USDC with 6 decimals
        let amount = U256::from(25_000_000u64);
        let whole = Fix::from_token_units(amount, 6);
        assert_eq!(whole, Fix::from_int(25));
        assert_eq!(whole.to_token_units(6, Rounding::Floor).unwrap(), amount);

        // 1.5 units of a 0-decimal token round differently
        let half = fix("1.5");
        assert_eq!(half.to_token_units(0, Rounding::Floor).unwrap(), U256::from(1u64));
        assert_eq!(half.to_token_units(0, Rounding::Ceil).unwrap(), U256::from(2u64));
        assert_eq!(half.to_token_units(0, Rounding::Round).unwrap(), U256::from(2u64));
    }

    #[test]
    fn test_wide_intermediate() {
        // 4e28 tokens * 1e18 overflows u128 but not the 512-bit path
        let big = Fix::from_int(40_000_000_000).mul(Fix::from_int(1_000_000_000), Rounding::Floor);
        assert_eq!(big.to_string(), "40000000000000000000");
    }

    #[test]
    fn test_cmp_products() {
        use std::cmp::Ordering;
        let a = U256::from(3u64);
        let b = U256::from(4u64);
        assert_eq!(cmp_products(a, b, U256::from(2u64), U256::from(6u64)), Ordering::Equal);
        assert_eq!(cmp_products(a, b, U256::from(5u64), U256::from(3u64)), Ordering::Less);
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let json = serde_json::to_string(&fix("0.875")).unwrap();
        assert_eq!(json, "\"0.875\"");
        let back: Fix = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fix("0.875"));
    }
}
