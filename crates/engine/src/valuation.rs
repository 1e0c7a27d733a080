//! Basket valuation.
//!
//! Pure functions over basket legs. RToken amounts carry 18 decimals, so a raw
//! RToken amount is also a raw `Fix` and converts without rescaling.

use std::cmp::Ordering;

use alloy::primitives::{Address, U256};
use serde::Serialize;

use lens_common::fixed::{Fix, FixError, Rounding, cmp_products, mul_div, pow10};

use crate::collaborators::{AssetSnapshot, BasketEntry};
use crate::oracle::{Posture, Price};

/// A basket entry joined with its asset snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct BasketLeg {
    pub erc20: Address,
    pub decimals: u8,
    pub quantity_per_unit: Fix,
    pub price: Price,
    pub target_name: Option<String>,
}

impl BasketLeg {
    pub fn new(entry: &BasketEntry, asset: &AssetSnapshot) -> Self {
        Self {
            erc20: entry.erc20,
            decimals: asset.decimals,
            quantity_per_unit: entry.quantity_per_unit,
            price: asset.price,
            target_name: asset.target_name.clone(),
        }
    }

    /// Token units of this leg in `units` basket units.
    pub fn quantity_for(&self, units: Fix, rounding: Rounding) -> Result<U256, FixError> {
        self.quantity_per_unit
            .mul(units, rounding)
            .to_token_units(self.decimals, rounding)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueLeg {
    pub erc20: Address,
    pub quantity: U256,
    /// Unit-of-account value at the midpoint price; 0 when unpriced.
    pub value: Fix,
}

/// Collateral a caller must deposit to issue an amount of RToken.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueQuote {
    pub legs: Vec<IssueLeg>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedeemLeg {
    pub erc20: Address,
    pub quantity: U256,
}

/// Collateral a redeemer receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RedeemQuote {
    pub nonce: u64,
    pub legs: Vec<RedeemLeg>,
    /// At least one leg was capped at the backing manager's balance.
    pub is_prorata: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakdownEntry {
    pub erc20: Address,
    pub fraction: Fix,
    pub target_name: Option<String>,
}

/// Share of basket value held in each collateral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasketBreakdown {
    pub entries: Vec<BreakdownEntry>,
}

/// Basket units corresponding to `amount` RToken.
///
/// With no supply outstanding, one RToken is one basket unit.
pub fn basket_units(
    amount: U256,
    total_supply: U256,
    baskets_needed: Fix,
    rounding: Rounding,
) -> Result<Fix, FixError> {
    if total_supply.is_zero() {
        return Ok(Fix::from_raw(amount));
    }
    baskets_needed.mul_div(Fix::from_raw(amount), Fix::from_raw(total_supply), rounding)
}

/// RToken amount that `baskets` basket units back. Zero when the supply is
/// owed no baskets at all.
pub fn rtokens_for_baskets(baskets: Fix, total_supply: U256, baskets_needed: Fix) -> U256 {
    if total_supply.is_zero() {
        return baskets.raw();
    }
    mul_div(baskets.raw(), total_supply, baskets_needed.raw(), Rounding::Floor).unwrap_or(U256::ZERO)
}

pub fn compute_quantities(
    legs: &[BasketLeg],
    units: Fix,
    rounding: Rounding,
) -> Result<Vec<U256>, FixError> {
    legs.iter()
        .map(|leg| leg.quantity_for(units, rounding))
        .collect()
}

/// Unit-of-account value of each quantity. Unpriced legs value at 0.
pub fn compute_unit_values(legs: &[BasketLeg], quantities: &[U256], posture: Posture) -> Vec<Fix> {
    legs.iter()
        .zip(quantities)
        .map(|(leg, quantity)| {
            let whole = Fix::from_token_units(*quantity, leg.decimals);
            leg.price.value_of(whole, posture)
        })
        .collect()
}

/// Linear redemption quantities capped at `held`.
///
/// The cap check compares the exact linear share against the holding before
/// any rounding; the reported quantity is the floored share or the holding,
/// whichever is smaller.
pub fn prorata_quantities(
    legs: &[BasketLeg],
    units: Fix,
    held: &[U256],
) -> Result<(Vec<U256>, bool), FixError> {
    let fix_one_squared = pow10(36);
    let mut quantities = Vec::with_capacity(legs.len());
    let mut is_prorata = false;

    for (leg, held) in legs.iter().zip(held) {
        let linear = leg.quantity_for(units, Rounding::Floor)?;
        let short = match units.raw().checked_mul(pow10(leg.decimals)) {
            Some(scaled_units) => {
                cmp_products(*held, fix_one_squared, leg.quantity_per_unit.raw(), scaled_units)
                    == Ordering::Less
            }
            None => *held < linear,
        };
        is_prorata |= short;
        quantities.push(linear.min(*held));
    }

    Ok((quantities, is_prorata))
}

/// Each leg's share of total optimistic value.
///
/// Unpriced legs report 0 and are left out of the total, so the priced legs
/// still sum to one.
pub fn breakdown_fractions(legs: &[BasketLeg], quantities: &[U256]) -> Vec<Fix> {
    let values: Vec<Option<Fix>> = legs
        .iter()
        .zip(quantities)
        .map(|(leg, quantity)| {
            let whole = Fix::from_token_units(*quantity, leg.decimals);
            leg.price
                .high()
                .map(|high| whole.mul(high, Rounding::Floor))
        })
        .collect();

    let total = values
        .iter()
        .flatten()
        .fold(Fix::ZERO, |acc, value| acc.saturating_add(*value));

    values
        .into_iter()
        .map(|value| match value {
            Some(value) => value.div(total, Rounding::Floor).unwrap_or(Fix::ZERO),
            None => Fix::ZERO,
        })
        .collect()
}

/// Price of one RToken.
pub fn rtoken_price(legs: &[BasketLeg], total_supply: U256, baskets_needed: Fix) -> Price {
    let mut low = Fix::ZERO;
    let mut high = Fix::ZERO;
    for leg in legs {
        if let Some(leg_low) = leg.price.low() {
            low = low.saturating_add(leg.quantity_per_unit.mul(leg_low, Rounding::Floor));
        }
        high = match leg.price.high() {
            Some(leg_high) => high.saturating_add(leg.quantity_per_unit.mul(leg_high, Rounding::Ceil)),
            None => Fix::MAX,
        };
    }

    if total_supply.is_zero() {
        return Price::from_bounds(low, high);
    }
    let supply = Fix::from_raw(total_supply);
    let scale = |per_unit: Fix, rounding| {
        per_unit
            .mul_div(baskets_needed, supply, rounding)
            .unwrap_or(Fix::ZERO)
    };
    let high = if high.is_max() { Fix::MAX } else { scale(high, Rounding::Ceil) };
    Price::from_bounds(scale(low, Rounding::Floor), high)
}

/// Whole basket units the given balances could form.
pub fn baskets_held(legs: &[BasketLeg], balances: &[U256]) -> Fix {
    legs.iter()
        .zip(balances)
        .filter(|(leg, _)| !leg.quantity_per_unit.is_zero())
        .map(|(leg, balance)| {
            Fix::from_token_units(*balance, leg.decimals)
                .div(leg.quantity_per_unit, Rounding::Floor)
                .unwrap_or(Fix::ZERO)
        })
        .min()
        .unwrap_or(Fix::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(s: &str) -> Fix {
        s.parse().unwrap()
    }

    fn leg(byte: u8, decimals: u8, quantity: &str, price: Price) -> BasketLeg {
        BasketLeg {
            erc20: Address::repeat_byte(byte),
            decimals,
            quantity_per_unit: fix(quantity),
            price,
            target_name: Some("USD".to_string()),
        }
    }

    fn usd() -> Price {
        Price::from_mid(Fix::ONE, fix("0.01"))
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * pow10(18)
    }

    #[test]
    fn test_basket_units_zero_supply_is_one_to_one() {
        let units = basket_units(e18(5), U256::ZERO, Fix::ZERO, Rounding::Ceil).unwrap();
        assert_eq!(units, Fix::from_int(5));
    }

    #[test]
    fn test_basket_units_scale_with_baskets_needed() {
        // 100 supply owed 50 baskets: 10 RToken is 5 baskets
        let units = basket_units(e18(10), e18(100), Fix::from_int(50), Rounding::Floor).unwrap();
        assert_eq!(units, Fix::from_int(5));
    }

    #[test]
    fn test_quantities_respect_decimals() {
        let legs = vec![leg(1, 18, "0.25", usd()), leg(2, 6, "0.25", usd())];
        let q = compute_quantities(&legs, Fix::from_int(100), Rounding::Ceil).unwrap();
        assert_eq!(q[0], e18(25));
        assert_eq!(q[1], U256::from(25_000_000u64));
    }

    #[test]
    fn test_unit_values_skip_unpriced() {
        let legs = vec![leg(1, 18, "1", usd()), leg(2, 18, "1", Price::Unknown)];
        let values = compute_unit_values(&legs, &[e18(10), e18(10)], Posture::Midpoint);
        assert_eq!(values, vec![Fix::from_int(10), Fix::ZERO]);
    }

    #[test]
    fn test_prorata_caps_short_leg() {
        let legs = vec![leg(1, 18, "0.5", usd()), leg(2, 18, "0.5", usd())];
        let held = [e18(25), e18(50)];
        let (q, is_prorata) = prorata_quantities(&legs, Fix::from_int(100), &held).unwrap();
        assert_eq!(q, vec![e18(25), e18(50)]);
        assert!(is_prorata);
    }

    #[test]
    fn test_prorata_detects_sub_unit_shortfall() {
        // Linear share is 0.5 raw units: floors to 0, but holding 0 is still short.
        let legs = vec![leg(1, 0, "0.5", usd())];
        let (q, is_prorata) = prorata_quantities(&legs, Fix::ONE, &[U256::ZERO]).unwrap();
        assert_eq!(q, vec![U256::ZERO]);
        assert!(is_prorata);
    }

    #[test]
    fn test_breakdown_sums_to_one() {
        let legs = vec![
            leg(1, 18, "0.25", usd()),
            leg(2, 6, "0.25", usd()),
            leg(3, 18, "0.5", usd()),
        ];
        let q = compute_quantities(&legs, Fix::ONE, Rounding::Floor).unwrap();
        let fractions = breakdown_fractions(&legs, &q);
        assert_eq!(fractions, vec![fix("0.25"), fix("0.25"), fix("0.5")]);
    }

    #[test]
    fn test_breakdown_all_unpriced_is_zero() {
        let legs = vec![leg(1, 18, "1", Price::Unknown)];
        assert_eq!(breakdown_fractions(&legs, &[e18(1)]), vec![Fix::ZERO]);
    }

    #[test]
    fn test_rtoken_price_bounds() {
        let legs = vec![leg(1, 18, "0.5", usd()), leg(2, 18, "0.5", usd())];
        let price = rtoken_price(&legs, e18(100), Fix::from_int(100));
        assert_eq!(price, Price::from_bounds(fix("0.99"), fix("1.01")));

        let unpriced = vec![leg(1, 18, "0.5", usd()), leg(2, 18, "0.5", Price::Unknown)];
        assert!(rtoken_price(&unpriced, e18(100), Fix::from_int(100)).is_unknown());
    }

    #[test]
    fn test_baskets_held_is_limited_by_scarcest_leg() {
        let legs = vec![leg(1, 18, "0.25", usd()), leg(2, 6, "0.5", usd())];
        let balances = [e18(100), U256::from(10_000_000u64)];
        assert_eq!(baskets_held(&legs, &balances), Fix::from_int(20));
    }

    #[test]
    fn test_rtokens_for_baskets() {
        assert_eq!(rtokens_for_baskets(Fix::from_int(4), U256::ZERO, Fix::ZERO), e18(4));
        assert_eq!(
            rtokens_for_baskets(Fix::from_int(4), e18(100), Fix::from_int(50)),
            e18(8)
        );
        assert_eq!(rtokens_for_baskets(Fix::from_int(4), e18(100), Fix::ZERO), U256::ZERO);
    }
}
