//! Backing and over-collateralization aggregation.

use alloy::primitives::U256;
use serde::Serialize;

use lens_common::fixed::{Fix, Rounding};

use crate::collaborators::AssetSnapshot;
use crate::oracle::Posture;
use crate::valuation::BasketLeg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BackingOverview {
    /// Fraction of the owed baskets the backing manager's holdings cover, at most 1.
    pub backing: Fix,
    /// Staked buffer relative to the owed baskets. Uncapped.
    pub over_collateralization: Fix,
}

impl BackingOverview {
    pub const NONE: BackingOverview = BackingOverview {
        backing: Fix::ZERO,
        over_collateralization: Fix::ZERO,
    };
}

/// Pessimistic value of the given balances. Unpriced assets count as 0.
pub fn held_value<'a>(holdings: impl IntoIterator<Item = (&'a AssetSnapshot, U256)>) -> Fix {
    holdings
        .into_iter()
        .map(|(asset, balance)| {
            asset
                .price
                .value_of(Fix::from_token_units(balance, asset.decimals), Posture::Pessimistic)
        })
        .fold(Fix::ZERO, Fix::saturating_add)
}

/// Pessimistic value of one basket unit.
pub fn reference_value(legs: &[BasketLeg]) -> Fix {
    legs.iter()
        .map(|leg| leg.price.value_of(leg.quantity_per_unit, Posture::Pessimistic))
        .fold(Fix::ZERO, Fix::saturating_add)
}

/// Pessimistic value of the staked buffer.
pub fn buffer_value(total_staked: U256, stake_token: &AssetSnapshot) -> Fix {
    stake_token.price.value_of(
        Fix::from_token_units(total_staked, stake_token.decimals),
        Posture::Pessimistic,
    )
}

pub fn backing_overview(
    total_supply: U256,
    baskets_needed: Fix,
    held: Fix,
    reference: Fix,
    buffer: Fix,
) -> BackingOverview {
    if total_supply.is_zero() || reference.is_zero() {
        return BackingOverview::NONE;
    }
    let owed = reference.mul(baskets_needed, Rounding::Ceil);

    BackingOverview {
        backing: held.div(owed, Rounding::Floor).unwrap_or(Fix::ZERO).min(Fix::ONE),
        over_collateralization: buffer.div(owed, Rounding::Floor).unwrap_or(Fix::ZERO),
    }
}
