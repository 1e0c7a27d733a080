//! Auction readiness: which revenue auctions could start, which
//! recollateralization trade would fire, which open trades can settle.

use alloy::primitives::{Address, U256};
use serde::Serialize;

use lens_common::fixed::{Fix, Rounding, mul_div, pow10};

use crate::collaborators::{AssetSnapshot, OpenTrade};
use crate::oracle::Posture;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueEntry {
    pub erc20: Address,
    pub can_start: bool,
    pub surplus: U256,
    /// Token amount worth the trader's minimum trade volume at the low price.
    /// `None` when the asset has no usable low price.
    pub min_trade_amount: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueOverview {
    pub trader: Address,
    pub entries: Vec<RevenueEntry>,
}

impl RevenueOverview {
    pub fn entry(&self, erc20: Address) -> Option<&RevenueEntry> {
        self.entries.iter().find(|entry| entry.erc20 == erc20)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecollateralizationAuction {
    pub can_start: bool,
    pub sell: Option<Address>,
    pub buy: Option<Address>,
    pub sell_amount: U256,
}

/// What the backing manager holds of an asset against what the basket needs.
#[derive(Debug, Clone, Copy)]
pub struct Holding<'a> {
    pub asset: &'a AssetSnapshot,
    pub held: U256,
    pub needed: U256,
}

/// Readiness of one asset held by a revenue trader.
///
/// `blocked` covers conditions outside the asset, such as paused trading.
pub fn revenue_entry(
    asset: &AssetSnapshot,
    balance: U256,
    token_to_buy: Option<Address>,
    min_trade_volume: Fix,
    blocked: bool,
    trade_open: bool,
) -> RevenueEntry {
    let target = if token_to_buy == Some(asset.erc20) {
        balance
    } else {
        U256::ZERO
    };
    let surplus = balance.saturating_sub(target);

    let low = asset.price.low();
    let min_trade_amount = low
        .filter(|low| !low.is_zero())
        .and_then(|low| {
            mul_div(
                min_trade_volume.raw(),
                pow10(asset.decimals),
                low.raw(),
                Rounding::Floor,
            )
            .ok()
        });

    let worth_trading = low.is_some_and(|low| {
        Fix::from_token_units(surplus, asset.decimals).mul(low, Rounding::Floor) >= min_trade_volume
    });

    RevenueEntry {
        erc20: asset.erc20,
        can_start: !surplus.is_zero() && worth_trading && !blocked && !trade_open,
        surplus,
        min_trade_amount,
    }
}

/// The trade the backing manager would open next.
///
/// The largest surplus (at low price) is sold for the largest deficit (at high
/// price). Ties keep the earlier holding.
pub fn next_recollateralization(
    holdings: &[Holding<'_>],
    min_trade_volume: Fix,
    blocked: bool,
) -> RecollateralizationAuction {
    let mut sell: Option<(&Holding<'_>, Fix)> = None;
    let mut buy: Option<(&Holding<'_>, Fix)> = None;

    for holding in holdings {
        let decimals = holding.asset.decimals;
        if holding.held > holding.needed {
            let Some(low) = holding.asset.price.low().filter(|low| !low.is_zero()) else {
                continue;
            };
            let surplus = Fix::from_token_units(holding.held - holding.needed, decimals);
            let value = surplus.mul(low, Rounding::Floor);
            if sell.is_none_or(|(_, best)| value > best) {
                sell = Some((holding, value));
            }
        } else if holding.needed > holding.held {
            let deficit = Fix::from_token_units(holding.needed - holding.held, decimals);
            let value = holding.asset.price.value_of(deficit, Posture::Optimistic);
            if value.is_zero() {
                continue;
            }
            if buy.is_none_or(|(_, best)| value > best) {
                buy = Some((holding, value));
            }
        }
    }

    let sell_amount = match (sell, buy) {
        (Some((sell, _)), Some((_, deficit_value))) => {
            let surplus = sell.held - sell.needed;
            let covering = sell
                .asset
                .price
                .low()
                .and_then(|low| deficit_value.div(low, Rounding::Ceil).ok())
                .and_then(|tokens| tokens.to_token_units(sell.asset.decimals, Rounding::Ceil).ok())
                .unwrap_or(surplus);
            surplus.min(covering)
        }
        _ => U256::ZERO,
    };

    let can_start = match (sell, buy) {
        (Some((sell, _)), Some(_)) => {
            let sell_value = sell.asset.price.value_of(
                Fix::from_token_units(sell_amount, sell.asset.decimals),
                Posture::Pessimistic,
            );
            !blocked && !sell_amount.is_zero() && sell_value >= min_trade_volume
        }
        _ => false,
    };

    RecollateralizationAuction {
        can_start,
        sell: sell.map(|(holding, _)| holding.asset.erc20),
        buy: buy.map(|(holding, _)| holding.asset.erc20),
        sell_amount,
    }
}

/// Sell tokens of trades whose auction has ended at `now`.
pub fn settleable(trades: &[OpenTrade], now: u64) -> Vec<Address> {
    trades
        .iter()
        .filter(|trade| now >= trade.end_time)
        .map(|trade| trade.sell)
        .collect()
}

#[cfg(test)]
mod tests {
    use lens_common::types::CollateralStatus;

    use super::*;
    use crate::oracle::Price;

    fn fix(s: &str) -> Fix {
        s.parse().unwrap()
    }

    fn e18(n: u64) -> U256 {
        U256::from(n) * pow10(18)
    }

    fn asset(byte: u8, decimals: u8, price: Price) -> AssetSnapshot {
        AssetSnapshot {
            erc20: Address::repeat_byte(byte),
            decimals,
            price,
            is_collateral: true,
            status: CollateralStatus::Sound,
            target_name: Some("USD".to_string()),
        }
    }

    fn usd() -> Price {
        Price::from_mid(Fix::ONE, fix("0.01"))
    }

    #[test]
    fn test_revenue_entry_keeps_token_to_buy() {
        let token = asset(1, 18, usd());
        let entry = revenue_entry(&token, e18(100), Some(token.erc20), Fix::ONE, false, false);
        assert_eq!(entry.surplus, U256::ZERO);
        assert!(!entry.can_start);
    }

    #[test]
    fn test_revenue_entry_min_trade_amount() {
        let usdc = asset(2, 6, Price::from_bounds(fix("0.5"), fix("0.6")));
        let entry = revenue_entry(&usdc, U256::from(10_000_000u64), None, Fix::from_int(2), false, false);
        assert_eq!(entry.min_trade_amount, Some(U256::from(4_000_000u64)));
        assert!(entry.can_start);
    }

    #[test]
    fn test_revenue_entry_unknown_price() {
        let token = asset(1, 18, Price::Unknown);
        let entry = revenue_entry(&token, e18(100), None, Fix::ONE, false, false);
        assert_eq!(entry.min_trade_amount, None);
        assert_eq!(entry.surplus, e18(100));
        assert!(!entry.can_start);
    }

    #[test]
    fn test_revenue_entry_below_min_trade_volume() {
        let token = asset(1, 18, usd());
        let entry = revenue_entry(&token, e18(1), None, Fix::from_int(5), false, false);
        assert!(!entry.can_start);
    }

    #[test]
    fn test_revenue_entry_blocked_or_open() {
        let token = asset(1, 18, usd());
        assert!(!revenue_entry(&token, e18(100), None, Fix::ONE, true, false).can_start);
        assert!(!revenue_entry(&token, e18(100), None, Fix::ONE, false, true).can_start);
    }

    #[test]
    fn test_recollateralization_picks_largest_surplus_first_on_ties() {
        let a = asset(1, 18, usd());
        let b = asset(2, 18, usd());
        let c = asset(3, 6, usd());
        let holdings = [
            Holding { asset: &a, held: e18(25), needed: U256::ZERO },
            Holding { asset: &b, held: e18(25), needed: U256::ZERO },
            Holding {
                asset: &c,
                held: U256::from(25_000_000u64),
                needed: U256::from(100_000_000u64),
            },
        ];
        let auction = next_recollateralization(&holdings, Fix::ONE, false);
        assert_eq!(auction.sell, Some(a.erc20));
        assert_eq!(auction.buy, Some(c.erc20));
        assert_eq!(auction.sell_amount, e18(25));
        assert!(auction.can_start);
    }

    #[test]
    fn test_recollateralization_sells_only_what_covers_deficit() {
        let a = asset(1, 18, Price::from_bounds(Fix::ONE, Fix::ONE));
        let b = asset(2, 18, Price::from_bounds(Fix::ONE, Fix::ONE));
        let holdings = [
            Holding { asset: &a, held: e18(100), needed: U256::ZERO },
            Holding { asset: &b, held: U256::ZERO, needed: e18(10) },
        ];
        let auction = next_recollateralization(&holdings, Fix::ONE, false);
        assert_eq!(auction.sell_amount, e18(10));
    }

    #[test]
    fn test_recollateralization_without_deficit() {
        let a = asset(1, 18, usd());
        let holdings = [Holding { asset: &a, held: e18(10), needed: e18(10) }];
        let auction = next_recollateralization(&holdings, Fix::ONE, false);
        assert!(!auction.can_start);
        assert_eq!(auction.sell, None);
        assert_eq!(auction.buy, None);
    }

    #[test]
    fn test_recollateralization_blocked() {
        let a = asset(1, 18, usd());
        let b = asset(2, 18, usd());
        let holdings = [
            Holding { asset: &a, held: e18(10), needed: U256::ZERO },
            Holding { asset: &b, held: U256::ZERO, needed: e18(10) },
        ];
        assert!(!next_recollateralization(&holdings, Fix::ONE, true).can_start);
    }

    #[test]
    fn test_recollateralization_skips_unpriced_deficit() {
        let a = asset(1, 18, usd());
        let b = asset(2, 18, Price::Unknown);
        let c = asset(3, 18, usd());
        let holdings = [
            Holding { asset: &a, held: e18(10), needed: U256::ZERO },
            Holding { asset: &b, held: U256::ZERO, needed: e18(50) },
            Holding { asset: &c, held: U256::ZERO, needed: e18(5) },
        ];
        let auction = next_recollateralization(&holdings, Fix::ONE, false);
        assert_eq!(auction.buy, Some(c.erc20));
        assert_eq!(auction.sell, Some(a.erc20));
    }

    #[test]
    fn test_recollateralization_skips_zero_priced_surplus() {
        let a = asset(1, 18, Price::Zero);
        let b = asset(2, 18, usd());
        let c = asset(3, 18, usd());
        let holdings = [
            Holding { asset: &a, held: e18(100), needed: U256::ZERO },
            Holding { asset: &b, held: e18(10), needed: U256::ZERO },
            Holding { asset: &c, held: U256::ZERO, needed: e18(5) },
        ];
        let auction = next_recollateralization(&holdings, Fix::ONE, false);
        assert_eq!(auction.sell, Some(b.erc20));
        assert_eq!(auction.buy, Some(c.erc20));

        let only_zero = [holdings[0], holdings[2]];
        let auction = next_recollateralization(&only_zero, Fix::ONE, false);
        assert_eq!(auction.sell, None);
        assert!(!auction.can_start);
    }

    #[test]
    fn test_settleable_includes_ended_trades() {
        let trades = [
            OpenTrade { sell: Address::repeat_byte(1), buy: Address::repeat_byte(9), end_time: 100 },
            OpenTrade { sell: Address::repeat_byte(2), buy: Address::repeat_byte(9), end_time: 200 },
        ];
        assert_eq!(settleable(&trades, 100), vec![Address::repeat_byte(1)]);
        assert!(settleable(&trades, 99).is_empty());
    }
}
