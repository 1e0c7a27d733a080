//! Read facade.
//!
//! Each operation fetches what it needs from one pinned [`Protocol`] snapshot
//! and hands the data to the pure valuation, aggregation and readiness
//! functions.

use alloy::primitives::{Address, U256};
use serde::Serialize;

use lens_common::error::LensError;
use lens_common::fixed::{Fix, Rounding};
use lens_common::types::CollateralStatus;

use crate::collaborators::{
    AssetSnapshot, BackupConfig, PrimeBasketEntry, Protocol, Trader,
};
use crate::collateralization::{self, BackingOverview};
use crate::oracle::{Posture, Price};
use crate::readiness::{self, Holding, RecollateralizationAuction, RevenueOverview};
use crate::staking::{self, PendingUnstaking};
use crate::valuation::{
    self, BasketBreakdown, BasketLeg, BreakdownEntry, IssueLeg, IssueQuote, RedeemLeg,
    RedeemQuote,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraderBalance {
    pub erc20: Address,
    /// Held by the backing manager and both revenue traders together.
    pub balance: U256,
    /// What the backing manager needs to back the outstanding supply.
    pub balance_needed: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraderBalances {
    pub entries: Vec<TraderBalance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimeBasket {
    pub entries: Vec<PrimeBasketEntry>,
}

/// Consolidated reads over one RToken protocol instance.
pub struct FacadeRead;

impl FacadeRead {
    /// RToken `holder` could issue with its current balances.
    pub async fn max_issuable(protocol: &dyn Protocol, holder: Address) -> Result<U256, LensError> {
        let handler = protocol.basket_handler();
        let rtoken = protocol.rtoken();
        let (status, supply, needed) = tokio::try_join!(
            handler.status(),
            rtoken.total_supply(),
            rtoken.baskets_needed()
        )?;

        if status == CollateralStatus::Disabled || (!supply.is_zero() && needed.is_zero()) {
            return Ok(U256::ZERO);
        }
        let legs = basket_legs(protocol).await?;
        if legs.is_empty() {
            return Ok(U256::ZERO);
        }

        let balances = balances_of(protocol, &legs, holder).await?;
        let baskets = valuation::baskets_held(&legs, &balances);
        let issuable = valuation::rtokens_for_baskets(baskets, supply, needed);

        tracing::debug!(%holder, %baskets, %issuable, "computed max issuable");
        Ok(issuable)
    }

    /// Collateral required to issue `amount` RToken, rounded up.
    pub async fn issue(protocol: &dyn Protocol, amount: U256) -> Result<IssueQuote, LensError> {
        let rtoken = protocol.rtoken();
        let (supply, needed) = tokio::try_join!(rtoken.total_supply(), rtoken.baskets_needed())?;

        let legs = basket_legs(protocol).await?;
        let units = valuation::basket_units(amount, supply, needed, Rounding::Ceil)?;
        let quantities = valuation::compute_quantities(&legs, units, Rounding::Ceil)?;
        let values = valuation::compute_unit_values(&legs, &quantities, Posture::Midpoint);

        let legs = legs
            .iter()
            .zip(quantities)
            .zip(values)
            .map(|((leg, quantity), value)| IssueLeg {
                erc20: leg.erc20,
                quantity,
                value,
            })
            .collect();

        tracing::debug!(%amount, %units, "quoted issuance");
        Ok(IssueQuote { legs })
    }

    /// Collateral paid out for redeeming `amount` RToken against basket `nonce`.
    pub async fn redeem(
        protocol: &dyn Protocol,
        amount: U256,
        nonce: u64,
    ) -> Result<RedeemQuote, LensError> {
        let rtoken = protocol.rtoken();
        let (current, supply, needed) = tokio::try_join!(
            protocol.basket_handler().nonce(),
            rtoken.total_supply(),
            rtoken.baskets_needed()
        )?;

        if nonce != current {
            return Err(LensError::StaleBasketNonce {
                quoted: nonce,
                current,
            });
        }
        if amount > supply {
            return Err(LensError::Validation(format!(
                "redeem amount {amount} exceeds total supply {supply}"
            )));
        }

        let legs = basket_legs(protocol).await?;
        let held = balances_of(protocol, &legs, protocol.backing_manager().address()).await?;
        let units = valuation::basket_units(amount, supply, needed, Rounding::Floor)?;
        let (quantities, is_prorata) = valuation::prorata_quantities(&legs, units, &held)?;

        let legs = legs
            .iter()
            .zip(quantities)
            .map(|(leg, quantity)| RedeemLeg {
                erc20: leg.erc20,
                quantity,
            })
            .collect();

        tracing::debug!(%amount, nonce, is_prorata, "quoted redemption");
        Ok(RedeemQuote {
            nonce,
            legs,
            is_prorata,
        })
    }

    pub async fn backing_overview(protocol: &dyn Protocol) -> Result<BackingOverview, LensError> {
        let rtoken = protocol.rtoken();
        let staking = protocol.staking_reserve();
        let (supply, needed, total_staked) = tokio::try_join!(
            rtoken.total_supply(),
            rtoken.baskets_needed(),
            staking.total_staked()
        )?;
        if supply.is_zero() {
            return Ok(BackingOverview::NONE);
        }

        let legs = basket_legs(protocol).await?;
        let backing_manager = protocol.backing_manager().address();
        let mut holdings = Vec::new();
        for asset in registered_assets(protocol).await? {
            if !asset.is_collateral {
                continue;
            }
            let balance = protocol.ledger().balance_of(asset.erc20, backing_manager).await?;
            holdings.push((asset, balance));
        }
        let stake_token = protocol
            .asset_registry()
            .asset(staking.stake_token())
            .await?;

        let held = collateralization::held_value(holdings.iter().map(|(asset, b)| (asset, *b)));
        let reference = collateralization::reference_value(&legs);
        let buffer = collateralization::buffer_value(total_staked, &stake_token);
        let overview =
            collateralization::backing_overview(supply, needed, held, reference, buffer);

        tracing::debug!(
            %held,
            %reference,
            %buffer,
            backing = %overview.backing,
            over_collateralization = %overview.over_collateralization,
            "computed backing overview"
        );
        Ok(overview)
    }

    pub async fn balances_across_all_traders(
        protocol: &dyn Protocol,
    ) -> Result<TraderBalances, LensError> {
        let needed = protocol.rtoken().baskets_needed().await?;
        let traders = traders(protocol);

        let mut entries = Vec::new();
        for asset in registered_assets(protocol).await? {
            let balance = combined_balance(protocol, &traders, asset.erc20).await?;
            let per_unit = protocol.basket_handler().quantity(asset.erc20).await?;
            let balance_needed = per_unit
                .mul(needed, Rounding::Ceil)
                .to_token_units(asset.decimals, Rounding::Ceil)?;
            entries.push(TraderBalance {
                erc20: asset.erc20,
                balance,
                balance_needed,
            });
        }
        Ok(TraderBalances { entries })
    }

    pub async fn revenue_overview(
        protocol: &dyn Protocol,
        trader: Address,
    ) -> Result<RevenueOverview, LensError> {
        revenue_overview_settling(protocol, trader, &[]).await
    }

    /// The recollateralization trade the backing manager would open now.
    pub async fn next_recollateralization_auction(
        protocol: &dyn Protocol,
        backing_manager: Address,
    ) -> Result<RecollateralizationAuction, LensError> {
        let manager = protocol.backing_manager();
        if manager.address() != backing_manager {
            return Err(LensError::NotFound(format!(
                "{backing_manager} is not the backing manager"
            )));
        }
        let (paused, status, open, min_trade_volume, needed) = tokio::try_join!(
            protocol.trading_paused(),
            protocol.basket_handler().status(),
            manager.open_trades(),
            manager.min_trade_volume(),
            protocol.rtoken().baskets_needed()
        )?;

        let assets = registered_assets(protocol).await?;
        let mut amounts = Vec::with_capacity(assets.len());
        for asset in &assets {
            let held = protocol.ledger().balance_of(asset.erc20, backing_manager).await?;
            let per_unit = protocol.basket_handler().quantity(asset.erc20).await?;
            let required = per_unit
                .mul(needed, Rounding::Ceil)
                .to_token_units(asset.decimals, Rounding::Ceil)?;
            amounts.push((held, required));
        }
        let holdings: Vec<Holding<'_>> = assets
            .iter()
            .zip(&amounts)
            .map(|(asset, (held, needed))| Holding {
                asset,
                held: *held,
                needed: *needed,
            })
            .collect();

        let blocked = paused || status != CollateralStatus::Sound || !open.is_empty();
        let auction = readiness::next_recollateralization(&holdings, min_trade_volume, blocked);

        tracing::debug!(
            can_start = auction.can_start,
            sell = ?auction.sell,
            buy = ?auction.buy,
            sell_amount = %auction.sell_amount,
            paused,
            %status,
            open_trades = open.len(),
            "previewed recollateralization"
        );
        Ok(auction)
    }

    /// Sell tokens of the trader's auctions that can be settled now.
    pub async fn auctions_settleable(
        protocol: &dyn Protocol,
        trader: Address,
    ) -> Result<Vec<Address>, LensError> {
        let trader = find_trader(protocol, trader)?;
        let open = trader.open_trades().await?;
        Ok(readiness::settleable(&open, protocol.timestamp()))
    }

    pub async fn basket_breakdown(protocol: &dyn Protocol) -> Result<BasketBreakdown, LensError> {
        let rtoken = protocol.rtoken();
        let (supply, needed) = tokio::try_join!(rtoken.total_supply(), rtoken.baskets_needed())?;

        let legs = basket_legs(protocol).await?;
        let quantities = if supply.is_zero() {
            valuation::compute_quantities(&legs, Fix::ONE, Rounding::Floor)?
        } else {
            let held = balances_of(protocol, &legs, protocol.backing_manager().address()).await?;
            valuation::compute_quantities(&legs, needed, Rounding::Floor)?
                .into_iter()
                .zip(held)
                .map(|(quantity, held)| quantity.min(held))
                .collect()
        };
        let fractions = valuation::breakdown_fractions(&legs, &quantities);

        let entries = legs
            .into_iter()
            .zip(fractions)
            .map(|(leg, fraction)| BreakdownEntry {
                erc20: leg.erc20,
                fraction,
                target_name: leg.target_name,
            })
            .collect();
        Ok(BasketBreakdown { entries })
    }

    pub async fn prime_basket(protocol: &dyn Protocol) -> Result<PrimeBasket, LensError> {
        let view = protocol
            .prime_basket_view()
            .ok_or_else(|| LensError::Unsupported("prime basket".to_string()))?;
        Ok(PrimeBasket {
            entries: view.prime_basket().await?,
        })
    }

    pub async fn backup_config(
        protocol: &dyn Protocol,
        target_name: &str,
    ) -> Result<BackupConfig, LensError> {
        let view = protocol
            .prime_basket_view()
            .ok_or_else(|| LensError::Unsupported("backup config".to_string()))?;
        view.backup_config(target_name).await
    }

    pub async fn pending_unstakings(
        protocol: &dyn Protocol,
        account: Address,
    ) -> Result<Vec<PendingUnstaking>, LensError> {
        let queue = protocol
            .unstaking_queue()
            .ok_or_else(|| LensError::Unsupported("unstaking queue".to_string()))?;
        let drafts = queue.draft_queue(account).await?;
        Ok(staking::pending_unstakings(&drafts))
    }

    /// Price of one RToken in unit of account.
    pub async fn price(protocol: &dyn Protocol) -> Result<Price, LensError> {
        let rtoken = protocol.rtoken();
        let (supply, needed) = tokio::try_join!(rtoken.total_supply(), rtoken.baskets_needed())?;
        let legs = basket_legs(protocol).await?;
        Ok(valuation::rtoken_price(&legs, supply, needed))
    }

    pub async fn st_token(protocol: &dyn Protocol) -> Result<Address, LensError> {
        Ok(protocol.staking_reserve().address())
    }

    /// Midpoint value of everything the backing manager and both revenue
    /// traders hold.
    pub async fn total_asset_value(protocol: &dyn Protocol) -> Result<Fix, LensError> {
        let traders = traders(protocol);
        let mut total = Fix::ZERO;
        for asset in registered_assets(protocol).await? {
            let balance = combined_balance(protocol, &traders, asset.erc20).await?;
            let value = asset.price.value_of(
                Fix::from_token_units(balance, asset.decimals),
                Posture::Midpoint,
            );
            total = total.saturating_add(value);
        }
        Ok(total)
    }
}

/// Revenue overview treating trades on `settling` as already settled.
pub(crate) async fn revenue_overview_settling(
    protocol: &dyn Protocol,
    trader: Address,
    settling: &[Address],
) -> Result<RevenueOverview, LensError> {
    let revenue_trader = find_trader(protocol, trader)?;
    let Some(token_to_buy) = revenue_trader.token_to_buy() else {
        return Err(LensError::Validation(format!(
            "{trader} is not a revenue trader"
        )));
    };
    let (paused, min_trade_volume, open) = tokio::try_join!(
        protocol.trading_paused(),
        revenue_trader.min_trade_volume(),
        revenue_trader.open_trades()
    )?;

    let mut entries = Vec::new();
    for asset in registered_assets(protocol).await? {
        let balance = protocol.ledger().balance_of(asset.erc20, trader).await?;
        let trade_open = open
            .iter()
            .any(|t| t.sell == asset.erc20 && !settling.contains(&t.sell));
        entries.push(readiness::revenue_entry(
            &asset,
            balance,
            Some(token_to_buy),
            min_trade_volume,
            paused,
            trade_open,
        ));
    }

    tracing::debug!(
        %trader,
        startable = entries.iter().filter(|e| e.can_start).count(),
        paused,
        "computed revenue overview"
    );
    Ok(RevenueOverview { trader, entries })
}

pub(crate) fn find_trader(protocol: &dyn Protocol, address: Address) -> Result<&dyn Trader, LensError> {
    protocol
        .trader(address)
        .ok_or_else(|| LensError::NotFound(format!("no trader at {address}")))
}

/// Current basket entries joined with their asset snapshots.
async fn basket_legs(protocol: &dyn Protocol) -> Result<Vec<BasketLeg>, LensError> {
    let registry = protocol.asset_registry();
    let mut legs = Vec::new();
    for entry in protocol.basket_handler().basket().await? {
        let asset = registry.asset(entry.erc20).await?;
        legs.push(BasketLeg::new(&entry, &asset));
    }
    Ok(legs)
}

async fn registered_assets(protocol: &dyn Protocol) -> Result<Vec<AssetSnapshot>, LensError> {
    let registry = protocol.asset_registry();
    let mut assets = Vec::new();
    for erc20 in registry.erc20s().await? {
        assets.push(registry.asset(erc20).await?);
    }
    Ok(assets)
}

async fn balances_of(
    protocol: &dyn Protocol,
    legs: &[BasketLeg],
    account: Address,
) -> Result<Vec<U256>, LensError> {
    let mut balances = Vec::with_capacity(legs.len());
    for leg in legs {
        balances.push(protocol.ledger().balance_of(leg.erc20, account).await?);
    }
    Ok(balances)
}

fn traders(protocol: &dyn Protocol) -> [Address; 3] {
    [
        protocol.backing_manager().address(),
        protocol.rtoken_trader().address(),
        protocol.rsr_trader().address(),
    ]
}

async fn combined_balance(
    protocol: &dyn Protocol,
    holders: &[Address],
    erc20: Address,
) -> Result<U256, LensError> {
    let mut total = U256::ZERO;
    for holder in holders {
        total = total.saturating_add(protocol.ledger().balance_of(erc20, *holder).await?);
    }
    Ok(total)
}
