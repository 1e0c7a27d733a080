//! Keeper actions. The only path through which the facade causes side effects.

use alloy::primitives::Address;
use serde::Serialize;

use lens_common::error::LensError;

use crate::collaborators::Protocol;
use crate::facade::{FacadeRead, find_trader, revenue_overview_settling};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevenueAuctionsRun {
    pub settled: Vec<Address>,
    pub started: Vec<Address>,
}

pub struct FacadeAct;

impl FacadeAct {
    /// Settle the listed auctions of a revenue trader, then start new ones.
    ///
    /// Every listed asset is checked before anything is sent: a trade to
    /// settle must be settleable and an asset to start must be startable once
    /// those settlements land. An asset listed twice in either list is
    /// rejected. Not idempotent.
    pub async fn run_revenue_auctions(
        protocol: &dyn Protocol,
        trader: Address,
        to_settle: &[Address],
        to_start: &[Address],
    ) -> Result<RevenueAuctionsRun, LensError> {
        let revenue_trader = find_trader(protocol, trader)?;
        reject_duplicates(to_settle, "settle")?;
        reject_duplicates(to_start, "start")?;

        let settleable = FacadeRead::auctions_settleable(protocol, trader).await?;
        if let Some(erc20) = to_settle.iter().find(|erc20| !settleable.contains(erc20)) {
            return Err(LensError::Validation(format!(
                "no settleable auction selling {erc20}"
            )));
        }

        let overview = revenue_overview_settling(protocol, trader, to_settle).await?;
        for erc20 in to_start {
            let startable = overview.entry(*erc20).is_some_and(|entry| entry.can_start);
            if !startable {
                return Err(LensError::Validation(format!(
                    "revenue auction for {erc20} cannot start"
                )));
            }
        }

        for erc20 in to_settle {
            revenue_trader.settle_trade(*erc20).await?;
            tracing::info!(%trader, %erc20, "settled revenue auction");
        }
        if !to_start.is_empty() {
            revenue_trader.start_trades(to_start).await?;
            tracing::info!(%trader, count = to_start.len(), "started revenue auctions");
        }

        Ok(RevenueAuctionsRun {
            settled: to_settle.to_vec(),
            started: to_start.to_vec(),
        })
    }
}

fn reject_duplicates(erc20s: &[Address], action: &str) -> Result<(), LensError> {
    for (i, erc20) in erc20s.iter().enumerate() {
        if erc20s[..i].contains(erc20) {
            return Err(LensError::Validation(format!(
                "{erc20} listed more than once to {action}"
            )));
        }
    }
    Ok(())
}
