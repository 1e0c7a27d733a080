//! RToken-level read routes.
//!
//! Each handler takes a fresh snapshot, runs one facade read against it and
//! returns the result pinned to the snapshot's block.

use alloy::primitives::{Address, U256};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use lens_common::error::LensError;
use lens_common::fixed::Fix;
use lens_engine::FacadeRead;
use lens_engine::collaborators::BackupConfig;
use lens_engine::collateralization::BackingOverview;
use lens_engine::facade::{PrimeBasket, TraderBalances};
use lens_engine::oracle::Price;
use lens_engine::readiness::RecollateralizationAuction;
use lens_engine::staking::PendingUnstaking;
use lens_engine::valuation::{BasketBreakdown, IssueQuote, RedeemQuote};

use crate::response::{Pinned, parse_amount, pinned};
use crate::state::AppState;

type Reply<T> = Result<Json<Pinned<T>>, LensError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/rtokens/{rtoken}/max-issuable/{holder}",
            get(max_issuable),
        )
        .route("/api/rtokens/{rtoken}/issue", get(issue))
        .route("/api/rtokens/{rtoken}/redeem", get(redeem))
        .route("/api/rtokens/{rtoken}/backing", get(backing))
        .route("/api/rtokens/{rtoken}/balances", get(balances))
        .route("/api/rtokens/{rtoken}/basket-breakdown", get(basket_breakdown))
        .route("/api/rtokens/{rtoken}/price", get(price))
        .route("/api/rtokens/{rtoken}/st-token", get(st_token))
        .route("/api/rtokens/{rtoken}/total-asset-value", get(total_asset_value))
        .route("/api/rtokens/{rtoken}/prime-basket", get(prime_basket))
        .route(
            "/api/rtokens/{rtoken}/backup-config/{target}",
            get(backup_config),
        )
        .route(
            "/api/rtokens/{rtoken}/pending-unstakings/{account}",
            get(pending_unstakings),
        )
        .route(
            "/api/rtokens/{rtoken}/recollateralization/{backing_manager}",
            get(recollateralization),
        )
}

#[derive(Debug, Deserialize)]
pub struct AmountQuery {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct RedeemQuery {
    pub amount: String,
    pub nonce: u64,
}

/// GET /api/rtokens/:rtoken/max-issuable/:holder — RToken the holder could issue now.
async fn max_issuable(
    State(state): State<AppState>,
    Path((rtoken, holder)): Path<(Address, Address)>,
) -> Reply<U256> {
    let protocol = state.source.snapshot(rtoken).await?;
    let issuable = FacadeRead::max_issuable(protocol.as_ref(), holder).await?;
    pinned(protocol.as_ref(), issuable)
}

/// GET /api/rtokens/:rtoken/issue?amount= — Collateral required to issue.
async fn issue(
    State(state): State<AppState>,
    Path(rtoken): Path<Address>,
    Query(query): Query<AmountQuery>,
) -> Reply<IssueQuote> {
    let amount = parse_amount(&query.amount)?;
    let protocol = state.source.snapshot(rtoken).await?;
    let quote = FacadeRead::issue(protocol.as_ref(), amount).await?;
    pinned(protocol.as_ref(), quote)
}

/// GET /api/rtokens/:rtoken/redeem?amount=&nonce= — Collateral paid out on redemption.
async fn redeem(
    State(state): State<AppState>,
    Path(rtoken): Path<Address>,
    Query(query): Query<RedeemQuery>,
) -> Reply<RedeemQuote> {
    let amount = parse_amount(&query.amount)?;
    let protocol = state.source.snapshot(rtoken).await?;
    let quote = FacadeRead::redeem(protocol.as_ref(), amount, query.nonce).await?;
    pinned(protocol.as_ref(), quote)
}

async fn backing(State(state): State<AppState>, Path(rtoken): Path<Address>) -> Reply<BackingOverview> {
    let protocol = state.source.snapshot(rtoken).await?;
    let overview = FacadeRead::backing_overview(protocol.as_ref()).await?;
    pinned(protocol.as_ref(), overview)
}

async fn balances(State(state): State<AppState>, Path(rtoken): Path<Address>) -> Reply<TraderBalances> {
    let protocol = state.source.snapshot(rtoken).await?;
    let balances = FacadeRead::balances_across_all_traders(protocol.as_ref()).await?;
    pinned(protocol.as_ref(), balances)
}

async fn basket_breakdown(
    State(state): State<AppState>,
    Path(rtoken): Path<Address>,
) -> Reply<BasketBreakdown> {
    let protocol = state.source.snapshot(rtoken).await?;
    let breakdown = FacadeRead::basket_breakdown(protocol.as_ref()).await?;
    pinned(protocol.as_ref(), breakdown)
}

async fn price(State(state): State<AppState>, Path(rtoken): Path<Address>) -> Reply<Price> {
    let protocol = state.source.snapshot(rtoken).await?;
    let price = FacadeRead::price(protocol.as_ref()).await?;
    pinned(protocol.as_ref(), price)
}

async fn st_token(State(state): State<AppState>, Path(rtoken): Path<Address>) -> Reply<Address> {
    let protocol = state.source.snapshot(rtoken).await?;
    let st_token = FacadeRead::st_token(protocol.as_ref()).await?;
    pinned(protocol.as_ref(), st_token)
}

async fn total_asset_value(State(state): State<AppState>, Path(rtoken): Path<Address>) -> Reply<Fix> {
    let protocol = state.source.snapshot(rtoken).await?;
    let total = FacadeRead::total_asset_value(protocol.as_ref()).await?;
    pinned(protocol.as_ref(), total)
}

async fn prime_basket(State(state): State<AppState>, Path(rtoken): Path<Address>) -> Reply<PrimeBasket> {
    let protocol = state.source.snapshot(rtoken).await?;
    let prime = FacadeRead::prime_basket(protocol.as_ref()).await?;
    pinned(protocol.as_ref(), prime)
}

async fn backup_config(
    State(state): State<AppState>,
    Path((rtoken, target)): Path<(Address, String)>,
) -> Reply<BackupConfig> {
    let protocol = state.source.snapshot(rtoken).await?;
    let config = FacadeRead::backup_config(protocol.as_ref(), &target).await?;
    pinned(protocol.as_ref(), config)
}

async fn pending_unstakings(
    State(state): State<AppState>,
    Path((rtoken, account)): Path<(Address, Address)>,
) -> Reply<Vec<PendingUnstaking>> {
    let protocol = state.source.snapshot(rtoken).await?;
    let pending = FacadeRead::pending_unstakings(protocol.as_ref(), account).await?;
    pinned(protocol.as_ref(), pending)
}

/// GET /api/rtokens/:rtoken/recollateralization/:backing_manager — Next rebalancing trade.
async fn recollateralization(
    State(state): State<AppState>,
    Path((rtoken, backing_manager)): Path<(Address, Address)>,
) -> Reply<RecollateralizationAuction> {
    let protocol = state.source.snapshot(rtoken).await?;
    let auction =
        FacadeRead::next_recollateralization_auction(protocol.as_ref(), backing_manager).await?;
    pinned(protocol.as_ref(), auction)
}
