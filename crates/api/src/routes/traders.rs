//! Revenue trader routes.

use alloy::primitives::Address;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use lens_common::error::LensError;
use lens_engine::act::RevenueAuctionsRun;
use lens_engine::readiness::RevenueOverview;
use lens_engine::{FacadeAct, FacadeRead};

use crate::middleware::auth::KeeperAuth;
use crate::response::{Pinned, pinned};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/rtokens/{rtoken}/traders/{trader}/revenue",
            get(revenue_overview),
        )
        .route(
            "/api/rtokens/{rtoken}/traders/{trader}/settleable",
            get(auctions_settleable),
        )
        .route(
            "/api/rtokens/{rtoken}/traders/{trader}/run-revenue-auctions",
            post(run_revenue_auctions),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct RunRevenueAuctionsParams {
    #[serde(default)]
    pub to_settle: Vec<Address>,
    #[serde(default)]
    pub to_start: Vec<Address>,
}

/// GET /api/rtokens/:rtoken/traders/:trader/revenue — Startable revenue auctions.
async fn revenue_overview(
    State(state): State<AppState>,
    Path((rtoken, trader)): Path<(Address, Address)>,
) -> Result<Json<Pinned<RevenueOverview>>, LensError> {
    let protocol = state.source.snapshot(rtoken).await?;
    let overview = FacadeRead::revenue_overview(protocol.as_ref(), trader).await?;
    pinned(protocol.as_ref(), overview)
}

/// GET /api/rtokens/:rtoken/traders/:trader/settleable — Auctions ready to settle.
async fn auctions_settleable(
    State(state): State<AppState>,
    Path((rtoken, trader)): Path<(Address, Address)>,
) -> Result<Json<Pinned<Vec<Address>>>, LensError> {
    let protocol = state.source.snapshot(rtoken).await?;
    let settleable = FacadeRead::auctions_settleable(protocol.as_ref(), trader).await?;
    pinned(protocol.as_ref(), settleable)
}

/// POST /api/rtokens/:rtoken/traders/:trader/run-revenue-auctions — Settle and start auctions.
///
/// Requires a keeper JWT.
async fn run_revenue_auctions(
    keeper: KeeperAuth,
    State(state): State<AppState>,
    Path((rtoken, trader)): Path<(Address, Address)>,
    Json(params): Json<RunRevenueAuctionsParams>,
) -> Result<Json<Pinned<RevenueAuctionsRun>>, LensError> {
    let protocol = state.source.snapshot(rtoken).await?;
    let run = FacadeAct::run_revenue_auctions(
        protocol.as_ref(),
        trader,
        &params.to_settle,
        &params.to_start,
    )
    .await?;

    tracing::info!(
        %rtoken,
        %trader,
        keeper = %keeper.subject,
        settled = run.settled.len(),
        started = run.started.len(),
        "Ran revenue auctions"
    );
    pinned(protocol.as_ref(), run)
}
