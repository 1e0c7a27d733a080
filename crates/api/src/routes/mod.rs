pub mod health;
pub mod rtokens;
pub mod traders;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(rtokens::router())
        .merge(traders::router())
        .with_state(state)
}
