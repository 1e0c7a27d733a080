//! Shared application state for the Axum API server.

use std::sync::Arc;

use lens_common::config::AppConfig;
use lens_engine::collaborators::ProtocolSource;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn ProtocolSource>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(source: Arc<dyn ProtocolSource>, config: AppConfig) -> Self {
        Self {
            source,
            config: Arc::new(config),
        }
    }
}
