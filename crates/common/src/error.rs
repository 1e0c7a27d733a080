use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::fixed::FixError;

/// Common error types used across the facade.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("non-current basket nonce: quoted {quoted}, current {current}")]
    StaleBasketNonce { quoted: u64, current: u64 },

    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("Arithmetic error: {0}")]
    Arithmetic(#[from] FixError),

    #[error("Not supported: {0}")]
    Unsupported(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LensError {
    /// Wrap any collaborator-side failure.
    pub fn collaborator(err: impl std::fmt::Display) -> Self {
        LensError::CollaboratorUnavailable(err.to_string())
    }
}

impl IntoResponse for LensError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            LensError::StaleBasketNonce { .. } => (StatusCode::CONFLICT, self.to_string()),
            LensError::CollaboratorUnavailable(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            LensError::Arithmetic(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            LensError::Unsupported(msg) => (StatusCode::NOT_IMPLEMENTED, msg.clone()),
            LensError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            LensError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            LensError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            LensError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            LensError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
