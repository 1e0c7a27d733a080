//! Keeper authentication for write routes.
//!
//! Keepers present a JWT signed with `KEEPER_JWT_SECRET` in the
//! `Authorization: Bearer <token>` header. Without a configured secret every
//! caller is rejected.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use lens_common::error::LensError;

use crate::state::AppState;

/// JWT claims stored in a keeper token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject, the keeper's name
    pub sub: String,
    /// Expiration time (UNIX timestamp)
    pub exp: i64,
    /// Issued at (UNIX timestamp)
    pub iat: i64,
}

/// Authenticated keeper extracted from a JWT.
///
/// Use as an Axum extractor on routes that send transactions:
/// ```ignore
/// async fn handler(keeper: KeeperAuth) -> impl IntoResponse {
///     // keeper.subject names the caller
/// }
/// ```
#[derive(Debug, Clone)]
pub struct KeeperAuth {
    pub subject: String,
    pub claims: Claims,
}

/// Encode a keeper JWT.
pub fn encode_jwt(subject: &str, secret: &str, expiry_hours: u64) -> Result<String, LensError> {
    let now = Utc::now();
    let hours = i64::try_from(expiry_hours)
        .map_err(|_| LensError::Config("keeper JWT expiry out of range".to_string()))?;
    let exp = now + Duration::hours(hours);

    let claims = Claims {
        sub: subject.to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| LensError::Internal(format!("Failed to encode JWT: {}", e)))
}

/// Decode and validate a keeper JWT.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, LensError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| LensError::Auth(format!("Invalid token: {}", e)))?;

    Ok(token_data.claims)
}

impl FromRequestParts<AppState> for KeeperAuth {
    type Rejection = LensError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let secret = state.config.keeper_jwt_secret.clone();

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        async move {
            let Some(secret) = secret else {
                return Err(LensError::Auth(
                    "Keeper actions are disabled: KEEPER_JWT_SECRET is not set".to_string(),
                ));
            };

            let token = auth_header
                .as_deref()
                .and_then(|auth| auth.strip_prefix("Bearer "))
                .ok_or_else(|| {
                    LensError::Auth(
                        "Missing or invalid Authorization header. Use 'Bearer <JWT>'".to_string(),
                    )
                })?;

            let claims = decode_jwt(token, &secret)?;
            Ok(KeeperAuth {
                subject: claims.sub.clone(),
                claims,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-for-unit-tests";

    #[test]
    fn test_encode_decode_jwt() {
        let token = encode_jwt("ops", TEST_SECRET, 24).unwrap();
        let claims = decode_jwt(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, "ops");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_invalid_secret_rejected() {
        let token = encode_jwt("ops", TEST_SECRET, 24).unwrap();
        assert!(matches!(
            decode_jwt(&token, "wrong-secret"),
            Err(LensError::Auth(_))
        ));
    }

    #[test]
    fn test_expired_jwt_rejected() {
        let now = Utc::now();
        let claims = Claims {
            sub: "ops".to_string(),
            exp: (now - Duration::hours(1)).timestamp(),
            iat: (now - Duration::hours(2)).timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        assert!(decode_jwt(&token, TEST_SECRET).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(decode_jwt("not.a.valid.jwt", TEST_SECRET).is_err());
    }
}
