//! Response envelope and request parsing shared by the routes.

use std::str::FromStr;

use alloy::primitives::U256;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use lens_common::error::LensError;
use lens_engine::collaborators::Protocol;

/// Every facade result, tagged with the block it was computed at.
#[derive(Debug, Serialize)]
pub struct Pinned<T> {
    pub block: u64,
    pub timestamp: DateTime<Utc>,
    pub data: T,
}

pub fn pinned<T: Serialize>(protocol: &dyn Protocol, data: T) -> Result<Json<Pinned<T>>, LensError> {
    let seconds = i64::try_from(protocol.timestamp())
        .map_err(|_| LensError::Internal("block timestamp out of range".to_string()))?;
    let timestamp = DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| LensError::Internal(format!("invalid block timestamp {seconds}")))?;

    Ok(Json(Pinned {
        block: protocol.block_number(),
        timestamp,
        data,
    }))
}

/// Parse a raw token amount given in decimal or `0x` hex.
pub fn parse_amount(raw: &str) -> Result<U256, LensError> {
    U256::from_str(raw.trim())
        .map_err(|_| LensError::Validation(format!("invalid amount `{raw}`")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("100").unwrap(), U256::from(100u64));
        assert_eq!(parse_amount("0x64").unwrap(), U256::from(100u64));
        assert!(matches!(
            parse_amount("ten"),
            Err(LensError::Validation(_))
        ));
        assert!(parse_amount("-1").is_err());
    }
}
