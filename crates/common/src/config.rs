use serde::Deserialize;

use crate::types::TradeKind;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// JSON-RPC endpoint of the chain hosting the protocol
    pub rpc_url: String,

    /// Socket address the HTTP API binds to
    pub api_listen_addr: String,

    /// How many blocks behind head each snapshot is pinned (default: 0)
    pub snapshot_lag_blocks: u64,

    /// Private key used to settle and start revenue auctions
    pub keeper_private_key: Option<String>,

    /// Auction mechanism for revenue trades started through the facade
    pub revenue_trade_kind: TradeKind,

    /// Secret that keeper JWTs are signed with. Write routes refuse every
    /// caller while unset.
    pub keeper_jwt_secret: Option<String>,

    /// Keeper JWT expiry in hours (default: 24)
    pub keeper_jwt_expiry_hours: u64,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            rpc_url: std::env::var("RPC_URL")
                .unwrap_or_else(|_| "https://eth.llamarpc.com".to_string()),
            api_listen_addr: std::env::var("API_LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            snapshot_lag_blocks: std::env::var("SNAPSHOT_LAG_BLOCKS")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SNAPSHOT_LAG_BLOCKS must be a valid u64"))?,
            keeper_private_key: std::env::var("KEEPER_PRIVATE_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            revenue_trade_kind: std::env::var("REVENUE_TRADE_KIND")
                .unwrap_or_else(|_| "batch".to_string())
                .parse()
                .map_err(|e| anyhow::anyhow!("REVENUE_TRADE_KIND: {}", e))?,
            keeper_jwt_secret: std::env::var("KEEPER_JWT_SECRET")
                .ok()
                .filter(|secret| !secret.is_empty()),
            keeper_jwt_expiry_hours: std::env::var("KEEPER_JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("KEEPER_JWT_EXPIRY_HOURS must be a valid u64"))?,
        })
    }
}
