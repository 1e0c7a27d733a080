//! Read interfaces of the protocol subsystems the facade consumes.
//!
//! Every trait is object-safe so a facade call can receive the whole protocol
//! as `&dyn Protocol`. Implementations must answer every read from the same
//! state snapshot for the lifetime of the `Protocol` value.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lens_common::error::LensError;
use lens_common::fixed::Fix;
use lens_common::types::CollateralStatus;

use crate::oracle::Price;

/// Snapshot of a registered asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub erc20: Address,
    pub decimals: u8,
    pub price: Price,
    /// Collateral can back the basket; plain assets (stake token, RToken) cannot.
    pub is_collateral: bool,
    pub status: CollateralStatus,
    /// Target unit, e.g. "USD". Only collateral has one.
    pub target_name: Option<String>,
}

/// One entry of the current reference basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketEntry {
    pub erc20: Address,
    /// Whole tokens per basket unit.
    pub quantity_per_unit: Fix,
}

/// An auction a trader has open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub sell: Address,
    pub buy: Address,
    /// Unix timestamp after which the trade can be settled.
    pub end_time: u64,
}

/// Governance-configured prime basket entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimeBasketEntry {
    pub erc20: Address,
    pub target_name: String,
    /// Target units per basket unit.
    pub target_amount: Fix,
}

/// Backup collateral for one target unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    pub erc20s: Vec<Address>,
    pub max: u64,
}

/// One cumulative draft in a staker's unstaking queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftEntry {
    /// Drafts accumulated up to and including this entry.
    pub cumulative_drafts: Fix,
    pub available_at: u64,
}

/// A staker's unstaking queue in the current draft era.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftQueue {
    /// Index of the first entry not yet withdrawn.
    pub first_remaining: u64,
    pub entries: Vec<DraftEntry>,
    /// Stake tokens per draft.
    pub draft_rate: Fix,
}

#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Registered ERC20s in registry order.
    async fn erc20s(&self) -> Result<Vec<Address>, LensError>;

    async fn asset(&self, erc20: Address) -> Result<AssetSnapshot, LensError>;
}

#[async_trait]
pub trait BasketHandler: Send + Sync {
    async fn nonce(&self) -> Result<u64, LensError>;

    /// Entries of the current reference basket.
    async fn basket(&self) -> Result<Vec<BasketEntry>, LensError>;

    /// Whole tokens of `erc20` per basket unit; zero when not in the basket.
    async fn quantity(&self, erc20: Address) -> Result<Fix, LensError>;

    async fn status(&self) -> Result<CollateralStatus, LensError>;
}

#[async_trait]
pub trait Erc20Ledger: Send + Sync {
    async fn balance_of(&self, erc20: Address, account: Address) -> Result<U256, LensError>;
}

#[async_trait]
pub trait RToken: Send + Sync {
    fn address(&self) -> Address;

    async fn total_supply(&self) -> Result<U256, LensError>;

    /// Basket units the outstanding supply is owed.
    async fn baskets_needed(&self) -> Result<Fix, LensError>;
}

#[async_trait]
pub trait StakingReserve: Send + Sync {
    fn address(&self) -> Address;

    fn stake_token(&self) -> Address;

    async fn total_staked(&self) -> Result<U256, LensError>;
}

/// A contract that holds assets and runs auctions: the backing manager or a
/// revenue trader.
#[async_trait]
pub trait Trader: Send + Sync {
    fn address(&self) -> Address;

    /// The token a revenue trader buys and keeps. `None` for the backing manager.
    fn token_to_buy(&self) -> Option<Address>;

    async fn min_trade_volume(&self) -> Result<Fix, LensError>;

    async fn open_trades(&self) -> Result<Vec<OpenTrade>, LensError>;

    async fn settle_trade(&self, sell: Address) -> Result<(), LensError>;

    async fn start_trades(&self, erc20s: &[Address]) -> Result<(), LensError>;
}

/// Prime-basket and backup-config reads. Only some basket handler
/// implementations expose them.
#[async_trait]
pub trait PrimeBasketView: Send + Sync {
    async fn prime_basket(&self) -> Result<Vec<PrimeBasketEntry>, LensError>;

    async fn backup_config(&self, target_name: &str) -> Result<BackupConfig, LensError>;
}

/// Unstaking-queue reads. Only some staking reserve implementations expose them.
#[async_trait]
pub trait UnstakingQueue: Send + Sync {
    async fn draft_queue(&self, account: Address) -> Result<DraftQueue, LensError>;
}

/// Every collaborator of one RToken, pinned to one state snapshot.
#[async_trait]
pub trait Protocol: Send + Sync {
    fn rtoken(&self) -> &dyn RToken;

    fn asset_registry(&self) -> &dyn AssetRegistry;

    fn basket_handler(&self) -> &dyn BasketHandler;

    fn ledger(&self) -> &dyn Erc20Ledger;

    fn staking_reserve(&self) -> &dyn StakingReserve;

    fn backing_manager(&self) -> &dyn Trader;

    fn rtoken_trader(&self) -> &dyn Trader;

    fn rsr_trader(&self) -> &dyn Trader;

    fn prime_basket_view(&self) -> Option<&dyn PrimeBasketView> {
        None
    }

    fn unstaking_queue(&self) -> Option<&dyn UnstakingQueue> {
        None
    }

    async fn trading_paused(&self) -> Result<bool, LensError>;

    /// Block the snapshot is pinned to.
    fn block_number(&self) -> u64;

    /// Timestamp of the pinned block.
    fn timestamp(&self) -> u64;

    /// One of the protocol's traders by address.
    fn trader(&self, address: Address) -> Option<&dyn Trader> {
        [
            self.backing_manager(),
            self.rtoken_trader(),
            self.rsr_trader(),
        ]
        .into_iter()
        .find(|trader| trader.address() == address)
    }
}

/// Produces pinned protocol snapshots on demand.
#[async_trait]
pub trait ProtocolSource: Send + Sync {
    async fn snapshot(&self, rtoken: Address) -> Result<Box<dyn Protocol>, LensError>;
}
