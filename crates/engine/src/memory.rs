//! In-memory protocol snapshot.
//!
//! Holds every collaborator's state in plain maps. Used by the engine and API
//! test suites.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256, address};
use async_trait::async_trait;

use lens_common::error::LensError;
use lens_common::fixed::{Fix, Rounding};
use lens_common::types::CollateralStatus;

use crate::collaborators::{
    AssetRegistry, AssetSnapshot, BackupConfig, BasketEntry, BasketHandler, DraftQueue,
    Erc20Ledger, OpenTrade, PrimeBasketEntry, PrimeBasketView, Protocol, ProtocolSource,
    RToken, StakingReserve, Trader, UnstakingQueue,
};
use crate::oracle::Price;
use crate::valuation::{self, BasketLeg};

pub const BACKING_MANAGER: Address = address!("0x00000000000000000000000000000000000000b1");
pub const RTOKEN_TRADER: Address = address!("0x00000000000000000000000000000000000000b2");
pub const RSR_TRADER: Address = address!("0x00000000000000000000000000000000000000b3");
pub const STAKING_RESERVE: Address = address!("0x00000000000000000000000000000000000000b4");

/// Seconds between starting an auction and being able to settle it.
pub const AUCTION_LENGTH: u64 = 900;

#[derive(Debug, Clone)]
struct MemRToken {
    address: Address,
    total_supply: U256,
    baskets_needed: Fix,
}

#[async_trait]
impl RToken for MemRToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn total_supply(&self) -> Result<U256, LensError> {
        Ok(self.total_supply)
    }

    async fn baskets_needed(&self) -> Result<Fix, LensError> {
        Ok(self.baskets_needed)
    }
}

#[derive(Debug, Clone, Default)]
struct MemRegistry {
    assets: Vec<AssetSnapshot>,
}

#[async_trait]
impl AssetRegistry for MemRegistry {
    async fn erc20s(&self) -> Result<Vec<Address>, LensError> {
        Ok(self.assets.iter().map(|asset| asset.erc20).collect())
    }

    async fn asset(&self, erc20: Address) -> Result<AssetSnapshot, LensError> {
        self.assets
            .iter()
            .find(|asset| asset.erc20 == erc20)
            .cloned()
            .ok_or_else(|| LensError::NotFound(format!("no asset registered for {erc20}")))
    }
}

#[derive(Debug, Clone)]
struct MemBasketHandler {
    nonce: u64,
    entries: Vec<BasketEntry>,
    status: CollateralStatus,
}

#[async_trait]
impl BasketHandler for MemBasketHandler {
    async fn nonce(&self) -> Result<u64, LensError> {
        Ok(self.nonce)
    }

    async fn basket(&self) -> Result<Vec<BasketEntry>, LensError> {
        Ok(self.entries.clone())
    }

    async fn quantity(&self, erc20: Address) -> Result<Fix, LensError> {
        Ok(self
            .entries
            .iter()
            .find(|entry| entry.erc20 == erc20)
            .map(|entry| entry.quantity_per_unit)
            .unwrap_or(Fix::ZERO))
    }

    async fn status(&self) -> Result<CollateralStatus, LensError> {
        Ok(self.status)
    }
}

#[derive(Debug, Clone, Default)]
struct MemLedger {
    balances: HashMap<(Address, Address), U256>,
}

impl MemLedger {
    fn get(&self, erc20: Address, account: Address) -> U256 {
        self.balances
            .get(&(erc20, account))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn set(&mut self, erc20: Address, account: Address, amount: U256) {
        self.balances.insert((erc20, account), amount);
    }
}

#[async_trait]
impl Erc20Ledger for MemLedger {
    async fn balance_of(&self, erc20: Address, account: Address) -> Result<U256, LensError> {
        Ok(self.get(erc20, account))
    }
}

#[derive(Debug, Clone)]
struct MemStaking {
    stake_token: Address,
    total_staked: U256,
}

#[async_trait]
impl StakingReserve for MemStaking {
    fn address(&self) -> Address {
        STAKING_RESERVE
    }

    fn stake_token(&self) -> Address {
        self.stake_token
    }

    async fn total_staked(&self) -> Result<U256, LensError> {
        Ok(self.total_staked)
    }
}

/// A trader whose open trades are shared between clones of its protocol.
#[derive(Debug, Clone)]
struct MemTrader {
    address: Address,
    token_to_buy: Option<Address>,
    min_trade_volume: Fix,
    trades: Arc<Mutex<Vec<OpenTrade>>>,
    clock: u64,
}

impl MemTrader {
    fn new(address: Address, token_to_buy: Option<Address>) -> Self {
        Self {
            address,
            token_to_buy,
            min_trade_volume: Fix::ONE,
            trades: Arc::new(Mutex::new(Vec::new())),
            clock: 0,
        }
    }

    fn with_trades<T>(&self, f: impl FnOnce(&mut Vec<OpenTrade>) -> T) -> Result<T, LensError> {
        let mut trades = self
            .trades
            .lock()
            .map_err(|_| LensError::Internal("trade book lock poisoned".to_string()))?;
        Ok(f(&mut trades))
    }
}

#[async_trait]
impl Trader for MemTrader {
    fn address(&self) -> Address {
        self.address
    }

    fn token_to_buy(&self) -> Option<Address> {
        self.token_to_buy
    }

    async fn min_trade_volume(&self) -> Result<Fix, LensError> {
        Ok(self.min_trade_volume)
    }

    async fn open_trades(&self) -> Result<Vec<OpenTrade>, LensError> {
        self.with_trades(|trades| trades.clone())
    }

    async fn settle_trade(&self, sell: Address) -> Result<(), LensError> {
        let removed = self.with_trades(|trades| {
            let before = trades.len();
            trades.retain(|trade| trade.sell != sell);
            before != trades.len()
        })?;
        if removed {
            Ok(())
        } else {
            Err(LensError::Validation(format!("no open trade selling {sell}")))
        }
    }

    async fn start_trades(&self, erc20s: &[Address]) -> Result<(), LensError> {
        let buy = self.token_to_buy.unwrap_or_default();
        let end_time = self.clock + AUCTION_LENGTH;
        self.with_trades(|trades| {
            trades.extend(erc20s.iter().map(|sell| OpenTrade {
                sell: *sell,
                buy,
                end_time,
            }))
        })
    }
}

#[derive(Debug, Clone, Default)]
struct MemPrimeBasket {
    entries: Vec<PrimeBasketEntry>,
    backups: HashMap<String, BackupConfig>,
}

#[async_trait]
impl PrimeBasketView for MemPrimeBasket {
    async fn prime_basket(&self) -> Result<Vec<PrimeBasketEntry>, LensError> {
        Ok(self.entries.clone())
    }

    async fn backup_config(&self, target_name: &str) -> Result<BackupConfig, LensError> {
        Ok(self.backups.get(target_name).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Default)]
struct MemUnstaking {
    queues: HashMap<Address, DraftQueue>,
}

#[async_trait]
impl UnstakingQueue for MemUnstaking {
    async fn draft_queue(&self, account: Address) -> Result<DraftQueue, LensError> {
        Ok(self.queues.get(&account).cloned().unwrap_or_default())
    }
}

/// A complete RToken protocol held in memory.
///
/// Cloning shares the traders' open trades, so auctions started through one
/// clone are visible from every other.
#[derive(Debug, Clone)]
pub struct InMemoryProtocol {
    rtoken: MemRToken,
    registry: MemRegistry,
    basket: MemBasketHandler,
    ledger: MemLedger,
    staking: MemStaking,
    backing_manager: MemTrader,
    rtoken_trader: MemTrader,
    rsr_trader: MemTrader,
    prime: Option<MemPrimeBasket>,
    unstaking: Option<MemUnstaking>,
    paused: bool,
    block_number: u64,
    timestamp: u64,
}

impl InMemoryProtocol {
    /// An empty protocol: no supply, no basket, nothing registered.
    pub fn new(rtoken: Address, stake_token: Address) -> Self {
        Self {
            rtoken: MemRToken {
                address: rtoken,
                total_supply: U256::ZERO,
                baskets_needed: Fix::ZERO,
            },
            registry: MemRegistry::default(),
            basket: MemBasketHandler {
                nonce: 0,
                entries: Vec::new(),
                status: CollateralStatus::Sound,
            },
            ledger: MemLedger::default(),
            staking: MemStaking {
                stake_token,
                total_staked: U256::ZERO,
            },
            backing_manager: MemTrader::new(BACKING_MANAGER, None),
            rtoken_trader: MemTrader::new(RTOKEN_TRADER, Some(rtoken)),
            rsr_trader: MemTrader::new(RSR_TRADER, Some(stake_token)),
            prime: None,
            unstaking: None,
            paused: false,
            block_number: 1,
            timestamp: 0,
        }
    }

    /// Register an asset, or replace an already registered one in place.
    pub fn with_asset(mut self, asset: AssetSnapshot) -> Self {
        match self
            .registry
            .assets
            .iter_mut()
            .find(|registered| registered.erc20 == asset.erc20)
        {
            Some(registered) => *registered = asset,
            None => self.registry.assets.push(asset),
        }
        self
    }

    pub fn with_basket(mut self, entries: Vec<BasketEntry>) -> Self {
        self.set_basket(entries);
        self
    }

    pub fn with_prime_basket(
        mut self,
        entries: Vec<PrimeBasketEntry>,
        backups: HashMap<String, BackupConfig>,
    ) -> Self {
        self.prime = Some(MemPrimeBasket { entries, backups });
        self
    }

    pub fn with_unstaking(mut self, queues: HashMap<Address, DraftQueue>) -> Self {
        self.unstaking = Some(MemUnstaking { queues });
        self
    }

    /// Switch to a new reference basket, bumping the nonce.
    pub fn set_basket(&mut self, entries: Vec<BasketEntry>) {
        self.basket.entries = entries;
        self.basket.nonce += 1;
    }

    pub fn set_basket_status(&mut self, status: CollateralStatus) {
        self.basket.status = status;
    }

    pub fn set_price(&mut self, erc20: Address, price: Price) {
        if let Some(asset) = self.registry.assets.iter_mut().find(|a| a.erc20 == erc20) {
            asset.price = price;
        }
    }

    pub fn set_balance(&mut self, erc20: Address, account: Address, amount: U256) {
        self.ledger.set(erc20, account, amount);
    }

    pub fn balance(&self, erc20: Address, account: Address) -> U256 {
        self.ledger.get(erc20, account)
    }

    pub fn set_supply(&mut self, total_supply: U256, baskets_needed: Fix) {
        self.rtoken.total_supply = total_supply;
        self.rtoken.baskets_needed = baskets_needed;
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_block(&mut self, block_number: u64, timestamp: u64) {
        self.block_number = block_number;
        self.timestamp = timestamp;
        for trader in [
            &mut self.backing_manager,
            &mut self.rtoken_trader,
            &mut self.rsr_trader,
        ] {
            trader.clock = timestamp;
        }
    }

    pub fn set_min_trade_volume(&mut self, trader: Address, volume: Fix) {
        if let Some(trader) = self.trader_mut(trader) {
            trader.min_trade_volume = volume;
        }
    }

    /// Record an auction the trader already has running.
    pub fn open_trade(&mut self, trader: Address, trade: OpenTrade) -> Result<(), LensError> {
        let trader = self
            .trader_mut(trader)
            .ok_or_else(|| LensError::NotFound(format!("no trader at {trader}")))?;
        trader.with_trades(|trades| trades.push(trade))
    }

    /// Stake `amount` stake tokens into the staking reserve.
    pub fn stake(&mut self, amount: U256) {
        self.staking.total_staked += amount;
        let held = self.ledger.get(self.staking.stake_token, STAKING_RESERVE);
        self.ledger
            .set(self.staking.stake_token, STAKING_RESERVE, held + amount);
    }

    /// Issue `amount` RToken to `holder`, moving the collateral it costs from
    /// the holder to the backing manager.
    pub fn issue(&mut self, holder: Address, amount: U256) -> Result<(), LensError> {
        let legs = self
            .basket
            .entries
            .iter()
            .map(|entry| {
                let asset = self
                    .registry
                    .assets
                    .iter()
                    .find(|asset| asset.erc20 == entry.erc20)
                    .ok_or_else(|| {
                        LensError::NotFound(format!("no asset registered for {}", entry.erc20))
                    })?;
                Ok(BasketLeg::new(entry, asset))
            })
            .collect::<Result<Vec<_>, LensError>>()?;

        let units = valuation::basket_units(
            amount,
            self.rtoken.total_supply,
            self.rtoken.baskets_needed,
            Rounding::Ceil,
        )?;
        let quantities = valuation::compute_quantities(&legs, units, Rounding::Ceil)?;

        for (leg, quantity) in legs.iter().zip(&quantities) {
            let held = self.ledger.get(leg.erc20, holder);
            if held < *quantity {
                return Err(LensError::Validation(format!(
                    "{holder} holds {held} of {}, needs {quantity}",
                    leg.erc20
                )));
            }
        }
        for (leg, quantity) in legs.iter().zip(quantities) {
            let held = self.ledger.get(leg.erc20, holder);
            self.ledger.set(leg.erc20, holder, held - quantity);
            let managed = self.ledger.get(leg.erc20, BACKING_MANAGER);
            self.ledger.set(leg.erc20, BACKING_MANAGER, managed + quantity);
        }

        let rtoken = self.rtoken.address;
        let issued = self.ledger.get(rtoken, holder);
        self.ledger.set(rtoken, holder, issued + amount);
        self.rtoken.total_supply += amount;
        self.rtoken.baskets_needed = self.rtoken.baskets_needed.saturating_add(units);
        Ok(())
    }

    fn trader_mut(&mut self, address: Address) -> Option<&mut MemTrader> {
        [
            &mut self.backing_manager,
            &mut self.rtoken_trader,
            &mut self.rsr_trader,
        ]
        .into_iter()
        .find(|trader| trader.address == address)
    }
}

#[async_trait]
impl Protocol for InMemoryProtocol {
    fn rtoken(&self) -> &dyn RToken {
        &self.rtoken
    }

    fn asset_registry(&self) -> &dyn AssetRegistry {
        &self.registry
    }

    fn basket_handler(&self) -> &dyn BasketHandler {
        &self.basket
    }

    fn ledger(&self) -> &dyn Erc20Ledger {
        &self.ledger
    }

    fn staking_reserve(&self) -> &dyn StakingReserve {
        &self.staking
    }

    fn backing_manager(&self) -> &dyn Trader {
        &self.backing_manager
    }

    fn rtoken_trader(&self) -> &dyn Trader {
        &self.rtoken_trader
    }

    fn rsr_trader(&self) -> &dyn Trader {
        &self.rsr_trader
    }

    fn prime_basket_view(&self) -> Option<&dyn PrimeBasketView> {
        self.prime.as_ref().map(|view| view as &dyn PrimeBasketView)
    }

    fn unstaking_queue(&self) -> Option<&dyn UnstakingQueue> {
        self.unstaking.as_ref().map(|queue| queue as &dyn UnstakingQueue)
    }

    async fn trading_paused(&self) -> Result<bool, LensError> {
        Ok(self.paused)
    }

    fn block_number(&self) -> u64 {
        self.block_number
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

/// Serves snapshots of a fixed set of in-memory protocols.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    protocols: HashMap<Address, InMemoryProtocol>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, protocol: InMemoryProtocol) -> Self {
        self.protocols.insert(protocol.rtoken.address, protocol);
        self
    }
}

#[async_trait]
impl ProtocolSource for InMemorySource {
    async fn snapshot(&self, rtoken: Address) -> Result<Box<dyn Protocol>, LensError> {
        self.protocols
            .get(&rtoken)
            .cloned()
            .map(|protocol| Box::new(protocol) as Box<dyn Protocol>)
            .ok_or_else(|| LensError::NotFound(format!("no RToken at {rtoken}")))
    }
}

#[cfg(test)]
mod tests {
    use lens_common::fixed::pow10;

    use super::*;

    const RTOKEN: Address = address!("0x00000000000000000000000000000000000000a1");
    const RSR: Address = address!("0x00000000000000000000000000000000000000a2");
    const TOKEN: Address = address!("0x00000000000000000000000000000000000000c1");
    const HOLDER: Address = address!("0x00000000000000000000000000000000000000d1");

    fn token() -> AssetSnapshot {
        AssetSnapshot {
            erc20: TOKEN,
            decimals: 18,
            price: Price::from_bounds(Fix::ONE, Fix::ONE),
            is_collateral: true,
            status: CollateralStatus::Sound,
            target_name: Some("USD".to_string()),
        }
    }

    #[test]
    fn test_issue_moves_collateral_to_backing_manager() {
        let mut protocol = InMemoryProtocol::new(RTOKEN, RSR)
            .with_asset(token())
            .with_basket(vec![BasketEntry { erc20: TOKEN, quantity_per_unit: Fix::ONE }]);
        protocol.set_balance(TOKEN, HOLDER, pow10(20));

        protocol.issue(HOLDER, pow10(19)).unwrap();

        assert_eq!(protocol.balance(TOKEN, HOLDER), pow10(20) - pow10(19));
        assert_eq!(protocol.balance(TOKEN, BACKING_MANAGER), pow10(19));
        assert_eq!(protocol.balance(RTOKEN, HOLDER), pow10(19));
        assert_eq!(protocol.rtoken.baskets_needed, Fix::from_int(10));
    }

    #[test]
    fn test_issue_rejects_insufficient_balance() {
        let mut protocol = InMemoryProtocol::new(RTOKEN, RSR)
            .with_asset(token())
            .with_basket(vec![BasketEntry { erc20: TOKEN, quantity_per_unit: Fix::ONE }]);
        assert!(matches!(
            protocol.issue(HOLDER, pow10(18)),
            Err(LensError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_clones_share_open_trades() {
        let protocol = InMemoryProtocol::new(RTOKEN, RSR);
        let clone = protocol.clone();
        protocol.rsr_trader.start_trades(&[TOKEN]).await.unwrap();

        let open = clone.rsr_trader().open_trades().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].buy, RSR);
        assert_eq!(open[0].end_time, AUCTION_LENGTH);
    }

    #[tokio::test]
    async fn test_source_rejects_unknown_rtoken() {
        let source = InMemorySource::new().with(InMemoryProtocol::new(RTOKEN, RSR));
        assert!(source.snapshot(RTOKEN).await.is_ok());
        assert!(matches!(
            source.snapshot(RSR).await,
            Err(LensError::NotFound(_))
        ));
    }
}
