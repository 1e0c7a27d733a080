//! Block-pinned protocol snapshot over JSON-RPC.
//!
//! Every read carries the snapshot's block, so concurrent reads within one
//! facade call all observe the same state.

use alloy::primitives::aliases::U192;
use alloy::primitives::{Address, U256};
use alloy::providers::DynProvider;
use alloy::rpc::types::BlockId;
use async_trait::async_trait;

use lens_common::error::LensError;
use lens_common::fixed::{Fix, Rounding};
use lens_common::types::{CollateralStatus, TradeKind};
use lens_engine::collaborators::{
    AssetRegistry, AssetSnapshot, BackupConfig, BasketEntry, BasketHandler, DraftEntry,
    DraftQueue, Erc20Ledger, OpenTrade, PrimeBasketEntry, PrimeBasketView, Protocol, RToken,
    StakingReserve, Trader, UnstakingQueue,
};
use lens_engine::oracle::Price;

use crate::contracts::{
    IAsset, IAssetRegistry, IBasketHandler, ICollateral, IERC20, IMain, IRToken,
    IRevenueTrader, IStRSRP1, ITrade, ITrading, rounding_ordinal, target_name_from_bytes32,
    target_name_to_bytes32, to_u64,
};
use crate::registry::ProtocolComponents;

/// One basket unit as a raw uint192.
const ONE_BASKET: u64 = 1_000_000_000_000_000_000;

/// Longest draft queue read for one account.
const MAX_DRAFT_QUEUE_LEN: u64 = 1_000;

/// A provider bound to one block.
#[derive(Clone)]
struct Pinned {
    provider: DynProvider,
    block: BlockId,
}

/// How trades started through the facade are sent.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// A keeper wallet is attached to the provider.
    pub keeper: bool,
    pub revenue_trade_kind: TradeKind,
}

struct ChainRToken {
    pinned: Pinned,
    address: Address,
}

#[async_trait]
impl RToken for ChainRToken {
    fn address(&self) -> Address {
        self.address
    }

    async fn total_supply(&self) -> Result<U256, LensError> {
        IRToken::new(self.address, self.pinned.provider.clone())
            .totalSupply()
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)
    }

    async fn baskets_needed(&self) -> Result<Fix, LensError> {
        let raw = IRToken::new(self.address, self.pinned.provider.clone())
            .basketsNeeded()
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        Ok(Fix::from_raw(raw))
    }
}

struct ChainAssetRegistry {
    pinned: Pinned,
    address: Address,
}

#[async_trait]
impl AssetRegistry for ChainAssetRegistry {
    async fn erc20s(&self) -> Result<Vec<Address>, LensError> {
        IAssetRegistry::new(self.address, self.pinned.provider.clone())
            .erc20s()
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)
    }

    async fn asset(&self, erc20: Address) -> Result<AssetSnapshot, LensError> {
        let Pinned { provider, block } = &self.pinned;
        let asset_address = IAssetRegistry::new(self.address, provider.clone())
            .toAsset(erc20)
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;

        let asset = IAsset::new(asset_address, provider.clone());
        let price = asset
            .price()
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        let decimals = asset
            .erc20Decimals()
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        let is_collateral = asset
            .isCollateral()
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;

        let (status, target_name) = if is_collateral {
            let collateral = ICollateral::new(asset_address, provider.clone());
            let ordinal = collateral
                .status()
                .block(*block)
                .call()
                .await
                .map_err(LensError::collaborator)?;
            let target = collateral
                .targetName()
                .block(*block)
                .call()
                .await
                .map_err(LensError::collaborator)?;
            (
                status_from_ordinal(ordinal)?,
                Some(target_name_from_bytes32(target)),
            )
        } else {
            (CollateralStatus::Sound, None)
        };

        Ok(AssetSnapshot {
            erc20,
            decimals,
            price: Price::from_bounds(Fix::from_raw(price.low), Fix::from_raw(price.high)),
            is_collateral,
            status,
            target_name,
        })
    }
}

struct ChainBasketHandler {
    pinned: Pinned,
    address: Address,
}

impl ChainBasketHandler {
    fn contract(&self) -> IBasketHandler::IBasketHandlerInstance<DynProvider> {
        IBasketHandler::new(self.address, self.pinned.provider.clone())
    }
}

#[async_trait]
impl BasketHandler for ChainBasketHandler {
    async fn nonce(&self) -> Result<u64, LensError> {
        let nonce = self
            .contract()
            .nonce()
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        to_u64(nonce, "basket nonce")
    }

    async fn basket(&self) -> Result<Vec<BasketEntry>, LensError> {
        // One basket unit lists the basket's erc20s; quantities are read
        // unscaled so low-decimal tokens keep full precision.
        let quote = self
            .contract()
            .quote(U192::from(ONE_BASKET), rounding_ordinal(Rounding::Floor))
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)?;

        let mut entries = Vec::with_capacity(quote.erc20s.len());
        for erc20 in quote.erc20s {
            entries.push(BasketEntry {
                erc20,
                quantity_per_unit: self.quantity(erc20).await?,
            });
        }
        Ok(entries)
    }

    async fn quantity(&self, erc20: Address) -> Result<Fix, LensError> {
        let raw = self
            .contract()
            .quantity(erc20)
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        Ok(Fix::from_raw(raw))
    }

    async fn status(&self) -> Result<CollateralStatus, LensError> {
        let ordinal = self
            .contract()
            .status()
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        status_from_ordinal(ordinal)
    }
}

#[async_trait]
impl PrimeBasketView for ChainBasketHandler {
    async fn prime_basket(&self) -> Result<Vec<PrimeBasketEntry>, LensError> {
        let prime = self
            .contract()
            .getPrimeBasket()
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)?;

        Ok(prime
            .erc20s
            .into_iter()
            .zip(prime.targetNames)
            .zip(prime.targetAmts)
            .map(|((erc20, target), amount)| PrimeBasketEntry {
                erc20,
                target_name: target_name_from_bytes32(target),
                target_amount: Fix::from_raw(amount),
            })
            .collect())
    }

    async fn backup_config(&self, target_name: &str) -> Result<BackupConfig, LensError> {
        let config = self
            .contract()
            .getBackupConfig(target_name_to_bytes32(target_name)?)
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)?;

        Ok(BackupConfig {
            erc20s: config.erc20s,
            max: to_u64(config.max, "backup config max")?,
        })
    }
}

struct ChainLedger {
    pinned: Pinned,
}

#[async_trait]
impl Erc20Ledger for ChainLedger {
    async fn balance_of(&self, erc20: Address, account: Address) -> Result<U256, LensError> {
        IERC20::new(erc20, self.pinned.provider.clone())
            .balanceOf(account)
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)
    }
}

struct ChainStakingReserve {
    pinned: Pinned,
    address: Address,
    rsr: Address,
    /// Present when the reserve exposes its draft queues.
    draft_era: Option<U256>,
}

#[async_trait]
impl StakingReserve for ChainStakingReserve {
    fn address(&self) -> Address {
        self.address
    }

    fn stake_token(&self) -> Address {
        self.rsr
    }

    async fn total_staked(&self) -> Result<U256, LensError> {
        IERC20::new(self.rsr, self.pinned.provider.clone())
            .balanceOf(self.address)
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)
    }
}

#[async_trait]
impl UnstakingQueue for ChainStakingReserve {
    async fn draft_queue(&self, account: Address) -> Result<DraftQueue, LensError> {
        let era = self
            .draft_era
            .ok_or_else(|| LensError::Unsupported("unstaking queue".to_string()))?;
        let Pinned { provider, block } = &self.pinned;
        let st_rsr = IStRSRP1::new(self.address, provider.clone());

        let first = st_rsr
            .firstRemainingDraft(era, account)
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        let len = st_rsr
            .draftQueueLen(era, account)
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        let draft_rate = st_rsr
            .draftRate()
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;

        let first = to_u64(first, "first remaining draft")?;
        let len = draft_queue_len(len)?;

        // Entries before the one preceding `first` are never read.
        let mut entries = Vec::new();
        for index in 0..len {
            if index + 1 < first {
                entries.push(DraftEntry {
                    cumulative_drafts: Fix::ZERO,
                    available_at: 0,
                });
                continue;
            }
            let draft = st_rsr
                .draftQueues(era, account, U256::from(index))
                .block(*block)
                .call()
                .await
                .map_err(LensError::collaborator)?;
            entries.push(DraftEntry {
                cumulative_drafts: Fix::from_raw(draft.drafts),
                available_at: draft.availableAt,
            });
        }

        Ok(DraftQueue {
            first_remaining: first,
            entries,
            draft_rate: Fix::from_raw(draft_rate),
        })
    }
}

struct ChainTrader {
    pinned: Pinned,
    address: Address,
    asset_registry: Address,
    token_to_buy: Option<Address>,
    write: WriteOptions,
}

impl ChainTrader {
    fn require_keeper(&self) -> Result<(), LensError> {
        if self.write.keeper {
            Ok(())
        } else {
            Err(LensError::Config(
                "KEEPER_PRIVATE_KEY is not set; trader actions are disabled".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Trader for ChainTrader {
    fn address(&self) -> Address {
        self.address
    }

    fn token_to_buy(&self) -> Option<Address> {
        self.token_to_buy
    }

    async fn min_trade_volume(&self) -> Result<Fix, LensError> {
        let raw = ITrading::new(self.address, self.pinned.provider.clone())
            .minTradeVolume()
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        Ok(Fix::from_raw(raw))
    }

    async fn open_trades(&self) -> Result<Vec<OpenTrade>, LensError> {
        let Pinned { provider, block } = &self.pinned;
        let trading = ITrading::new(self.address, provider.clone());

        let open = trading
            .tradesOpen()
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        if open.is_zero() {
            return Ok(Vec::new());
        }

        let erc20s = IAssetRegistry::new(self.asset_registry, provider.clone())
            .erc20s()
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;

        let mut trades = Vec::new();
        for erc20 in erc20s {
            let trade_address = trading
                .trades(erc20)
                .block(*block)
                .call()
                .await
                .map_err(LensError::collaborator)?;
            if trade_address == Address::ZERO {
                continue;
            }
            let trade = ITrade::new(trade_address, provider.clone());
            let buy = trade
                .buy()
                .block(*block)
                .call()
                .await
                .map_err(LensError::collaborator)?;
            let end_time = trade
                .endTime()
                .block(*block)
                .call()
                .await
                .map_err(LensError::collaborator)?;
            trades.push(OpenTrade {
                sell: erc20,
                buy,
                end_time: to_u64(end_time, "trade end time")?,
            });
        }
        Ok(trades)
    }

    async fn settle_trade(&self, sell: Address) -> Result<(), LensError> {
        self.require_keeper()?;
        let tx_hash = ITrading::new(self.address, self.pinned.provider.clone())
            .settleTrade(sell)
            .send()
            .await
            .map_err(LensError::collaborator)?
            .watch()
            .await
            .map_err(LensError::collaborator)?;

        tracing::info!(trader = %self.address, sell = %sell, tx = %tx_hash, "Settled trade");
        Ok(())
    }

    async fn start_trades(&self, erc20s: &[Address]) -> Result<(), LensError> {
        self.require_keeper()?;
        if self.token_to_buy.is_none() {
            return Err(LensError::Unsupported(
                "the backing manager starts trades through rebalancing".to_string(),
            ));
        }
        let kinds = vec![self.write.revenue_trade_kind.ordinal(); erc20s.len()];
        let tx_hash = IRevenueTrader::new(self.address, self.pinned.provider.clone())
            .manageTokens(erc20s.to_vec(), kinds)
            .send()
            .await
            .map_err(LensError::collaborator)?
            .watch()
            .await
            .map_err(LensError::collaborator)?;

        tracing::info!(
            trader = %self.address,
            count = erc20s.len(),
            kind = %self.write.revenue_trade_kind,
            tx = %tx_hash,
            "Started revenue trades"
        );
        Ok(())
    }
}

/// One RToken protocol instance as of one block.
pub struct ChainProtocol {
    main: Address,
    pinned: Pinned,
    block_number: u64,
    timestamp: u64,
    rtoken: ChainRToken,
    asset_registry: ChainAssetRegistry,
    basket_handler: ChainBasketHandler,
    ledger: ChainLedger,
    staking_reserve: ChainStakingReserve,
    backing_manager: ChainTrader,
    rtoken_trader: ChainTrader,
    rsr_trader: ChainTrader,
    prime_basket: bool,
}

impl ChainProtocol {
    /// Build a snapshot at `block_number`, probing optional capabilities.
    pub async fn load(
        provider: DynProvider,
        block_number: u64,
        timestamp: u64,
        components: ProtocolComponents,
        write: WriteOptions,
    ) -> Result<Self, LensError> {
        let pinned = Pinned {
            provider,
            block: BlockId::number(block_number),
        };
        let Pinned { provider, block } = &pinned;

        let rtoken_buys = IRevenueTrader::new(components.rtoken_trader, provider.clone())
            .tokenToBuy()
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        let rsr_buys = IRevenueTrader::new(components.rsr_trader, provider.clone())
            .tokenToBuy()
            .block(*block)
            .call()
            .await
            .map_err(LensError::collaborator)?;

        let prime_basket = IBasketHandler::new(components.basket_handler, provider.clone())
            .getPrimeBasket()
            .block(*block)
            .call()
            .await
            .is_ok();
        let draft_era = IStRSRP1::new(components.st_rsr, provider.clone())
            .getDraftEra()
            .block(*block)
            .call()
            .await
            .ok();

        tracing::debug!(
            rtoken = %components.rtoken,
            block = block_number,
            prime_basket,
            unstaking_queue = draft_era.is_some(),
            "Probed protocol capabilities"
        );

        let trader = |address: Address, token_to_buy: Option<Address>| ChainTrader {
            pinned: pinned.clone(),
            address,
            asset_registry: components.asset_registry,
            token_to_buy,
            write,
        };

        Ok(Self {
            main: components.main,
            block_number,
            timestamp,
            rtoken: ChainRToken {
                pinned: pinned.clone(),
                address: components.rtoken,
            },
            asset_registry: ChainAssetRegistry {
                pinned: pinned.clone(),
                address: components.asset_registry,
            },
            basket_handler: ChainBasketHandler {
                pinned: pinned.clone(),
                address: components.basket_handler,
            },
            ledger: ChainLedger {
                pinned: pinned.clone(),
            },
            staking_reserve: ChainStakingReserve {
                pinned: pinned.clone(),
                address: components.st_rsr,
                rsr: components.rsr,
                draft_era,
            },
            backing_manager: trader(components.backing_manager, None),
            rtoken_trader: trader(components.rtoken_trader, Some(rtoken_buys)),
            rsr_trader: trader(components.rsr_trader, Some(rsr_buys)),
            prime_basket,
            pinned,
        })
    }
}

#[async_trait]
impl Protocol for ChainProtocol {
    fn rtoken(&self) -> &dyn RToken {
        &self.rtoken
    }

    fn asset_registry(&self) -> &dyn AssetRegistry {
        &self.asset_registry
    }

    fn basket_handler(&self) -> &dyn BasketHandler {
        &self.basket_handler
    }

    fn ledger(&self) -> &dyn Erc20Ledger {
        &self.ledger
    }

    fn staking_reserve(&self) -> &dyn StakingReserve {
        &self.staking_reserve
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
        self.prime_basket
            .then_some(&self.basket_handler as &dyn PrimeBasketView)
    }

    fn unstaking_queue(&self) -> Option<&dyn UnstakingQueue> {
        self.staking_reserve
            .draft_era
            .map(|_| &self.staking_reserve as &dyn UnstakingQueue)
    }

    async fn trading_paused(&self) -> Result<bool, LensError> {
        IMain::new(self.main, self.pinned.provider.clone())
            .tradingPaused()
            .block(self.pinned.block)
            .call()
            .await
            .map_err(LensError::collaborator)
    }

    fn block_number(&self) -> u64 {
        self.block_number
    }

    fn timestamp(&self) -> u64 {
        self.timestamp
    }
}

fn status_from_ordinal(ordinal: u8) -> Result<CollateralStatus, LensError> {
    CollateralStatus::from_ordinal(ordinal).ok_or_else(|| {
        LensError::CollaboratorUnavailable(format!("unknown collateral status {ordinal}"))
    })
}

fn draft_queue_len(len: U256) -> Result<u64, LensError> {
    let len = to_u64(len, "draft queue length")?;
    if len > MAX_DRAFT_QUEUE_LEN {
        return Err(LensError::CollaboratorUnavailable(format!(
            "draft queue of {len} entries exceeds {MAX_DRAFT_QUEUE_LEN}"
        )));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_ordinal() {
        assert_eq!(status_from_ordinal(0).unwrap(), CollateralStatus::Sound);
        assert_eq!(status_from_ordinal(2).unwrap(), CollateralStatus::Disabled);
        assert!(matches!(
            status_from_ordinal(9),
            Err(LensError::CollaboratorUnavailable(_))
        ));
    }

    #[test]
    fn test_draft_queue_len_is_bounded() {
        assert_eq!(draft_queue_len(U256::from(3u64)).unwrap(), 3);
        assert_eq!(
            draft_queue_len(U256::from(MAX_DRAFT_QUEUE_LEN)).unwrap(),
            MAX_DRAFT_QUEUE_LEN
        );
        assert!(matches!(
            draft_queue_len(U256::from(u64::MAX)),
            Err(LensError::CollaboratorUnavailable(_))
        ));
        assert!(draft_queue_len(U256::MAX).is_err());
    }
}
