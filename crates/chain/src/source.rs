use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::primitives::Address;
use alloy::rpc::types::{BlockId, BlockNumberOrTag};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use lens_common::config::AppConfig;
use lens_common::error::LensError;
use lens_engine::collaborators::{Protocol, ProtocolSource};

use crate::registry::ComponentRegistry;
use crate::snapshot::{ChainProtocol, WriteOptions};

/// Produces chain snapshots pinned `lag` blocks behind the head.
pub struct ChainSource {
    provider: DynProvider,
    lag: u64,
    write: WriteOptions,
}

impl ChainSource {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let provider = match &config.keeper_private_key {
            Some(key) => {
                let signer: PrivateKeySigner = key
                    .parse()
                    .map_err(|e| anyhow::anyhow!("KEEPER_PRIVATE_KEY: {}", e))?;
                tracing::info!(keeper = %signer.address(), "Keeper wallet configured");
                ProviderBuilder::new()
                    .wallet(EthereumWallet::from(signer))
                    .connect_http(config.rpc_url.parse()?)
                    .erased()
            }
            None => ProviderBuilder::new().connect_http(config.rpc_url.parse()?).erased(),
        };

        tracing::info!(
            rpc_url = %config.rpc_url,
            snapshot_lag_blocks = config.snapshot_lag_blocks,
            "Chain source configured"
        );

        Ok(Self {
            provider,
            lag: config.snapshot_lag_blocks,
            write: WriteOptions {
                keeper: config.keeper_private_key.is_some(),
                revenue_trade_kind: config.revenue_trade_kind,
            },
        })
    }

    /// Block a snapshot taken now would pin.
    pub async fn pinned_block(&self) -> Result<u64, LensError> {
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(LensError::collaborator)?;
        Ok(head.saturating_sub(self.lag))
    }
}

#[async_trait]
impl ProtocolSource for ChainSource {
    async fn snapshot(&self, rtoken: Address) -> Result<Box<dyn Protocol>, LensError> {
        let number = self.pinned_block().await?;
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .await
            .map_err(LensError::collaborator)?
            .ok_or_else(|| {
                LensError::CollaboratorUnavailable(format!("block {number} not available"))
            })?;

        let components = ComponentRegistry::new(rtoken)
            .resolve_all(&self.provider, BlockId::number(number))
            .await?;
        let protocol = ChainProtocol::load(
            self.provider.clone(),
            number,
            block.header.timestamp,
            components,
            self.write,
        )
        .await?;

        tracing::debug!(%rtoken, block = number, "Pinned protocol snapshot");
        Ok(Box::new(protocol))
    }
}
