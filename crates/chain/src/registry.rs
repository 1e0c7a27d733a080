//! Component address resolution.
//!
//! An RToken knows its `Main`, and `Main` knows every other component of the
//! protocol instance. Resolution happens at the snapshot's pinned block, so a
//! snapshot never mixes components from before and after an upgrade.

use std::collections::HashMap;
use std::fmt;

use alloy::rpc::types::BlockId;
use alloy::primitives::Address;
use alloy::providers::DynProvider;

use lens_common::error::LensError;

use crate::contracts::{IMain, IRToken};

/// A component reachable from `Main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    AssetRegistry,
    BasketHandler,
    BackingManager,
    RTokenTrader,
    RsrTrader,
    StRsr,
    Rsr,
}

impl Component {
    pub const ALL: [Component; 7] = [
        Component::AssetRegistry,
        Component::BasketHandler,
        Component::BackingManager,
        Component::RTokenTrader,
        Component::RsrTrader,
        Component::StRsr,
        Component::Rsr,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Component::AssetRegistry => "AssetRegistry",
            Component::BasketHandler => "BasketHandler",
            Component::BackingManager => "BackingManager",
            Component::RTokenTrader => "RTokenTrader",
            Component::RsrTrader => "RSRTrader",
            Component::StRsr => "StRSR",
            Component::Rsr => "RSR",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Addresses of one protocol instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolComponents {
    pub rtoken: Address,
    pub main: Address,
    pub asset_registry: Address,
    pub basket_handler: Address,
    pub backing_manager: Address,
    pub rtoken_trader: Address,
    pub rsr_trader: Address,
    pub st_rsr: Address,
    pub rsr: Address,
}

impl ProtocolComponents {
    /// Assemble from resolved addresses; every component must be present.
    pub fn from_resolved(
        rtoken: Address,
        main: Address,
        resolved: &HashMap<Component, Address>,
    ) -> Result<Self, LensError> {
        let get = |component: Component| {
            resolved.get(&component).copied().ok_or_else(|| {
                LensError::CollaboratorUnavailable(format!(
                    "{component} of RToken {rtoken} could not be resolved"
                ))
            })
        };

        Ok(Self {
            rtoken,
            main,
            asset_registry: get(Component::AssetRegistry)?,
            basket_handler: get(Component::BasketHandler)?,
            backing_manager: get(Component::BackingManager)?,
            rtoken_trader: get(Component::RTokenTrader)?,
            rsr_trader: get(Component::RsrTrader)?,
            st_rsr: get(Component::StRsr)?,
            rsr: get(Component::Rsr)?,
        })
    }
}

/// Resolves the components of one RToken.
pub struct ComponentRegistry {
    rtoken: Address,
}

impl ComponentRegistry {
    pub fn new(rtoken: Address) -> Self {
        Self { rtoken }
    }

    pub fn rtoken(&self) -> Address {
        self.rtoken
    }

    /// Resolve every component at `block`.
    ///
    /// Logs each component as it resolves and warns for any that come back
    /// empty; the snapshot fails if one is missing.
    pub async fn resolve_all(
        &self,
        provider: &DynProvider,
        block: BlockId,
    ) -> Result<ProtocolComponents, LensError> {
        let main = IRToken::new(self.rtoken, provider.clone())
            .main()
            .block(block)
            .call()
            .await
            .map_err(LensError::collaborator)?;
        if main == Address::ZERO {
            return Err(LensError::NotFound(format!(
                "{} is not an RToken",
                self.rtoken
            )));
        }

        let contract = IMain::new(main, provider.clone());
        let mut resolved = HashMap::new();

        for component in Component::ALL {
            let result = match component {
                Component::AssetRegistry => contract.assetRegistry().block(block).call().await,
                Component::BasketHandler => contract.basketHandler().block(block).call().await,
                Component::BackingManager => contract.backingManager().block(block).call().await,
                Component::RTokenTrader => contract.rTokenTrader().block(block).call().await,
                Component::RsrTrader => contract.rsrTrader().block(block).call().await,
                Component::StRsr => contract.stRSR().block(block).call().await,
                Component::Rsr => contract.rsr().block(block).call().await,
            };

            match result {
                Ok(address) if address == Address::ZERO => {
                    tracing::warn!(
                        component = %component,
                        main = %main,
                        "Component not set (returned zero address)"
                    );
                }
                Ok(address) => {
                    tracing::info!(
                        component = %component,
                        address = %address,
                        "Resolved component address"
                    );
                    resolved.insert(component, address);
                }
                Err(e) => {
                    tracing::warn!(
                        component = %component,
                        error = %e,
                        "Failed to resolve component address"
                    );
                }
            }
        }

        tracing::info!(
            rtoken = %self.rtoken,
            main = %main,
            resolved_count = resolved.len(),
            total_requested = Component::ALL.len(),
            "Component resolution complete"
        );

        ProtocolComponents::from_resolved(self.rtoken, main, &resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_resolved() -> HashMap<Component, Address> {
        Component::ALL
            .into_iter()
            .enumerate()
            .map(|(i, component)| (component, Address::repeat_byte(i as u8 + 1)))
            .collect()
    }

    #[test]
    fn test_component_names_are_unique() {
        let mut names: Vec<_> = Component::ALL.iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Component::ALL.len());
    }

    #[test]
    fn test_from_resolved_maps_every_component() {
        let rtoken = Address::repeat_byte(0xAA);
        let main = Address::repeat_byte(0xBB);
        let components = ProtocolComponents::from_resolved(rtoken, main, &all_resolved()).unwrap();

        assert_eq!(components.rtoken, rtoken);
        assert_eq!(components.main, main);
        assert_eq!(components.asset_registry, Address::repeat_byte(1));
        assert_eq!(components.rsr, Address::repeat_byte(7));
    }

    #[test]
    fn test_from_resolved_requires_every_component() {
        let mut resolved = all_resolved();
        resolved.remove(&Component::StRsr);

        let err = ProtocolComponents::from_resolved(Address::ZERO, Address::ZERO, &resolved)
            .unwrap_err();
        match err {
            LensError::CollaboratorUnavailable(msg) => assert!(msg.contains("StRSR")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_registry_keeps_rtoken() {
        let rtoken = Address::repeat_byte(0x42);
        assert_eq!(ComponentRegistry::new(rtoken).rtoken(), rtoken);
    }
}
