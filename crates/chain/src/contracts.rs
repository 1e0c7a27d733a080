//! Solidity interfaces of the protocol contracts the facade reads.
//!
//! Only the functions we call are declared. `uint192`/`uint48` results are
//! declared as `uint256`: the ABI word is the same and the values land
//! directly in `U256`. Argument types stay exact so selectors match.

use alloy::primitives::{B256, U256};
use alloy::sol;

use lens_common::error::LensError;
use lens_common::fixed::Rounding;

sol! {
    #[sol(rpc)]
    interface IRToken {
        function main() external view returns (address);
        function totalSupply() external view returns (uint256);
        function basketsNeeded() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IMain {
        function assetRegistry() external view returns (address);
        function basketHandler() external view returns (address);
        function backingManager() external view returns (address);
        function rTokenTrader() external view returns (address);
        function rsrTrader() external view returns (address);
        function stRSR() external view returns (address);
        function rsr() external view returns (address);
        function tradingPaused() external view returns (bool);
    }

    #[sol(rpc)]
    interface IAssetRegistry {
        function erc20s() external view returns (address[] memory);
        function toAsset(address erc20) external view returns (address);
    }

    #[sol(rpc)]
    interface IAsset {
        /// `(0, FIX_MAX)` when the asset cannot be priced.
        function price() external view returns (uint256 low, uint256 high);
        function erc20Decimals() external view returns (uint8);
        function isCollateral() external view returns (bool);
    }

    #[sol(rpc)]
    interface ICollateral {
        function status() external view returns (uint8);
        function targetName() external view returns (bytes32);
    }

    #[sol(rpc)]
    interface IBasketHandler {
        function nonce() external view returns (uint256);
        function quote(uint192 amount, uint8 rounding)
            external
            view
            returns (address[] memory erc20s, uint256[] memory quantities);
        function quantity(address erc20) external view returns (uint256);
        function status() external view returns (uint8);
        function getPrimeBasket()
            external
            view
            returns (address[] memory erc20s, bytes32[] memory targetNames, uint256[] memory targetAmts);
        function getBackupConfig(bytes32 targetName)
            external
            view
            returns (address[] memory erc20s, uint256 max);
    }

    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }

    #[sol(rpc)]
    interface ITrading {
        function minTradeVolume() external view returns (uint256);
        function trades(address sell) external view returns (address);
        function tradesOpen() external view returns (uint256);
        function settleTrade(address sell) external returns (address);
    }

    #[sol(rpc)]
    interface IRevenueTrader {
        function tokenToBuy() external view returns (address);
        function manageTokens(address[] calldata erc20s, uint8[] calldata kinds) external;
    }

    #[sol(rpc)]
    interface ITrade {
        function sell() external view returns (address);
        function buy() external view returns (address);
        function endTime() external view returns (uint256);
    }

    #[sol(rpc)]
    interface IStRSRP1 {
        function getDraftEra() external view returns (uint256);
        function firstRemainingDraft(uint256 era, address account) external view returns (uint256);
        function draftQueueLen(uint256 era, address account) external view returns (uint256);
        function draftQueues(uint256 era, address account, uint256 index)
            external
            view
            returns (uint256 drafts, uint64 availableAt);
        function draftRate() external view returns (uint256);
    }
}

/// On-chain ordinal of a rounding mode.
pub fn rounding_ordinal(rounding: Rounding) -> u8 {
    match rounding {
        Rounding::Floor => 0,
        Rounding::Round => 1,
        Rounding::Ceil => 2,
    }
}

/// Decode a right-padded `bytes32` target name.
pub fn target_name_from_bytes32(raw: B256) -> String {
    let bytes = raw.as_slice();
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Encode a target name as a right-padded `bytes32`.
pub fn target_name_to_bytes32(name: &str) -> Result<B256, LensError> {
    let bytes = name.as_bytes();
    if bytes.len() > 32 {
        return Err(LensError::Validation(format!(
            "target name `{name}` is longer than 32 bytes"
        )));
    }
    let mut raw = [0u8; 32];
    raw[..bytes.len()].copy_from_slice(bytes);
    Ok(B256::from(raw))
}

/// Narrow an on-chain integer that the protocol stores in 64 bits or fewer.
pub fn to_u64(value: U256, what: &str) -> Result<u64, LensError> {
    u64::try_from(value)
        .map_err(|_| LensError::CollaboratorUnavailable(format!("{what} out of range: {value}")))
}

#[cfg(test)]
mod tests {
    use alloy::sol_types::SolCall;

    use super::*;

    #[test]
    fn test_target_name_round_trip() {
        let raw = target_name_to_bytes32("USD").unwrap();
        assert_eq!(&raw[..3], b"USD");
        assert!(raw[3..].iter().all(|b| *b == 0));
        assert_eq!(target_name_from_bytes32(raw), "USD");
    }

    #[test]
    fn test_target_name_too_long() {
        let name = "X".repeat(33);
        assert!(matches!(
            target_name_to_bytes32(&name),
            Err(LensError::Validation(_))
        ));
    }

    #[test]
    fn test_to_u64() {
        assert_eq!(to_u64(U256::from(42u64), "nonce").unwrap(), 42);
        assert!(to_u64(U256::MAX, "nonce").is_err());
    }

    #[test]
    fn test_selectors_use_exact_argument_types() {
        assert_eq!(IBasketHandler::quoteCall::SIGNATURE, "quote(uint192,uint8)");
        assert_eq!(
            IRevenueTrader::manageTokensCall::SIGNATURE,
            "manageTokens(address[],uint8[])"
        );
        assert_eq!(IERC20::balanceOfCall::SIGNATURE, "balanceOf(address)");
    }

    #[test]
    fn test_rounding_ordinals() {
        assert_eq!(rounding_ordinal(Rounding::Floor), 0);
        assert_eq!(rounding_ordinal(Rounding::Ceil), 2);
    }
}
