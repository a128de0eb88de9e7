//! Wallet session seam and the alloy-backed implementation
//!
//! The bridge only needs two contract calls on an agent contract: a read of
//! its counters and the `rebalance` write.

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use super::proposal::RebalanceArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result, YieldWarsError};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IBaseAgent {
        /// Counters recorded by the agent contract
        function getStats() external view returns (
            uint256 totalRebalances,
            uint8 currentPool,
            uint256 lifetimeProfit,
            uint256 threshold
        );

        /// Record a rebalance between the two contract pools
        function rebalance(uint256 poolAApy, uint256 poolBApy, uint256 expectedProfit) external;
    }
}

/// `getStats()` decoded into host integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainStats {
    pub total_rebalances: u64,
    pub current_pool_slot: u8,
    pub lifetime_profit: u64,
    pub threshold_bps: u64,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletSession: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn read_stats(&self, contract: &str) -> Result<OnChainStats>;

    /// Submit `rebalance` and wait for the receipt. Returns the transaction hash.
    async fn submit_rebalance(&self, contract: &str, args: RebalanceArgs) -> Result<String>;
}

/// Signs with a local private key and talks JSON-RPC over HTTP
pub struct AlloyWalletSession {
    signer: PrivateKeySigner,
    rpc_url: String,
}

impl AlloyWalletSession {
    pub fn new(private_key: &str, rpc_url: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| YieldWarsError::Chain(format!("Invalid private key: {}", e)))?;

        info!(address = %signer.address(), rpc = rpc_url, "wallet session ready");

        Ok(Self {
            signer,
            rpc_url: rpc_url.to_string(),
        })
    }

    /// `None` when no key is configured
    pub fn from_config(config: &BridgeConfig) -> Result<Option<Self>> {
        match config.private_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => Self::new(key, &config.rpc_url).map(Some),
            None => Ok(None),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

fn parse_contract(contract: &str) -> Result<Address> {
    contract
        .trim()
        .parse()
        .map_err(|e| YieldWarsError::Chain(format!("Invalid agent contract {}: {}", contract, e)))
}

fn u256_to_u64(value: U256, field: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| YieldWarsError::Chain(format!("{} does not fit u64: {}", field, value)))
}

#[async_trait]
impl WalletSession for AlloyWalletSession {
    fn is_connected(&self) -> bool {
        true
    }

    async fn read_stats(&self, contract: &str) -> Result<OnChainStats> {
        let rpc_url = self
            .rpc_url
            .parse()
            .map_err(|e| YieldWarsError::Chain(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().connect_http(rpc_url);
        let agent = IBaseAgent::new(parse_contract(contract)?, provider);

        let stats = agent
            .getStats()
            .call()
            .await
            .map_err(|e| YieldWarsError::Chain(format!("getStats failed: {}", e)))?;

        let decoded = OnChainStats {
            total_rebalances: u256_to_u64(stats.totalRebalances, "totalRebalances")?,
            current_pool_slot: stats.currentPool,
            lifetime_profit: u256_to_u64(stats.lifetimeProfit, "lifetimeProfit")?,
            threshold_bps: u256_to_u64(stats.threshold, "threshold")?,
        };
        debug!(contract, ?decoded, "read agent stats");
        Ok(decoded)
    }

    async fn submit_rebalance(&self, contract: &str, args: RebalanceArgs) -> Result<String> {
        let wallet = EthereumWallet::from(self.signer.clone());
        let rpc_url = self
            .rpc_url
            .parse()
            .map_err(|e| YieldWarsError::Chain(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(rpc_url);
        let agent = IBaseAgent::new(parse_contract(contract)?, provider);

        let pending = agent
            .rebalance(
                U256::from(args.pool_a_bps),
                U256::from(args.pool_b_bps),
                U256::from(args.profit_scaled),
            )
            .send()
            .await
            .map_err(|e| BridgeError::TransactionFailed(format!("submit: {}", e)))?;

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| BridgeError::TransactionFailed(format!("confirmation: {}", e)))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(BridgeError::TransactionFailed(format!("reverted in {}", tx_hash)).into());
        }

        info!(contract, tx = %tx_hash, "rebalance mined");
        Ok(tx_hash)
    }
}
