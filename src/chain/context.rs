//! Per-cycle chain connection context.
//!
//! The keeper never holds a process-global provider: a [`ChainContextProvider`]
//! hands out a [`ChainContext`] at the start of a cycle and the context is
//! dropped (connection released) when the cycle ends, success or failure.

use super::{CallExecutor, ChainError};
use crate::config::ChainConfig;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::TransactionRequest;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Contract addresses the keeper reads from.
#[derive(Debug, Clone, Copy)]
pub struct ChainAddresses {
    /// LP NFT vault (whitelist, positions, deposits, hedge signals).
    pub vault: Address,
    /// Hedge execution manager (global hedge status).
    pub hedge_manager: Address,
    /// Multicall3 aggregation contract.
    pub multicall: Address,
}

impl ChainAddresses {
    /// Parse the three contract addresses out of the chain configuration.
    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        Ok(Self {
            vault: parse_address(&config.vault_address, "vault_address")?,
            hedge_manager: parse_address(&config.hedge_manager_address, "hedge_manager_address")?,
            multicall: parse_address(&config.multicall_address, "multicall_address")?,
        })
    }
}

fn parse_address(raw: &str, field: &str) -> Result<Address> {
    raw.parse::<Address>()
        .with_context(|| format!("invalid {field}: {raw}"))
}

/// Builds and releases chain contexts, one per keeper cycle.
pub struct ChainContextProvider {
    rpc_url: reqwest::Url,
    addresses: ChainAddresses,
}

impl ChainContextProvider {
    /// Create a provider from configuration. Fails fast on malformed
    /// endpoint URLs or contract addresses.
    pub fn new(config: &ChainConfig) -> Result<Self> {
        let rpc_url = config
            .rpc_url
            .parse::<reqwest::Url>()
            .with_context(|| format!("invalid rpc_url: {}", config.rpc_url))?;

        Ok(Self {
            rpc_url,
            addresses: ChainAddresses::from_config(config)?,
        })
    }

    /// Acquire a context for one cycle. Dropping the returned context
    /// releases the underlying connection.
    pub fn acquire(&self) -> ChainContext {
        debug!(rpc = %self.rpc_url, "acquiring chain context");
        ChainContext {
            provider: RootProvider::new_http(self.rpc_url.clone()),
            addresses: self.addresses,
        }
    }

    /// Addresses this provider was configured with.
    pub fn addresses(&self) -> ChainAddresses {
        self.addresses
    }
}

/// One cycle's connection handle plus the contract addresses.
///
/// All remote reads of a cycle share this single provider; components only
/// overlap wait time, they never open extra transports.
pub struct ChainContext {
    provider: RootProvider,
    addresses: ChainAddresses,
}

impl ChainContext {
    pub fn addresses(&self) -> ChainAddresses {
        self.addresses
    }
}

#[async_trait]
impl CallExecutor for ChainContext {
    async fn call(&self, target: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default()
            .with_to(target)
            .with_input(data);

        self.provider
            .call(tx)
            .await
            .map_err(|e| ChainError::CallFailed {
                target,
                reason: e.to_string(),
            })
    }
}
