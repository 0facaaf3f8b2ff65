//! Configuration management for the hedge keeper.
//!
//! Loads settings from environment variables and config files.

use crate::keeper::MissingSignalPolicy;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Main application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Chain endpoint and contract addresses
    #[serde(default)]
    pub chain: ChainConfig,
    /// Cycle scheduling and batching parameters
    #[serde(default)]
    pub keeper: KeeperConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint URL
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// LP NFT vault contract address
    #[serde(default)]
    pub vault_address: String,
    /// Hedge execution manager contract address
    #[serde(default)]
    pub hedge_manager_address: String,
    /// Multicall3 aggregation contract address
    #[serde(default = "default_multicall_address")]
    pub multicall_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeeperConfig {
    /// Seconds between reconciliation cycles
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Whitelist page size for the vault scan
    #[serde(default = "default_whitelist_page_size")]
    pub whitelist_page_size: u64,
    /// Maximum sub-calls per aggregate round trip. The safe limit depends
    /// on the chain's call-size/gas caps, so it is configuration, not code.
    #[serde(default = "default_batch_chunk_size")]
    pub batch_chunk_size: usize,
    /// What to assume when a position's hedge signal cannot be read
    #[serde(default)]
    pub missing_signal_policy: MissingSignalPolicy,
}

// Default value functions
fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_multicall_address() -> String {
    // Canonical Multicall3 deployment address on most EVM chains.
    "0xcA11bde05977b3631167028862bE2a173976CA11".to_string()
}

fn default_poll_interval() -> u64 {
    60
}

fn default_whitelist_page_size() -> u64 {
    500
}

fn default_batch_chunk_size() -> usize {
    200
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("KEEPER"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.chain.rpc_url.is_empty(),
            "chain.rpc_url must not be empty"
        );

        anyhow::ensure!(
            self.keeper.poll_interval_secs > 0,
            "keeper.poll_interval_secs must be positive"
        );

        anyhow::ensure!(
            self.keeper.whitelist_page_size > 0,
            "keeper.whitelist_page_size must be positive"
        );

        anyhow::ensure!(
            self.keeper.batch_chunk_size > 0,
            "keeper.batch_chunk_size must be positive"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            keeper: KeeperConfig::default(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            vault_address: String::new(),
            hedge_manager_address: String::new(),
            multicall_address: default_multicall_address(),
        }
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            whitelist_page_size: default_whitelist_page_size(),
            batch_chunk_size: default_batch_chunk_size(),
            missing_signal_policy: MissingSignalPolicy::default(),
        }
    }
}
