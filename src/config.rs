use std::collections::HashMap;
use std::path::Path;

use alloy::primitives::{address, Address};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Position, Token};

/// Canonical Multicall3 deployment, identical on every EVM chain it exists on
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Configuration for all supported chains and tracked protocols
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub chains: HashMap<String, ChainConfig>,
    /// protocol id -> chain name -> tracked contracts
    #[serde(default)]
    pub protocols: HashMap<String, HashMap<String, ProtocolContracts>>,
}

/// Configuration for a single chain
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    #[serde(rename = "type")]
    pub chain_type: String,
    pub name: String,
    pub rpc: String,
    #[serde(rename = "chainId", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default = "default_multicall")]
    pub multicall: Address,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Transport limits for the call batcher
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfig {
    pub chunk_size: usize,
    pub max_concurrent_requests: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

/// Contracts a protocol exposes on one chain
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolContracts {
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub lending_pools: Vec<LendingPool>,
}

/// An Aave-v2 style lending pool with a chef-style incentives controller
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingPool {
    pub lending_pool: Address,
    pub incentive_controller: Address,
    pub reward_token: Token,
}

fn default_multicall() -> Address {
    MULTICALL3
}

impl Config {
    /// Load configuration from embedded JSON
    pub fn load() -> Result<Self> {
        let config_str = include_str!("../config.json");
        let config: Config = serde_json::from_str(config_str)?;
        Ok(config)
    }

    /// Load configuration from a file on disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Get a specific chain configuration
    pub fn get_chain(&self, chain_name: &str) -> Option<&ChainConfig> {
        self.chains.get(chain_name)
    }
}
