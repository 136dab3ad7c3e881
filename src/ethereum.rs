use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::ProviderBuilder;
use alloy::sol;
use async_trait::async_trait;
use futures::future::try_join_all;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::chain::{CallBatcher, RawCall, RawResult};
use crate::config::ChainConfig;
use crate::error::{Error, Result};

// Multicall3 ABI for aggregate3
sol! {
    #[sol(rpc)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

/// Ethereum call batcher backed by Multicall3 over JSON-RPC
pub struct EthereumBatcher {
    rpc_url: String,
    multicall: Address,
    chunk_size: usize,
    permits: Arc<Semaphore>,
}

impl EthereumBatcher {
    pub fn from_config(config: &ChainConfig) -> Self {
        Self {
            rpc_url: config.rpc.clone(),
            multicall: config.multicall,
            chunk_size: config.batch.chunk_size.max(1),
            permits: Arc::new(Semaphore::new(config.batch.max_concurrent_requests.max(1))),
        }
    }

    async fn aggregate_chunk(&self, chunk: &[RawCall]) -> Result<Vec<RawResult>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let url = self
            .rpc_url
            .parse()
            .map_err(|_| Error::Config(format!("invalid rpc url '{}'", self.rpc_url)))?;
        let provider = ProviderBuilder::new().on_http(url);

        let calls: Vec<IMulticall3::Call3> = chunk
            .iter()
            .map(|call| IMulticall3::Call3 {
                target: call.target,
                allowFailure: true,
                callData: call.call_data.clone(),
            })
            .collect();

        let contract = IMulticall3::new(self.multicall, provider);
        let results = contract
            .aggregate3(calls)
            .call()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?
            .returnData;

        Ok(results
            .into_iter()
            .map(|result| RawResult {
                success: result.success,
                return_data: result.returnData,
            })
            .collect())
    }
}

#[async_trait]
impl CallBatcher for EthereumBatcher {
    async fn aggregate(&self, calls: Vec<RawCall>) -> Result<Vec<RawResult>> {
        debug!(
            calls = calls.len(),
            chunks = calls.len().div_ceil(self.chunk_size),
            "aggregate3"
        );

        let chunks = try_join_all(
            calls
                .chunks(self.chunk_size)
                .map(|chunk| self.aggregate_chunk(chunk)),
        )
        .await?;

        Ok(chunks.into_iter().flatten().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::BalancesContext;
    use crate::config::{Config, MULTICALL3};
    use crate::fetcher::get_farm_balances;
    use crate::registry::Registry;

    #[test]
    fn test_batcher_from_config() {
        let config = Config::load().unwrap();
        let ethereum = config.get_chain("ethereum").unwrap();
        let batcher = EthereumBatcher::from_config(ethereum);
        assert_eq!(batcher.multicall, MULTICALL3);
        assert!(batcher.chunk_size > 0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_mainnet_farm_balances() {
        let config = Config::load().unwrap();
        let ethereum = config.get_chain("ethereum").unwrap();
        let registry = Registry::from_config(&config);
        let positions = registry.positions("ethereum");

        let ctx = BalancesContext::new(
            "ethereum",
            "0x78697a9cfc48C1e9d1040172d51833EF78083b10".parse().unwrap(),
            Arc::new(EthereumBatcher::from_config(ethereum)),
        );

        let balances = get_farm_balances(&ctx, &positions).await.unwrap();
        assert_eq!(balances.len(), positions.len());
    }
}
