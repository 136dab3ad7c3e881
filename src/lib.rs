mod chain;
mod config;
mod error;
mod ethereum;
mod fetcher;
mod lending;
mod multicall;
pub mod providers;
mod registry;
mod resolver;
mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tracing::info;

pub use chain::{BalancesContext, CallBatcher, RawCall, RawResult};
pub use config::{BatchConfig, ChainConfig, Config, LendingPool, ProtocolContracts, MULTICALL3};
pub use error::{Error, Result};
pub use ethereum::EthereumBatcher;
pub use fetcher::get_farm_balances;
pub use lending::{get_lending_balances, get_lending_pool_balances};
pub use multicall::{multicall, CallResult};
pub use providers::{BalancesProvider, ProviderRegistry};
pub use registry::{group_by, group_by_provider, Registry};
pub use resolver::Resolver;
pub use types::{format_units, Balance, Category, Position, Token};

/// Narrows a [`get_balances_with_config`] request
#[derive(Debug, Clone, Default)]
pub struct BalanceQuery {
    /// Only resolve this protocol's positions and lending pools
    pub protocol: Option<String>,
    /// Abandon the whole request after this long
    pub timeout: Option<Duration>,
}

/// Get every tracked position balance for an address on a specific chain
pub async fn get_balances(chain_name: &str, address: &str) -> Result<Vec<Balance>> {
    let config = Config::load()?;
    get_balances_with_config(&config, chain_name, address, &BalanceQuery::default()).await
}

/// Like [`get_balances`], against an explicit configuration
pub async fn get_balances_with_config(
    config: &Config,
    chain_name: &str,
    address: &str,
    query: &BalanceQuery,
) -> Result<Vec<Balance>> {
    let chain_config = config
        .get_chain(chain_name)
        .ok_or_else(|| Error::UnknownChain(chain_name.to_string()))?;

    match chain_config.chain_type.as_str() {
        "evm" => {}
        other => return Err(Error::UnsupportedChain(other.to_string())),
    }

    let address: Address = address
        .parse()
        .map_err(|_| Error::InvalidAddress(address.to_string()))?;

    let batcher = Arc::new(EthereumBatcher::from_config(chain_config));
    let ctx = BalancesContext::new(chain_name, address, batcher);
    let registry = Registry::from_config(config);

    let (positions, pools) = match &query.protocol {
        Some(protocol) => (
            registry.protocol_positions(protocol, chain_name),
            registry.protocol_lending_pools(protocol, chain_name),
        ),
        None => (registry.positions(chain_name), registry.lending_pools(chain_name)),
    };
    info!(
        chain = chain_name,
        %address,
        positions = positions.len(),
        lending_pools = pools.len(),
        "resolving balances"
    );

    let resolution = resolve_all(&ctx, &positions, &pools);
    match query.timeout {
        Some(timeout) => tokio::time::timeout(timeout, resolution)
            .await
            .map_err(|_| Error::Timeout(timeout))?,
        None => resolution.await,
    }
}

async fn resolve_all(ctx: &BalancesContext, positions: &[Position], pools: &[LendingPool]) -> Result<Vec<Balance>> {
    let resolver = Resolver::default();
    let (mut balances, lending) = tokio::try_join!(
        resolver.resolve(ctx, positions),
        get_lending_balances(ctx, pools)
    )?;
    balances.extend(lending);
    Ok(balances)
}
