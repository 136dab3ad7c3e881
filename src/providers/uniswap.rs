use alloy::primitives::U256;
use alloy::sol;
use async_trait::async_trait;
use tracing::debug;

use super::{apply_shares, BalancesProvider, IERC20};
use crate::chain::BalancesContext;
use crate::error::Result;
use crate::multicall::{multicall, CallResult};
use crate::types::Balance;

sol! {
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

/// Constant-product pair share: `reserve[i] * amount / totalSupply`.
///
/// Covers Uniswap V2 and its forks (Fraxswap), staked or boosted.
pub struct UniswapProvider;

#[async_trait]
impl BalancesProvider for UniswapProvider {
    async fn enrich(&self, ctx: &BalancesContext, mut balances: Vec<Balance>) -> Result<Vec<Balance>> {
        let (reserves, supplies) = tokio::try_join!(
            multicall(
                ctx,
                balances
                    .iter()
                    .map(|b| (b.lp_target(), IUniswapV2Pair::getReservesCall {})),
            ),
            multicall(
                ctx,
                balances.iter().map(|b| (b.lp_target(), IERC20::totalSupplyCall {})),
            ),
        )?;

        for ((balance, reserves), supply) in balances.iter_mut().zip(reserves).zip(supplies) {
            let (CallResult::Success(reserves), CallResult::Success(supply)) = (reserves, supply) else {
                debug!(pair = %balance.lp_target(), "reserves or supply unavailable");
                continue;
            };

            let reserves = [U256::from(reserves.reserve0), U256::from(reserves.reserve1)];
            if !apply_shares(balance, &reserves, supply._0) {
                debug!(pair = %balance.lp_target(), "share not computable");
            }
        }

        Ok(balances)
    }
}
