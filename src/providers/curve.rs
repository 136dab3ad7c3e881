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
    interface ICurvePool {
        function balances(uint256 i) external view returns (uint256);
    }
}

/// Stable-pool share: `pool.balances(i) * amount / lp.totalSupply()`.
///
/// Convex and StakeDAO deposit tokens are 1:1 wrappers of the Curve LP token,
/// so the same math applies once `lp_token` points at the Curve LP.
pub struct CurveProvider;

#[async_trait]
impl BalancesProvider for CurveProvider {
    async fn enrich(&self, ctx: &BalancesContext, mut balances: Vec<Balance>) -> Result<Vec<Balance>> {
        let coin_calls: Vec<_> = balances
            .iter()
            .flat_map(|b| {
                let pool = b.pool_target();
                (0..b.underlyings.len()).map(move |i| (pool, ICurvePool::balancesCall { i: U256::from(i) }))
            })
            .collect();

        let (pool_balances, supplies) = tokio::try_join!(
            multicall(ctx, coin_calls),
            multicall(
                ctx,
                balances.iter().map(|b| (b.lp_target(), IERC20::totalSupplyCall {})),
            ),
        )?;

        let mut pool_balances = pool_balances.into_iter();
        for (balance, supply) in balances.iter_mut().zip(supplies) {
            // drain this position's slice fully so later positions stay aligned
            let slice: Vec<Option<U256>> = pool_balances
                .by_ref()
                .take(balance.underlyings.len())
                .map(|res| res.ok().map(|r| r._0))
                .collect();
            let reserves: Option<Vec<U256>> = slice.into_iter().collect();

            let (Some(reserves), CallResult::Success(supply)) = (reserves, supply) else {
                debug!(pool = %balance.pool_target(), "pool balances or supply unavailable");
                continue;
            };
            apply_shares(balance, &reserves, supply._0);
        }

        Ok(balances)
    }
}
