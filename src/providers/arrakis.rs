use alloy::sol;
use async_trait::async_trait;
use tracing::debug;

use super::{apply_shares, BalancesProvider, IERC20};
use crate::chain::BalancesContext;
use crate::error::Result;
use crate::multicall::{multicall, CallResult};
use crate::types::Balance;

sol! {
    interface IArrakisVault {
        function getUnderlyingBalances() external view returns (uint256 amount0Current, uint256 amount1Current);
    }
}

/// Arrakis (G-UNI) vault share of the vault's current underlying balances.
pub struct ArrakisProvider;

#[async_trait]
impl BalancesProvider for ArrakisProvider {
    async fn enrich(&self, ctx: &BalancesContext, mut balances: Vec<Balance>) -> Result<Vec<Balance>> {
        let (underlyings, supplies) = tokio::try_join!(
            multicall(
                ctx,
                balances
                    .iter()
                    .map(|b| (b.lp_target(), IArrakisVault::getUnderlyingBalancesCall {})),
            ),
            multicall(
                ctx,
                balances.iter().map(|b| (b.lp_target(), IERC20::totalSupplyCall {})),
            ),
        )?;

        for ((balance, underlyings), supply) in balances.iter_mut().zip(underlyings).zip(supplies) {
            let (CallResult::Success(underlyings), CallResult::Success(supply)) = (underlyings, supply) else {
                debug!(vault = %balance.lp_target(), "underlying balances or supply unavailable");
                continue;
            };

            let reserves = [underlyings.amount0Current, underlyings.amount1Current];
            apply_shares(balance, &reserves, supply._0);
        }

        Ok(balances)
    }
}
