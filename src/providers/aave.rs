use alloy::sol;
use async_trait::async_trait;
use tracing::debug;

use super::BalancesProvider;
use crate::chain::BalancesContext;
use crate::error::Result;
use crate::multicall::{multicall, CallResult};
use crate::types::Balance;

sol! {
    interface IAToken {
        function UNDERLYING_ASSET_ADDRESS() external view returns (address);
    }
}

/// aTokens redeem 1:1 for their reserve asset.
///
/// The single underlying slot gets the position amount and the reserve
/// asset's address as reported by the aToken itself.
pub struct AaveProvider;

#[async_trait]
impl BalancesProvider for AaveProvider {
    async fn enrich(&self, ctx: &BalancesContext, mut balances: Vec<Balance>) -> Result<Vec<Balance>> {
        let assets = multicall(
            ctx,
            balances
                .iter()
                .map(|b| (b.address, IAToken::UNDERLYING_ASSET_ADDRESSCall {})),
        )
        .await?;

        for (balance, asset) in balances.iter_mut().zip(assets) {
            let (atoken, amount) = (balance.address, balance.amount);
            let (CallResult::Success(asset), Some(underlying)) = (asset, balance.underlyings.first_mut()) else {
                debug!(%atoken, "underlying asset unavailable");
                continue;
            };
            underlying.address = asset._0;
            underlying.amount = amount;
        }

        Ok(balances)
    }
}
