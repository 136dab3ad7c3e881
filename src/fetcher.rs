//! Primary amounts and rewards for staked positions.

use alloy::primitives::U256;
use alloy::sol;

use crate::chain::BalancesContext;
use crate::error::Result;
use crate::multicall::multicall;
use crate::types::{Balance, Category, Position};

sol! {
    interface IFarm {
        function lockedLiquidityOf(address account) external view returns (uint256);
        function earned(address account) external view returns (uint256[] memory new_earned);
    }
}

/// Read each position's locked amount and earned rewards in one pair of batched calls.
///
/// Returns one `farm` balance per position, in input order. Failed reads
/// resolve to zero.
pub async fn get_farm_balances(ctx: &BalancesContext, positions: &[Position]) -> Result<Vec<Balance>> {
    let account = ctx.address;
    let targets: Vec<_> = positions.iter().map(Position::stake_target).collect();

    let (locked, earned) = tokio::try_join!(
        multicall(
            ctx,
            targets
                .iter()
                .map(|target| (*target, IFarm::lockedLiquidityOfCall { account })),
        ),
        multicall(
            ctx,
            targets.iter().map(|target| (*target, IFarm::earnedCall { account })),
        ),
    )?;

    Ok(positions
        .iter()
        .zip(locked)
        .zip(earned)
        .map(|((position, locked), earned)| {
            let mut balance = Balance::from_position(position, Category::Farm)
                .with_amount(locked.map(|r| r._0).unwrap_or_default());
            let earned = earned.map(|r| r.new_earned).unwrap_or_default();
            assign_rewards(&mut balance.rewards, &earned);
            balance
        })
        .collect())
}

/// Match earned amounts to declared reward slots by position; slots past the
/// end of `earned` are zero.
pub(crate) fn assign_rewards(rewards: &mut [Balance], earned: &[U256]) {
    for (idx, reward) in rewards.iter_mut().enumerate() {
        reward.amount = earned.get(idx).copied().unwrap_or_default();
    }
}
