//! Supplied, borrowed and incentive balances on Aave-v2 style lending pools.

use alloy::primitives::{Address, U256};
use alloy::sol;
use futures::future::try_join_all;
use tracing::debug;

use crate::chain::BalancesContext;
use crate::config::LendingPool;
use crate::error::Result;
use crate::multicall::{multicall, CallResult};
use crate::providers::IERC20;
use crate::types::{Balance, Category};

/// Upper bound on incentive-registered tokens read from a controller
const MAX_REGISTERED_TOKENS: usize = 256;

sol! {
    interface ILendingPool {
        struct ReserveConfigurationMap {
            uint256 data;
        }

        struct ReserveData {
            ReserveConfigurationMap configuration;
            uint128 liquidityIndex;
            uint128 variableBorrowIndex;
            uint128 currentLiquidityRate;
            uint128 currentVariableBorrowRate;
            uint128 currentStableBorrowRate;
            uint40 lastUpdateTimestamp;
            address aTokenAddress;
            address stableDebtTokenAddress;
            address variableDebtTokenAddress;
            address interestRateStrategyAddress;
            uint8 id;
        }

        function getReservesList() external view returns (address[] memory);
        function getReserveData(address asset) external view returns (ReserveData memory);
    }

    interface IChefIncentivesController {
        function poolLength() external view returns (uint256);
        function registeredTokens(uint256 index) external view returns (address);
        function claimableReward(address user, address[] calldata tokens) external view returns (uint256[] memory);
    }

    interface IIncentivizedToken {
        function UNDERLYING_ASSET_ADDRESS() external view returns (address);
    }
}

/// Position-tracking tokens of a reserve, from `getReserveData`
#[derive(Debug, Clone)]
struct DerivativeTokens {
    a_token: Address,
    stable_debt_token: Address,
    variable_debt_token: Address,
}

/// A listed reserve asset; `tokens` is `None` when its reserve data could not be read
#[derive(Debug, Clone)]
struct ReserveTokens {
    underlying: Address,
    symbol: Option<String>,
    decimals: Option<u8>,
    tokens: Option<DerivativeTokens>,
}

impl ReserveTokens {
    /// Balances are reported against the reserve asset, not the derivative token
    fn balance(&self, chain: &str, category: Category, amount: CallResult<U256>) -> Balance {
        Balance {
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            ..Balance::new(chain, self.underlying, category).with_amount(amount.unwrap_or_default())
        }
    }
}

async fn reserve_tokens(ctx: &BalancesContext, lending_pool: Address) -> Result<Vec<ReserveTokens>> {
    let reserves = multicall(ctx, [(lending_pool, ILendingPool::getReservesListCall {})])
        .await?
        .into_iter()
        .next()
        .and_then(CallResult::ok)
        .map(|r| r._0)
        .unwrap_or_default();

    let (data, symbols, decimals) = tokio::try_join!(
        multicall(
            ctx,
            reserves
                .iter()
                .map(|asset| (lending_pool, ILendingPool::getReserveDataCall { asset: *asset })),
        ),
        multicall(ctx, reserves.iter().map(|asset| (*asset, IERC20::symbolCall {}))),
        multicall(ctx, reserves.iter().map(|asset| (*asset, IERC20::decimalsCall {}))),
    )?;

    Ok(reserves
        .into_iter()
        .zip(data)
        .zip(symbols)
        .zip(decimals)
        .map(|(((underlying, data), symbol), decimals)| {
            let tokens = data.ok().map(|r| DerivativeTokens {
                a_token: r._0.aTokenAddress,
                stable_debt_token: r._0.stableDebtTokenAddress,
                variable_debt_token: r._0.variableDebtTokenAddress,
            });
            if tokens.is_none() {
                debug!(%underlying, "reserve data unavailable, reporting zero balances");
            }
            ReserveTokens {
                underlying,
                symbol: symbol.ok().map(|r| r._0),
                decimals: decimals.ok().map(|r| r._0),
                tokens,
            }
        })
        .collect())
}

/// Next balance from a batch issued only for reserves with known tokens
fn next_amount(
    results: &mut impl Iterator<Item = CallResult<IERC20::balanceOfReturn>>,
    readable: bool,
) -> CallResult<U256> {
    if !readable {
        return CallResult::Failure;
    }
    results
        .next()
        .map(|r| r.map(|r| r._0))
        .unwrap_or(CallResult::Failure)
}

async fn reserve_balances(ctx: &BalancesContext, pool: &LendingPool) -> Result<Vec<Balance>> {
    let reserves = reserve_tokens(ctx, pool.lending_pool).await?;
    let account = ctx.address;
    let readable_tokens = || reserves.iter().filter_map(|r| r.tokens.as_ref());

    // one entry per readable reserve in each batch, same order as `reserves`
    let (supplied, stable_debt, variable_debt) = tokio::try_join!(
        multicall(
            ctx,
            readable_tokens().map(|t| (t.a_token, IERC20::balanceOfCall { account })),
        ),
        multicall(
            ctx,
            readable_tokens().map(|t| (t.stable_debt_token, IERC20::balanceOfCall { account })),
        ),
        multicall(
            ctx,
            readable_tokens().map(|t| (t.variable_debt_token, IERC20::balanceOfCall { account })),
        ),
    )?;

    let chain = ctx.chain.as_str();
    let (mut supplied, mut stable_debt, mut variable_debt) =
        (supplied.into_iter(), stable_debt.into_iter(), variable_debt.into_iter());
    let mut balances = Vec::with_capacity(reserves.len() * 3);

    for reserve in &reserves {
        let readable = reserve.tokens.is_some();
        balances.push(reserve.balance(chain, Category::Lend, next_amount(&mut supplied, readable)));
        balances.push(Balance {
            stable: Some(true),
            ..reserve.balance(chain, Category::Borrow, next_amount(&mut stable_debt, readable))
        });
        balances.push(Balance {
            stable: Some(false),
            ..reserve.balance(chain, Category::Borrow, next_amount(&mut variable_debt, readable))
        });
    }

    Ok(balances)
}

/// One incentive-registered token: its underlying reserve asset and claimable amount
#[derive(Debug, Clone, PartialEq, Eq)]
struct Incentive {
    token: Address,
    underlying: Option<Address>,
    claimable: U256,
}

/// Pair each registered token with its underlying and claimable amount, by index.
/// A short claimable vector leaves the remaining tokens at zero.
fn incentives(
    registered: &[Address],
    underlyings: Vec<CallResult<IIncentivizedToken::UNDERLYING_ASSET_ADDRESSReturn>>,
    claimable: &[U256],
) -> Vec<Incentive> {
    registered
        .iter()
        .zip(underlyings)
        .enumerate()
        .map(|(idx, (token, underlying))| Incentive {
            token: *token,
            underlying: underlying.ok().map(|r| r._0),
            claimable: claimable.get(idx).copied().unwrap_or_default(),
        })
        .collect()
}

/// Sum of claimable incentives across every registered token, as one `lend-rewards` balance
async fn lending_rewards(ctx: &BalancesContext, pool: &LendingPool) -> Result<Balance> {
    let controller = pool.incentive_controller;

    let length = multicall(ctx, [(controller, IChefIncentivesController::poolLengthCall {})])
        .await?
        .into_iter()
        .next()
        .and_then(CallResult::ok)
        .map(|r| usize::try_from(r._0).unwrap_or(MAX_REGISTERED_TOKENS).min(MAX_REGISTERED_TOKENS))
        .unwrap_or(0);

    let registered: Vec<Address> = multicall(
        ctx,
        (0..length).map(|index| {
            (
                controller,
                IChefIncentivesController::registeredTokensCall {
                    index: U256::from(index),
                },
            )
        }),
    )
    .await?
    .into_iter()
    .filter_map(|r| r.ok().map(|r| r._0))
    .collect();

    let claimable_call = IChefIncentivesController::claimableRewardCall {
        user: ctx.address,
        tokens: registered.clone(),
    };
    let (claimable, underlyings) = tokio::try_join!(
        multicall(ctx, [(controller, claimable_call)]),
        multicall(
            ctx,
            registered
                .iter()
                .map(|token| (*token, IIncentivizedToken::UNDERLYING_ASSET_ADDRESSCall {})),
        ),
    )?;

    let claimable = claimable
        .into_iter()
        .next()
        .and_then(CallResult::ok)
        .map(|r| r._0)
        .unwrap_or_default();
    let total = claimable
        .iter()
        .fold(U256::ZERO, |total, amount| total.saturating_add(*amount));

    for incentive in incentives(&registered, underlyings, &claimable) {
        debug!(
            %controller,
            token = %incentive.token,
            underlying = ?incentive.underlying,
            claimable = %incentive.claimable,
            "lending incentive"
        );
    }
    debug!(%controller, registered = registered.len(), %total, "lending incentives");

    Ok(Balance {
        parent: Some(Category::Lend),
        ..Balance::from_token(&ctx.chain, &pool.reward_token, Category::LendRewards).with_amount(total)
    })
}

/// Supplied, stable-debt and variable-debt balances for every reserve of `pool`,
/// followed by one aggregate `lend-rewards` balance.
pub async fn get_lending_pool_balances(ctx: &BalancesContext, pool: &LendingPool) -> Result<Vec<Balance>> {
    let (mut balances, rewards) = tokio::try_join!(reserve_balances(ctx, pool), lending_rewards(ctx, pool))?;
    balances.push(rewards);
    Ok(balances)
}

/// Lending balances for every pool, resolved concurrently
pub async fn get_lending_balances(ctx: &BalancesContext, pools: &[LendingPool]) -> Result<Vec<Balance>> {
    let balances = try_join_all(pools.iter().map(|pool| get_lending_pool_balances(ctx, pool))).await?;
    Ok(balances.into_iter().flatten().collect())
}
