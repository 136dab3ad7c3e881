use alloy::primitives::U256;
use alloy::sol;
use async_trait::async_trait;
use tracing::debug;

use super::tick_math::amounts_for_ticks;
use super::uniswap3::IUniswapV3Pool;
use super::BalancesProvider;
use crate::chain::BalancesContext;
use crate::error::Result;
use crate::multicall::{multicall, CallResult};
use crate::types::{Balance, Category};

/// Upper bound on NFTs enumerated per wallet and position manager
const MAX_NFTS: usize = 100;

sol! {
    interface INonfungiblePositionManager {
        function balanceOf(address owner) external view returns (uint256);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
        function positions(uint256 tokenId) external view returns (
            uint96 nonce,
            address operator,
            address token0,
            address token1,
            uint24 fee,
            int24 tickLower,
            int24 tickUpper,
            uint128 liquidity,
            uint256 feeGrowthInside0LastX128,
            uint256 feeGrowthInside1LastX128,
            uint128 tokensOwed0,
            uint128 tokensOwed1
        );
    }
}

/// Uniswap V3 NFTs held directly by the wallet.
///
/// Enumerates the wallet's NFTs on the position manager, keeps those whose
/// token pair matches the declared underlyings, and sums their amounts at the
/// pool's current price. The position amount becomes the total liquidity and
/// uncollected fees are appended as rewards.
pub struct UniswapNftProvider;

#[derive(Default)]
struct Totals {
    liquidity: U256,
    amount0: U256,
    amount1: U256,
    fees0: U256,
    fees1: U256,
    matched: usize,
}

fn position_totals(
    balance: &Balance,
    sqrt_price: U256,
    positions: impl Iterator<Item = INonfungiblePositionManager::positionsReturn>,
) -> Totals {
    let mut totals = Totals::default();
    let (Some(underlying0), Some(underlying1)) = (balance.underlyings.first(), balance.underlyings.get(1)) else {
        return totals;
    };

    for position in positions {
        if position.token0 != underlying0.address || position.token1 != underlying1.address {
            continue;
        }
        let (Ok(lower), Ok(upper)) = (i32::try_from(position.tickLower), i32::try_from(position.tickUpper)) else {
            continue;
        };
        let Some((amount0, amount1)) = amounts_for_ticks(sqrt_price, lower, upper, position.liquidity) else {
            continue;
        };

        totals.liquidity = totals.liquidity.saturating_add(U256::from(position.liquidity));
        totals.amount0 = totals.amount0.saturating_add(amount0);
        totals.amount1 = totals.amount1.saturating_add(amount1);
        totals.fees0 = totals.fees0.saturating_add(U256::from(position.tokensOwed0));
        totals.fees1 = totals.fees1.saturating_add(U256::from(position.tokensOwed1));
        totals.matched += 1;
    }

    totals
}

#[async_trait]
impl BalancesProvider for UniswapNftProvider {
    async fn enrich(&self, ctx: &BalancesContext, mut balances: Vec<Balance>) -> Result<Vec<Balance>> {
        let owner = ctx.address;

        let counts: Vec<usize> = multicall(
            ctx,
            balances
                .iter()
                .map(|b| (b.address, INonfungiblePositionManager::balanceOfCall { owner })),
        )
        .await?
        .into_iter()
        .map(|res| {
            res.ok()
                .map(|r| usize::try_from(r._0).unwrap_or(MAX_NFTS).min(MAX_NFTS))
                .unwrap_or(0)
        })
        .collect();

        let index_calls: Vec<_> = balances
            .iter()
            .zip(&counts)
            .flat_map(|(b, count)| {
                let manager = b.address;
                (0..*count).map(move |index| {
                    (
                        manager,
                        INonfungiblePositionManager::tokenOfOwnerByIndexCall {
                            owner,
                            index: U256::from(index),
                        },
                    )
                })
            })
            .collect();
        let token_ids = multicall(ctx, index_calls).await?;

        // (manager, token id) per enumerated NFT; failed lookups keep their slot
        let managers = balances
            .iter()
            .zip(&counts)
            .flat_map(|(b, count)| std::iter::repeat(b.address).take(*count));
        let position_calls: Vec<_> = token_ids
            .iter()
            .zip(managers)
            .filter_map(|(id, manager)| {
                id.as_ref()
                    .ok()
                    .map(|id| (manager, INonfungiblePositionManager::positionsCall { tokenId: id._0 }))
            })
            .collect();

        let (positions, slots) = tokio::try_join!(
            multicall(ctx, position_calls),
            multicall(
                ctx,
                balances.iter().map(|b| (b.pool_target(), IUniswapV3Pool::slot0Call {})),
            ),
        )?;

        // re-spread decoded positions over the enumerated slots
        let mut positions = positions.into_iter();
        let mut per_slot = token_ids.iter().map(|id| {
            if id.is_success() {
                positions.next().and_then(CallResult::ok)
            } else {
                None
            }
        });

        for ((balance, count), slot0) in balances.iter_mut().zip(&counts).zip(slots) {
            let owned: Vec<_> = per_slot.by_ref().take(*count).flatten().collect();
            let CallResult::Success(slot0) = slot0 else {
                debug!(pool = %balance.pool_target(), "pool price unavailable");
                continue;
            };

            let totals = position_totals(balance, U256::from(slot0.sqrtPriceX96), owned.into_iter());
            if totals.matched == 0 {
                continue;
            }

            balance.amount = totals.liquidity;
            balance.underlyings[0].amount = totals.amount0;
            balance.underlyings[1].amount = totals.amount1;

            let fees = [(0, totals.fees0), (1, totals.fees1)].map(|(idx, amount)| Balance {
                category: Category::Reward,
                ..balance.underlyings[idx].clone().with_amount(amount)
            });
            balance.rewards.extend(fees);
        }

        Ok(balances)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, I256};
    use alloy::sol_types::SolValue;

    use super::*;
    use crate::providers::tick_math::sqrt_ratio_at_tick;
    use crate::providers::uniswap3::tests::slot0_output;
    use crate::testing::{farm_balance, token, wallet, MockBatcher};

    fn position_output(token0: Address, token1: Address, liquidity: u128, owed: (u128, u128)) -> Vec<u8> {
        (
            U256::ZERO,
            Address::ZERO,
            token0,
            token1,
            U256::from(500),
            I256::try_from(-600i32).unwrap(),
            I256::try_from(600i32).unwrap(),
            U256::from(liquidity),
            U256::ZERO,
            U256::ZERO,
            U256::from(owed.0),
            U256::from(owed.1),
        )
            .abi_encode_params()
    }

    fn index(i: u64) -> INonfungiblePositionManager::tokenOfOwnerByIndexCall {
        INonfungiblePositionManager::tokenOfOwnerByIndexCall {
            owner: wallet(),
            index: U256::from(i),
        }
    }

    fn position(id: u64) -> INonfungiblePositionManager::positionsCall {
        INonfungiblePositionManager::positionsCall { tokenId: U256::from(id) }
    }

    #[tokio::test]
    async fn test_matching_nfts_only() {
        let frax = token(0xa1, "FRAX");
        let usdc = token(0xa3, "USDC");
        let mut balance = farm_balance(0x40, "uniswapNFT", 0, &[frax.clone(), usdc.clone()]);
        let manager = balance.address;
        let pool = Address::repeat_byte(0x41);
        balance.pool_address = Some(pool);

        let price = sqrt_ratio_at_tick(300).unwrap();
        let liquidity = 1_000_000_000u128;

        let ctx = MockBatcher::new()
            .with(
                manager,
                INonfungiblePositionManager::balanceOfCall { owner: wallet() },
                U256::from(3).abi_encode(),
            )
            .with(manager, index(0), U256::from(11).abi_encode())
            .with(manager, index(2), U256::from(13).abi_encode())
            .with(manager, position(11), position_output(frax.address, usdc.address, liquidity, (7, 9)))
            .with(manager, position(13), position_output(usdc.address, frax.address, liquidity, (1, 1)))
            .with(pool, IUniswapV3Pool::slot0Call {}, slot0_output(price))
            .context();

        let balances = UniswapNftProvider.enrich(&ctx, vec![balance]).await.unwrap();
        let (amount0, amount1) = amounts_for_ticks(price, -600, 600, liquidity).unwrap();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].amount, U256::from(liquidity));
        assert_eq!(balances[0].underlyings[0].amount, amount0);
        assert_eq!(balances[0].underlyings[1].amount, amount1);

        let fees: Vec<(Address, U256)> = balances[0].rewards.iter().map(|r| (r.address, r.amount)).collect();
        assert_eq!(fees, vec![(frax.address, U256::from(7)), (usdc.address, U256::from(9))]);
        assert!(balances[0].rewards.iter().all(|r| r.category == Category::Reward));
    }

    #[tokio::test]
    async fn test_wallet_without_nfts_is_untouched() {
        let balance = farm_balance(0x40, "uniswapNFT", 0, &[token(0xa1, "FRAX"), token(0xa3, "USDC")]);
        let ctx = MockBatcher::new()
            .with(
                balance.address,
                INonfungiblePositionManager::balanceOfCall { owner: wallet() },
                U256::ZERO.abi_encode(),
            )
            .context();

        let balances = UniswapNftProvider.enrich(&ctx, vec![balance.clone()]).await.unwrap();
        assert_eq!(balances, vec![balance]);
    }
}
