use alloy::primitives::U256;
use alloy::sol;
use async_trait::async_trait;
use tracing::debug;

use super::tick_math::amounts_for_ticks;
use super::BalancesProvider;
use crate::chain::BalancesContext;
use crate::error::Result;
use crate::multicall::{multicall, CallResult};
use crate::types::Balance;

sol! {
    interface IFraxUniV3Farm {
        struct LockedNFT {
            uint256 token_id;
            uint256 liquidity;
            uint256 start_timestamp;
            uint256 ending_timestamp;
            uint256 lock_multiplier;
            int24 tick_lower;
            int24 tick_upper;
        }

        function lockedNFTsOf(address account) external view returns (LockedNFT[] memory);
    }

    interface IUniswapV3Pool {
        function slot0() external view returns (
            uint160 sqrtPriceX96,
            int24 tick,
            uint16 observationIndex,
            uint16 observationCardinality,
            uint16 observationCardinalityNext,
            uint8 feeProtocol,
            bool unlocked
        );
    }
}

/// Concentrated-liquidity NFTs locked in a Frax Uniswap V3 farm.
///
/// Each locked NFT's liquidity and tick range are converted to token amounts
/// at the pool's current price and summed into the two underlying slots.
pub struct Uniswap3Provider;

fn locked_amounts(sqrt_price: U256, nft: &IFraxUniV3Farm::LockedNFT) -> Option<(U256, U256)> {
    let liquidity = u128::try_from(nft.liquidity).ok()?;
    let tick_lower = i32::try_from(nft.tick_lower).ok()?;
    let tick_upper = i32::try_from(nft.tick_upper).ok()?;
    amounts_for_ticks(sqrt_price, tick_lower, tick_upper, liquidity)
}

#[async_trait]
impl BalancesProvider for Uniswap3Provider {
    async fn enrich(&self, ctx: &BalancesContext, mut balances: Vec<Balance>) -> Result<Vec<Balance>> {
        let account = ctx.address;
        let (locked, slots) = tokio::try_join!(
            multicall(
                ctx,
                balances
                    .iter()
                    .map(|b| (b.stake_target(), IFraxUniV3Farm::lockedNFTsOfCall { account })),
            ),
            multicall(
                ctx,
                balances.iter().map(|b| (b.pool_target(), IUniswapV3Pool::slot0Call {})),
            ),
        )?;

        for ((balance, locked), slot0) in balances.iter_mut().zip(locked).zip(slots) {
            let (CallResult::Success(locked), CallResult::Success(slot0)) = (locked, slot0) else {
                debug!(farm = %balance.stake_target(), "locked NFTs or pool price unavailable");
                continue;
            };
            let [underlying0, underlying1, ..] = balance.underlyings.as_mut_slice() else {
                continue;
            };

            let sqrt_price = U256::from(slot0.sqrtPriceX96);
            let (mut total0, mut total1) = (U256::ZERO, U256::ZERO);
            for nft in &locked._0 {
                match locked_amounts(sqrt_price, nft) {
                    Some((amount0, amount1)) => {
                        total0 = total0.saturating_add(amount0);
                        total1 = total1.saturating_add(amount1);
                    }
                    None => debug!(token_id = %nft.token_id, "unusable locked NFT"),
                }
            }

            underlying0.amount = total0;
            underlying1.amount = total1;
        }

        Ok(balances)
    }
}

#[cfg(test)]
pub(super) mod tests {
    use alloy::primitives::{Address, I256};
    use alloy::sol_types::SolValue;

    use super::*;
    use crate::providers::tick_math::sqrt_ratio_at_tick;
    use crate::testing::{farm_balance, token, wallet, MockBatcher};

    type Word = U256;

    /// `slot0()` output for a given price; ticks and flags are irrelevant here
    pub(in crate::providers) fn slot0_output(sqrt_price: U256) -> Vec<u8> {
        (sqrt_price, Word::ZERO, Word::ZERO, Word::ZERO, Word::ZERO, Word::ZERO, true).abi_encode_params()
    }

    /// Ticks are encoded as sign-extended words, the way `int24` travels in the ABI
    fn locked_nft(token_id: u64, liquidity: u128, lower: i32, upper: i32) -> (Word, Word, Word, Word, Word, I256, I256) {
        (
            U256::from(token_id),
            U256::from(liquidity),
            Word::ZERO,
            Word::ZERO,
            Word::ZERO,
            I256::try_from(lower).unwrap(),
            I256::try_from(upper).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_locked_nfts_are_summed() {
        let underlyings = [token(0xa1, "FRAX"), token(0xa3, "USDC")];
        let mut balance = farm_balance(1, "uniswap3", 0, &underlyings);
        let farm = Address::repeat_byte(0x30);
        let pool = Address::repeat_byte(0x31);
        balance.stake_address = Some(farm);
        balance.pool_address = Some(pool);

        let price = sqrt_ratio_at_tick(300).unwrap();
        let liquidity = 5_000_000_000_000u128;
        let nfts = vec![locked_nft(1, liquidity, 0, 600), locked_nft(2, liquidity, 0, 600)];

        let ctx = MockBatcher::new()
            .with(farm, IFraxUniV3Farm::lockedNFTsOfCall { account: wallet() }, nfts.abi_encode())
            .with(pool, IUniswapV3Pool::slot0Call {}, slot0_output(price))
            .context();

        let balances = Uniswap3Provider.enrich(&ctx, vec![balance]).await.unwrap();
        let (amount0, amount1) = amounts_for_ticks(price, 0, 600, liquidity).unwrap();
        assert!(amount0 > U256::ZERO && amount1 > U256::ZERO);
        assert_eq!(balances[0].underlyings[0].amount, amount0 * U256::from(2));
        assert_eq!(balances[0].underlyings[1].amount, amount1 * U256::from(2));
    }

    #[tokio::test]
    async fn test_range_below_zero_tick() {
        let underlyings = [token(0xa1, "FRAX"), token(0xa3, "USDC")];
        let mut balance = farm_balance(1, "uniswap3", 0, &underlyings);
        let farm = Address::repeat_byte(0x30);
        let pool = Address::repeat_byte(0x31);
        balance.stake_address = Some(farm);
        balance.pool_address = Some(pool);

        let price = sqrt_ratio_at_tick(-300).unwrap();
        let liquidity = 5_000_000_000_000u128;
        let nfts = vec![locked_nft(1, liquidity, -600, 600), locked_nft(2, liquidity, -900, -600)];

        let ctx = MockBatcher::new()
            .with(farm, IFraxUniV3Farm::lockedNFTsOfCall { account: wallet() }, nfts.abi_encode())
            .with(pool, IUniswapV3Pool::slot0Call {}, slot0_output(price))
            .context();

        let balances = Uniswap3Provider.enrich(&ctx, vec![balance]).await.unwrap();
        let (straddle0, straddle1) = amounts_for_ticks(price, -600, 600, liquidity).unwrap();
        let (below0, below1) = amounts_for_ticks(price, -900, -600, liquidity).unwrap();

        // the second range sits entirely under the price, so it is all token1
        assert!(below0.is_zero() && below1 > U256::ZERO);
        assert!(straddle0 > U256::ZERO && straddle1 > U256::ZERO);
        assert_eq!(balances[0].underlyings[0].amount, straddle0 + below0);
        assert_eq!(balances[0].underlyings[1].amount, straddle1 + below1);
    }

    #[tokio::test]
    async fn test_missing_pool_price_skips() {
        let underlyings = [token(0xa1, "FRAX"), token(0xa3, "USDC")];
        let mut balance = farm_balance(1, "uniswap3", 0, &underlyings);
        balance.stake_address = Some(Address::repeat_byte(0x30));
        let nfts = vec![locked_nft(1, 1_000, 0, 600)];

        let ctx = MockBatcher::new()
            .with(
                Address::repeat_byte(0x30),
                IFraxUniV3Farm::lockedNFTsOfCall { account: wallet() },
                nfts.abi_encode(),
            )
            .context();

        let balances = Uniswap3Provider.enrich(&ctx, vec![balance.clone()]).await.unwrap();
        assert_eq!(balances[0], balance);
    }
}
