//! Concentrated-liquidity math, following Uniswap V3's TickMath and LiquidityAmounts.

use alloy::primitives::U256;

use super::mul_div;

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

/// 2^96
pub const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);

// sqrt(1.0001^-(2^i)) as Q128.128, for bits 1..=19 of |tick|
const FACTORS: [(u32, u128); 19] = [
    (0x2, 0xfff97272373d413259a46990580e213a),
    (0x4, 0xfff2e50f5f656932ef12357cf3c7fdcc),
    (0x8, 0xffe5caca7e10e4e61c3624eaa0941cd0),
    (0x10, 0xffcb9843d60f6159c9db58835c926644),
    (0x20, 0xff973b41fa98c081472e6896dfb254c0),
    (0x40, 0xff2ea16466c96a3843ec78b326b52861),
    (0x80, 0xfe5dee046a99a2a811c461f1969c3053),
    (0x100, 0xfcbe86c7900a88aedcffc83b479aa3a4),
    (0x200, 0xf987a7253ac413176f2b074cf7815e54),
    (0x400, 0xf3392b0822b70005940c7a398e4b70f3),
    (0x800, 0xe7159475a2c29b7443b29c7fa6e889d9),
    (0x1000, 0xd097f3bdfd2022b8845ad8f792aa5825),
    (0x2000, 0xa9f746462d870fdf8a65dc1f90e061e5),
    (0x4000, 0x70d869a156d2a1b890bb3df62baf32f7),
    (0x8000, 0x31be135f97d08fd981231505542fcfa6),
    (0x10000, 0x9aa508b5b7a84e1c677de54f3e99bc9),
    (0x20000, 0x5d6af8dedb81196699c329225ee604),
    (0x40000, 0x2216e584f5fa1ea926041bedfe98),
    (0x80000, 0x48a170391f7dc42444e8fa2),
];

/// sqrt(1.0001^tick) as a Q64.96, or `None` outside `MIN_TICK..=MAX_TICK`.
pub fn sqrt_ratio_at_tick(tick: i32) -> Option<U256> {
    let abs_tick = tick.unsigned_abs();
    if abs_tick > MAX_TICK.unsigned_abs() {
        return None;
    }

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(0xfffcb933bd6fad37aa2d162d1a594001u128)
    } else {
        U256::from(1) << 128
    };
    for (bit, factor) in FACTORS {
        if abs_tick & bit != 0 {
            ratio = (ratio * U256::from(factor)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up
    let round_up = !(ratio & U256::from(u32::MAX)).is_zero();
    Some((ratio >> 32) + U256::from(round_up as u8))
}

fn amount0_for_liquidity(sqrt_a: U256, sqrt_b: U256, liquidity: u128) -> U256 {
    if sqrt_a.is_zero() {
        return U256::ZERO;
    }
    mul_div(U256::from(liquidity) << 96, sqrt_b - sqrt_a, sqrt_b)
        .map(|scaled| scaled / sqrt_a)
        .unwrap_or_default()
}

fn amount1_for_liquidity(sqrt_a: U256, sqrt_b: U256, liquidity: u128) -> U256 {
    mul_div(U256::from(liquidity), sqrt_b - sqrt_a, Q96).unwrap_or_default()
}

/// Token amounts held by `liquidity` over the range `[sqrt_a, sqrt_b]` at the
/// current price `sqrt_price`. All prices are Q64.96 square roots.
pub fn amounts_for_liquidity(sqrt_price: U256, sqrt_a: U256, sqrt_b: U256, liquidity: u128) -> (U256, U256) {
    let (sqrt_a, sqrt_b) = if sqrt_a > sqrt_b { (sqrt_b, sqrt_a) } else { (sqrt_a, sqrt_b) };

    if sqrt_price <= sqrt_a {
        (amount0_for_liquidity(sqrt_a, sqrt_b, liquidity), U256::ZERO)
    } else if sqrt_price < sqrt_b {
        (
            amount0_for_liquidity(sqrt_price, sqrt_b, liquidity),
            amount1_for_liquidity(sqrt_a, sqrt_price, liquidity),
        )
    } else {
        (U256::ZERO, amount1_for_liquidity(sqrt_a, sqrt_b, liquidity))
    }
}

/// Amounts for a position over `[tick_lower, tick_upper]`; `None` for invalid ticks.
pub fn amounts_for_ticks(sqrt_price: U256, tick_lower: i32, tick_upper: i32, liquidity: u128) -> Option<(U256, U256)> {
    let sqrt_a = sqrt_ratio_at_tick(tick_lower)?;
    let sqrt_b = sqrt_ratio_at_tick(tick_upper)?;
    Some(amounts_for_liquidity(sqrt_price, sqrt_a, sqrt_b, liquidity))
}
