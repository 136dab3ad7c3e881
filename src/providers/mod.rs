//! Protocol-specific enrichment of raw position amounts into underlying amounts.

mod aave;
mod arrakis;
mod curve;
pub mod tick_math;
mod uniswap;
mod uniswap3;
mod uniswap_nft;

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::{U256, U512};
use alloy::sol;
use async_trait::async_trait;

pub use aave::AaveProvider;
pub use arrakis::ArrakisProvider;
pub use curve::CurveProvider;
pub use uniswap::UniswapProvider;
pub use uniswap3::Uniswap3Provider;
pub use uniswap_nft::UniswapNftProvider;

use crate::chain::BalancesContext;
use crate::error::Result;
use crate::types::Balance;

sol! {
    interface IERC20 {
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

/// Trait for balance providers - implement this for each protocol family
#[async_trait]
pub trait BalancesProvider: Send + Sync {
    /// Fill in underlying (and possibly reward) amounts for a batch of positions.
    ///
    /// Must return the same balances, in the same order. Positions whose
    /// reads fail are left as they came in.
    async fn enrich(&self, ctx: &BalancesContext, balances: Vec<Balance>) -> Result<Vec<Balance>>;
}

/// Lookup table from provider id to strategy.
///
/// Several ids may share one strategy.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn BalancesProvider>>,
}

impl ProviderRegistry {
    /// Empty table: every group passes through unresolved
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every strategy this crate ships, under the ids the registry uses
    pub fn builtin() -> Self {
        let uniswap: Arc<dyn BalancesProvider> = Arc::new(UniswapProvider);
        let curve: Arc<dyn BalancesProvider> = Arc::new(CurveProvider);

        Self::empty()
            .register("aave", Arc::new(AaveProvider))
            .register("arrakis", Arc::new(ArrakisProvider))
            .register("curve", curve.clone())
            .register("convex", curve.clone())
            .register("stakedao", curve)
            .register("uniswap", uniswap.clone())
            .register("uniswapBoosted", uniswap.clone())
            .register("fraxpool", uniswap)
            .register("uniswap3", Arc::new(Uniswap3Provider))
            .register("uniswapNFT", Arc::new(UniswapNftProvider))
    }

    pub fn register(mut self, id: impl Into<String>, provider: Arc<dyn BalancesProvider>) -> Self {
        self.providers.insert(id.into(), provider);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn BalancesProvider>> {
        self.providers.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

/// `reserve * amount / total_supply`, floored. `None` when the supply is zero
/// or the result does not fit.
pub(crate) fn share_of(reserve: U256, amount: U256, total_supply: U256) -> Option<U256> {
    mul_div(reserve, amount, total_supply)
}

/// `a * b / denominator`, floored, with a 512-bit intermediate product.
pub(crate) fn mul_div(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let quotient = U512::from(a) * U512::from(b) / U512::from(denominator);
    let limbs = quotient.as_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return None;
    }
    Some(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// Write `reserves[i] * amount / total_supply` into each underlying slot.
///
/// Leaves the balance untouched if any share cannot be computed or if fewer
/// reserves than underlyings are known.
pub(crate) fn apply_shares(balance: &mut Balance, reserves: &[U256], total_supply: U256) -> bool {
    if balance.underlyings.is_empty() || reserves.len() < balance.underlyings.len() {
        return false;
    }

    let amounts: Option<Vec<U256>> = reserves
        .iter()
        .take(balance.underlyings.len())
        .map(|reserve| share_of(*reserve, balance.amount, total_supply))
        .collect();

    let Some(amounts) = amounts else {
        return false;
    };
    for (underlying, amount) in balance.underlyings.iter_mut().zip(amounts) {
        underlying.amount = amount;
    }
    true
}
