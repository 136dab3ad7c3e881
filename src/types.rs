use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Static token descriptor, as declared in the position registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Category tag attached to every resolved balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Farm,
    Lend,
    Borrow,
    LendRewards,
    Reward,
}

/// A tracked position: a contract holding value in other tokens on behalf of a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Filled in by the registry from the config section the position lives in.
    #[serde(default)]
    pub chain: String,
    pub address: Address,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
    /// Staking contract, when distinct from the position token.
    #[serde(default)]
    pub stake_address: Option<Address>,
    /// Pool contract, when distinct from the position token.
    #[serde(default)]
    pub pool_address: Option<Address>,
    /// Token whose total supply backs the share, when distinct from the position token.
    #[serde(default)]
    pub lp_token: Option<Address>,
    pub provider: String,
    #[serde(default)]
    pub underlyings: Vec<Token>,
    #[serde(default)]
    pub rewards: Vec<Token>,
}

impl Position {
    /// Contract the primary amount and rewards are read from
    pub fn stake_target(&self) -> Address {
        self.stake_address.unwrap_or(self.address)
    }
}

/// Represents a resolved balance, possibly composed of underlying balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub chain: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,
    pub amount: U256,
    pub category: Category,
    /// Debt positions only: true for stable rate, false for variable rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lp_token: Option<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub underlyings: Vec<Balance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rewards: Vec<Balance>,
}

impl Balance {
    pub fn new(chain: impl Into<String>, address: Address, category: Category) -> Self {
        Self {
            chain: chain.into(),
            address,
            symbol: None,
            decimals: None,
            amount: U256::ZERO,
            category,
            stable: None,
            parent: None,
            provider: None,
            stake_address: None,
            pool_address: None,
            lp_token: None,
            underlyings: Vec::new(),
            rewards: Vec::new(),
        }
    }

    /// Zero-amount balance for a declared token slot
    pub fn from_token(chain: &str, token: &Token, category: Category) -> Self {
        Self {
            symbol: Some(token.symbol.clone()),
            decimals: Some(token.decimals),
            ..Self::new(chain, token.address, category)
        }
    }

    /// Zero-amount balance carrying the position's identity and declared slots
    pub fn from_position(position: &Position, category: Category) -> Self {
        let chain = position.chain.as_str();
        Self {
            symbol: position.symbol.clone(),
            decimals: position.decimals,
            provider: Some(position.provider.clone()),
            stake_address: position.stake_address,
            pool_address: position.pool_address,
            lp_token: position.lp_token,
            underlyings: position
                .underlyings
                .iter()
                .map(|token| Balance::from_token(chain, token, category))
                .collect(),
            rewards: position
                .rewards
                .iter()
                .map(|token| Balance::from_token(chain, token, Category::Reward))
                .collect(),
            ..Self::new(chain, position.address, category)
        }
    }

    pub fn with_amount(mut self, amount: U256) -> Self {
        self.amount = amount;
        self
    }

    pub fn stake_target(&self) -> Address {
        self.stake_address.unwrap_or(self.address)
    }

    pub fn pool_target(&self) -> Address {
        self.pool_address.unwrap_or(self.address)
    }

    pub fn lp_target(&self) -> Address {
        self.lp_token.unwrap_or(self.address)
    }

    /// Amount formatted with the token's decimals, raw when decimals are unknown
    pub fn formatted(&self) -> String {
        match self.decimals {
            Some(decimals) => format_units(self.amount, decimals),
            None => self.amount.to_string(),
        }
    }
}

/// Format an amount with proper decimal places.
///
/// Falls back to the raw amount when `10^decimals` does not fit in 256 bits.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let Some(divisor) = U256::from(10u8).checked_pow(U256::from(decimals)) else {
        return amount.to_string();
    };
    let whole = amount / divisor;
    let fractional = amount % divisor;

    if fractional.is_zero() {
        format!("{}", whole)
    } else {
        let digits = fractional.to_string();
        let padding = "0".repeat(decimals as usize - digits.len());
        let frac_str = format!("{}{}", padding, digits);
        let trimmed = frac_str.trim_end_matches('0');
        format!("{}.{}", whole, trimmed)
    }
}
