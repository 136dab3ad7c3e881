//! In-memory call batcher for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;

use crate::chain::{BalancesContext, CallBatcher, RawCall, RawResult};
use crate::error::{Error, Result};
use crate::types::{Balance, Category, Token};

pub fn wallet() -> Address {
    Address::repeat_byte(0x77)
}

pub fn token(byte: u8, symbol: &str) -> Token {
    Token {
        address: Address::repeat_byte(byte),
        symbol: symbol.to_string(),
        decimals: 18,
    }
}

/// A `farm` balance as the primary fetcher would hand it to a provider
pub fn farm_balance(byte: u8, provider: &str, amount: u64, underlyings: &[Token]) -> Balance {
    let mut balance = Balance::new("ethereum", Address::repeat_byte(byte), Category::Farm)
        .with_amount(U256::from(amount));
    balance.provider = Some(provider.to_string());
    balance.underlyings = underlyings
        .iter()
        .map(|t| Balance::from_token("ethereum", t, Category::Farm))
        .collect();
    balance
}

/// Answers calls from canned ABI-encoded outputs keyed by (target, calldata).
/// Unknown calls fail the way a revert would.
#[derive(Default)]
pub struct MockBatcher {
    outputs: HashMap<(Address, Bytes), Bytes>,
    unreachable: bool,
    round_trips: AtomicUsize,
}

impl MockBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// A batcher whose transport is down
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with<C: SolCall>(mut self, target: Address, call: C, output: Vec<u8>) -> Self {
        self.outputs
            .insert((target, call.abi_encode().into()), output.into());
        self
    }

    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    pub fn context(self) -> BalancesContext {
        BalancesContext::new("ethereum", wallet(), Arc::new(self))
    }
}

#[async_trait]
impl CallBatcher for MockBatcher {
    async fn aggregate(&self, calls: Vec<RawCall>) -> Result<Vec<RawResult>> {
        if self.unreachable {
            return Err(Error::Transport("connection refused".to_string()));
        }
        self.round_trips.fetch_add(1, Ordering::SeqCst);

        Ok(calls
            .into_iter()
            .map(|call| match self.outputs.get(&(call.target, call.call_data)) {
                Some(output) => RawResult {
                    success: true,
                    return_data: output.clone(),
                },
                None => RawResult::failure(),
            })
            .collect())
    }
}
