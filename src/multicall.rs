//! Typed batched reads on top of a [`CallBatcher`](crate::chain::CallBatcher).

use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use tracing::debug;

use crate::chain::{BalancesContext, RawCall};
use crate::error::Result;

/// Decoded outcome of one call in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallResult<T> {
    Success(T),
    Failure,
}

impl<T> CallResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, CallResult::Success(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            CallResult::Success(value) => Some(value),
            CallResult::Failure => None,
        }
    }

    pub fn as_ref(&self) -> CallResult<&T> {
        match self {
            CallResult::Success(value) => CallResult::Success(value),
            CallResult::Failure => CallResult::Failure,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallResult<U> {
        match self {
            CallResult::Success(value) => CallResult::Success(f(value)),
            CallResult::Failure => CallResult::Failure,
        }
    }
}

impl<T: Default> CallResult<T> {
    /// The decoded value, or the type's zero value when the call failed
    pub fn unwrap_or_default(self) -> T {
        self.ok().unwrap_or_default()
    }
}

/// Issue one batched round trip for `calls` and decode each output as `C`'s return type.
///
/// The returned vector always has one entry per input call, in order. Outputs
/// that fail to decode are reported as [`CallResult::Failure`].
pub async fn multicall<C, I>(ctx: &BalancesContext, calls: I) -> Result<Vec<CallResult<C::Return>>>
where
    C: SolCall,
    I: IntoIterator<Item = (Address, C)>,
{
    let raw: Vec<RawCall> = calls
        .into_iter()
        .map(|(target, call)| RawCall {
            target,
            call_data: call.abi_encode().into(),
        })
        .collect();

    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let expected = raw.len();
    debug!(signature = C::SIGNATURE, calls = expected, "multicall");

    let results = ctx.batcher().aggregate(raw).await?;
    if results.len() != expected {
        debug!(
            signature = C::SIGNATURE,
            expected,
            received = results.len(),
            "batch length mismatch, padding with failures"
        );
    }

    let mut decoded: Vec<CallResult<C::Return>> = results
        .into_iter()
        .take(expected)
        .map(|result| {
            if !result.success {
                return CallResult::Failure;
            }
            match C::abi_decode_returns(&result.return_data, true) {
                Ok(value) => CallResult::Success(value),
                Err(err) => {
                    debug!(signature = C::SIGNATURE, %err, "undecodable output");
                    CallResult::Failure
                }
            }
        })
        .collect();
    decoded.resize_with(expected, || CallResult::Failure);

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alloy::primitives::U256;
    use alloy::sol;
    use alloy::sol_types::SolValue;

    use super::*;
    use crate::testing::{wallet, MockBatcher};

    sol! {
        #[derive(Debug)]
        interface IToken {
            function totalSupply() external view returns (uint256);
        }
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let a = Address::repeat_byte(0xa);
        let b = Address::repeat_byte(0xb);
        let c = Address::repeat_byte(0xc);
        let batcher = MockBatcher::new()
            .with(a, IToken::totalSupplyCall {}, U256::from(1).abi_encode())
            .with(c, IToken::totalSupplyCall {}, U256::from(3).abi_encode());
        let ctx = batcher.context();

        let results = multicall(&ctx, [a, b, c].map(|t| (t, IToken::totalSupplyCall {})))
            .await
            .unwrap();

        let supplies: Vec<Option<U256>> = results.into_iter().map(|r| r.ok().map(|r| r._0)).collect();
        assert_eq!(supplies, vec![Some(U256::from(1)), None, Some(U256::from(3))]);
    }

    #[tokio::test]
    async fn test_malformed_output_is_a_failure() {
        let a = Address::repeat_byte(0xa);
        let batcher = MockBatcher::new().with(a, IToken::totalSupplyCall {}, vec![0x01, 0x02]);
        let ctx = batcher.context();

        let results = multicall(&ctx, [(a, IToken::totalSupplyCall {})]).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].is_success());
    }

    #[tokio::test]
    async fn test_empty_batch_skips_round_trip() {
        let batcher = Arc::new(MockBatcher::new());
        let ctx = BalancesContext::new("ethereum", wallet(), batcher.clone());

        let results = multicall(&ctx, Vec::<(Address, IToken::totalSupplyCall)>::new())
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(batcher.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_surfaces() {
        let ctx = MockBatcher::unreachable().context();
        let result = multicall(&ctx, [(Address::ZERO, IToken::totalSupplyCall {})]).await;
        tokio_test::assert_err!(result);
    }
}
