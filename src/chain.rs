use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;

use crate::error::Result;

/// A single encoded contract read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCall {
    pub target: Address,
    pub call_data: Bytes,
}

/// Outcome of a single read within a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResult {
    pub success: bool,
    pub return_data: Bytes,
}

impl RawResult {
    pub fn failure() -> Self {
        Self {
            success: false,
            return_data: Bytes::new(),
        }
    }
}

/// Trait for call batchers - implement this for each transport
#[async_trait]
pub trait CallBatcher: Send + Sync {
    /// Execute every call and return one result per call, in input order.
    ///
    /// Reverts and other per-call failures are reported in the returned
    /// results. `Err` means the batch as a whole never reached the chain.
    async fn aggregate(&self, calls: Vec<RawCall>) -> Result<Vec<RawResult>>;
}

/// Everything a resolution request needs: who, where, and how to read.
#[derive(Clone)]
pub struct BalancesContext {
    pub chain: String,
    pub address: Address,
    batcher: Arc<dyn CallBatcher>,
}

impl BalancesContext {
    pub fn new(chain: impl Into<String>, address: Address, batcher: Arc<dyn CallBatcher>) -> Self {
        Self {
            chain: chain.into(),
            address,
            batcher,
        }
    }

    pub fn batcher(&self) -> &dyn CallBatcher {
        self.batcher.as_ref()
    }
}

impl fmt::Debug for BalancesContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalancesContext")
            .field("chain", &self.chain)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
