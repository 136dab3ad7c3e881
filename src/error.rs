use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to callers of the resolution API.
///
/// Individual call failures never show up here: they degrade to zero amounts
/// where they are consumed. Only configuration problems and whole-batch
/// transport failures are reported.
#[derive(Debug, Error)]
pub enum Error {
    #[error("chain '{0}' not found in configuration")]
    UnknownChain(String),

    #[error("unsupported chain type: {0}")]
    UnsupportedChain(String),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("resolution timed out after {0:?}")]
    Timeout(Duration),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
