use crate::utils::types::Chain;
use alloy_primitives::Address;
use thiserror::Error;

/// Errors raised by `ChainClient`, `BatchPlanner` and config loading.
///
/// `NoRoute` and `NotReady` are deliberately absent: per spec §4.6/§9 those
/// are terminal/self-healing outcomes of `PricingEngine::price`, modeled as
/// `PriceOutcome` variants rather than errors, so a caller can't mistake a
/// missing route for a transient provider failure.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("rate limited by provider {provider_index} on {chain}")]
    RateLimited { chain: Chain, provider_index: usize },

    #[error("transient network error on {chain} provider {provider_index}: {message}")]
    NetworkTransient {
        chain: Chain,
        provider_index: usize,
        message: String,
    },

    #[error("failed to decode pool {pool} on {chain}: {message}")]
    Decode {
        chain: Chain,
        pool: Address,
        message: String,
    },

    #[error("unknown chain id {0}")]
    UnknownChain(u64),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether this error should be retried by `ChainClient`'s backoff loop
    /// (spec §4.4/§7: rate-limit and transient network errors retry, all
    /// others propagate immediately).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::RateLimited { .. } | EngineError::NetworkTransient { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
