//! Provider-facing boundary (spec §4.5). `ChainClient` is the trait the
//! scheduler drives; production wiring plugs in a real RPC multicall
//! client, tests and the demo binary use `mock::MockChainClient`. Modeled
//! on the teacher's `sync::pool_sync` provider abstraction, generalized
//! from "sync one pool's reserves" to "batch-read arbitrary pool calls
//! against a chosen provider index with retry".

pub mod mock;

use crate::state_store::PoolState;
use crate::utils::error::{EngineError, Result};
use crate::utils::types::{Chain, DexKind};
use alloy_primitives::Address;
use async_trait::async_trait;

/// One pool read request as packed into a batch by `BatchPlanner`.
#[derive(Debug, Clone, Copy)]
pub struct PoolCallSpec {
    pub pool: Address,
    pub dex_kind: DexKind,
}

/// Result of reading a single pool, as returned inside a
/// `MulticallResponse`.
#[derive(Debug, Clone)]
pub struct PoolReadResult {
    pub pool: Address,
    pub outcome: std::result::Result<PoolState, String>,
}

/// Response to one batched multicall against one provider.
#[derive(Debug, Clone)]
pub struct MulticallResponse {
    pub block_number: u64,
    pub results: Vec<PoolReadResult>,
}

/// The chain-facing boundary the scheduler drives. Implementations own
/// provider selection/rotation internally; `provider_index` lets the
/// caller pin a batch to the provider `BatchPlanner` assigned it
/// (spec §4.3's round-robin assignment).
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn multicall(
        &self,
        chain: Chain,
        provider_index: usize,
        calls: &[PoolCallSpec],
    ) -> Result<MulticallResponse>;

    fn provider_count(&self, chain: Chain) -> usize;
}

/// Drive one `multicall` call through the exponential backoff schedule of
/// spec §4.5: up to `backoff_ms.len()` retries, sleeping `backoff_ms[i]`
/// before retry `i`, only for errors where `EngineError::is_retryable` is
/// true. A non-retryable error or final-attempt failure is returned as-is.
pub async fn multicall_with_retry(
    client: &dyn ChainClient,
    chain: Chain,
    provider_index: usize,
    calls: &[PoolCallSpec],
    backoff_ms: &[u64],
) -> Result<MulticallResponse> {
    let mut attempt = 0usize;
    loop {
        match client.multicall(chain, provider_index, calls).await {
            Ok(response) => return Ok(response),
            Err(err) if err.is_retryable() && attempt < backoff_ms.len() => {
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms[attempt])).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

pub(crate) fn unknown_chain_error(chain: Chain) -> EngineError {
    EngineError::UnknownChain(chain.chain_id())
}
