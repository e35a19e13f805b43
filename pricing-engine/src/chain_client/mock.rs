//! In-memory `ChainClient` used by tests and the demo binary in place of
//! a real RPC multicall provider. Lets tests seed exact reserves/slot0
//! values and block numbers rather than depending on a live network.

use super::{unknown_chain_error, ChainClient, MulticallResponse, PoolCallSpec, PoolReadResult};
use crate::state_store::PoolState;
use crate::utils::error::{EngineError, Result};
use crate::utils::types::Chain;
use alloy_primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct MockChainClient {
    states: DashMap<(Chain, Address), PoolState>,
    block_numbers: DashMap<Chain, AtomicU64>,
    provider_counts: HashMap<Chain, usize>,
    /// When set, the next `multicall` for this chain fails with this
    /// error instead of returning seeded state — used to exercise the
    /// retry/backoff path deterministically.
    inject_failure: Mutex<HashMap<Chain, EngineError>>,
}

impl MockChainClient {
    pub fn new(provider_counts: HashMap<Chain, usize>) -> Self {
        Self {
            states: DashMap::new(),
            block_numbers: DashMap::new(),
            provider_counts,
            inject_failure: Mutex::new(HashMap::new()),
        }
    }

    pub fn seed(&self, chain: Chain, pool: Address, state: PoolState, block_number: u64) {
        self.states.insert((chain, pool), state);
        self.block_numbers
            .entry(chain)
            .or_insert_with(|| AtomicU64::new(block_number))
            .store(block_number, Ordering::SeqCst);
    }

    pub fn advance_block(&self, chain: Chain, block_number: u64) {
        self.block_numbers
            .entry(chain)
            .or_insert_with(|| AtomicU64::new(block_number))
            .store(block_number, Ordering::SeqCst);
    }

    pub fn inject_failure_once(&self, chain: Chain, error: EngineError) {
        self.inject_failure.lock().insert(chain, error);
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn multicall(
        &self,
        chain: Chain,
        provider_index: usize,
        calls: &[PoolCallSpec],
    ) -> Result<MulticallResponse> {
        if let Some(err) = self.inject_failure.lock().remove(&chain) {
            return Err(err);
        }

        if !self.provider_counts.contains_key(&chain) {
            return Err(unknown_chain_error(chain));
        }
        let provider_count = self.provider_counts[&chain];
        if provider_index >= provider_count {
            return Err(EngineError::InvalidInput(format!(
                "provider_index {provider_index} out of range ({provider_count} providers)"
            )));
        }

        let block_number = self
            .block_numbers
            .get(&chain)
            .map(|entry| entry.load(Ordering::SeqCst))
            .unwrap_or(0);

        let results = calls
            .iter()
            .map(|call| {
                let outcome = self
                    .states
                    .get(&(chain, call.pool))
                    .map(|entry| *entry)
                    .ok_or_else(|| "no seeded state for pool".to_string());
                PoolReadResult {
                    pool: call.pool,
                    outcome,
                }
            })
            .collect();

        Ok(MulticallResponse {
            block_number,
            results,
        })
    }

    fn provider_count(&self, chain: Chain) -> usize {
        self.provider_counts.get(&chain).copied().unwrap_or(0)
    }
}
