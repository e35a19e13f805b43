//! Public façade (spec §4.7): callers register/release interest in a
//! token and read back its current price or engine-wide stats. Mirrors
//! the teacher's `api::handlers` thin-wrapper-over-core-engine shape —
//! HTTP handlers call straight into this, nothing chain- or
//! registry-specific leaks past it.

use crate::pool_set::PoolSet;
use crate::pricing::{PriceOutcome, PricingEngine};
use crate::registry::RegistryHandle;
use crate::scheduler::Scheduler;
use crate::utils::error::{EngineError, Result};
use crate::utils::types::{Chain, Tier};
use alloy_primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Per-tier breakdown of alive pools (spec §6 `byTier`).
#[derive(Debug, Clone, Copy, Default)]
pub struct TierCounts {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub alive_pools: usize,
    pub by_tier: TierCounts,
    pub pending_batch_size: usize,
    pub last_batch_ms: Option<u64>,
}

pub struct InterestApi {
    pool_set: Arc<PoolSet>,
    registries: Arc<DashMap<Chain, Arc<RegistryHandle>>>,
    pricing_engine: Arc<PricingEngine>,
    scheduler: Arc<Scheduler>,
    /// Tokens currently under active interest, so `release` can look up
    /// which pools to drop without the caller re-supplying them.
    touched_tokens: DashMap<(Chain, Address), u32>,
}

impl InterestApi {
    pub fn new(
        pool_set: Arc<PoolSet>,
        registries: Arc<DashMap<Chain, Arc<RegistryHandle>>>,
        pricing_engine: Arc<PricingEngine>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            pool_set,
            registries,
            pricing_engine,
            scheduler,
            touched_tokens: DashMap::new(),
        }
    }

    /// Register interest in `token`'s price, bumping the ref count of
    /// every pool reachable from it (spec §4.1/§4.7). Idempotent to call
    /// repeatedly; each call must be balanced by a `release`.
    pub fn touch(&self, chain: Chain, token: Address) -> Result<()> {
        let registry_handle = self
            .registries
            .get(&chain)
            .ok_or(EngineError::UnknownChain(chain.chain_id()))?;
        let registry = registry_handle.snapshot();

        for pool in registry.pools_for_token(token) {
            self.pool_set.touch((chain, pool));
        }
        *self.touched_tokens.entry((chain, token)).or_insert(0) += 1;
        Ok(())
    }

    /// Release interest previously registered with `touch`. Releasing a
    /// token with no outstanding interest is a no-op (spec §4.7 idempotent
    /// release, mirroring `PoolSet::release`'s own idempotence).
    pub fn release(&self, chain: Chain, token: Address) -> Result<()> {
        let registry_handle = self
            .registries
            .get(&chain)
            .ok_or(EngineError::UnknownChain(chain.chain_id()))?;
        let registry = registry_handle.snapshot();

        let mut should_remove = false;
        if let Some(mut count) = self.touched_tokens.get_mut(&(chain, token)) {
            if *count > 0 {
                *count -= 1;
                let now = now_ms();
                for pool in registry.pools_for_token(token) {
                    self.pool_set.release((chain, pool), now);
                }
            }
            should_remove = *count == 0;
        }
        if should_remove {
            self.touched_tokens.remove(&(chain, token));
        }
        Ok(())
    }

    pub fn price(&self, chain: Chain, token: Address) -> Result<PriceOutcome> {
        if !self.registries.contains_key(&chain) {
            return Err(EngineError::UnknownChain(chain.chain_id()));
        }
        Ok(self.pricing_engine.price_token(chain, token))
    }

    pub fn stats(&self) -> Stats {
        Stats {
            alive_pools: self.pool_set.alive_len(),
            by_tier: TierCounts {
                high: self.pool_set.alive_count_with_tier(Tier::High),
                normal: self.pool_set.alive_count_with_tier(Tier::Normal),
                low: self.pool_set.alive_count_with_tier(Tier::Low),
            },
            pending_batch_size: self.scheduler.pending_batch_size(),
            last_batch_ms: self.scheduler.last_batch_ms(),
        }
    }
}
