//! Background refresh driver (spec §4.4). One coalescing loop per chain:
//! due pools accumulate for up to `collection_window_ms`, or until
//! `flush_threshold` pools are pending, whichever comes first, then get
//! packed into batches and dispatched through `ChainClient`.
//!
//! Mirrors the teacher's `sync::pool_sync` background-task shape (one
//! `tokio::spawn`ed loop per chain, stop via a shared flag) generalized
//! from "poll reserves on an interval" to "coalesce due pools, then
//! flush".

use crate::batch::BatchPlanner;
use crate::chain_client::{multicall_with_retry, ChainClient};
use crate::config::EngineSettings;
use crate::pool_set::PoolSet;
use crate::pricing::PricingEngine;
use crate::registry::RegistryHandle;
use crate::state_store::StateStore;
use crate::utils::types::{Chain, PoolKey, Tier};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// Lifecycle state of the scheduler as a whole (spec §4.4). Transitions:
/// `Stopped -> Running` on `start`, `Running -> Stopping -> Stopped` on
/// `stop` — `stop` waits for each chain loop to observe `Stopping` and
/// exit before returning, so callers never race a half-torn-down
/// scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Stopping,
}

/// Per-chain coalescing phase, surfaced for observability/tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescePhase {
    Idle,
    Collecting,
    Flushing,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

const TICK_MS: u64 = 20;

pub struct Scheduler {
    state: AtomicU8,
    state_store: Arc<StateStore>,
    pool_set: Arc<PoolSet>,
    registries: Arc<DashMap<Chain, Arc<RegistryHandle>>>,
    chain_client: Arc<dyn ChainClient>,
    batch_planner: Arc<BatchPlanner>,
    pricing_engine: Arc<PricingEngine>,
    settings: EngineSettings,
    handles: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    phases: DashMap<Chain, CoalescePhase>,
    /// Size of the currently-collecting (or most recently flushed) batch
    /// per chain, surfaced for `InterestApi::stats` (spec §6
    /// `pendingBatchSize`).
    pending_sizes: DashMap<Chain, usize>,
    /// Wall-clock time the most recent flush completed, per chain
    /// (spec §6 `lastBatchMs`).
    last_batch_ms: DashMap<Chain, u64>,
}

const STATE_STOPPED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPING: u8 = 2;

impl Scheduler {
    pub fn new(
        state_store: Arc<StateStore>,
        pool_set: Arc<PoolSet>,
        registries: Arc<DashMap<Chain, Arc<RegistryHandle>>>,
        chain_client: Arc<dyn ChainClient>,
        pricing_engine: Arc<PricingEngine>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            state: AtomicU8::new(STATE_STOPPED),
            state_store,
            pool_set,
            registries,
            chain_client,
            batch_planner: Arc::new(BatchPlanner::new(settings.max_weight_per_batch)),
            pricing_engine,
            settings,
            handles: parking_lot::Mutex::new(Vec::new()),
            phases: DashMap::new(),
            pending_sizes: DashMap::new(),
            last_batch_ms: DashMap::new(),
        }
    }

    /// Sum of pools currently pending flush across all chains.
    pub fn pending_batch_size(&self) -> usize {
        self.pending_sizes.iter().map(|entry| *entry.value()).sum()
    }

    /// Most recent flush-completion time across all chains, `None` if no
    /// chain has flushed yet.
    pub fn last_batch_ms(&self) -> Option<u64> {
        self.last_batch_ms.iter().map(|entry| *entry.value()).max()
    }

    pub fn state(&self) -> SchedulerState {
        match self.state.load(Ordering::SeqCst) {
            STATE_RUNNING => SchedulerState::Running,
            STATE_STOPPING => SchedulerState::Stopping,
            _ => SchedulerState::Stopped,
        }
    }

    /// Current coalescing phase for one chain's loop, `Idle` if the
    /// scheduler hasn't started or that chain has no loop.
    pub fn phase(&self, chain: Chain) -> CoalescePhase {
        self.phases
            .get(&chain)
            .map(|entry| *entry)
            .unwrap_or(CoalescePhase::Idle)
    }

    /// Spawn one coalescing loop per chain present in `registries`. No-op
    /// if already running.
    pub fn start(self: &Arc<Self>) {
        if self
            .state
            .compare_exchange(
                STATE_STOPPED,
                STATE_RUNNING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_err()
        {
            return;
        }

        let chains: Vec<Chain> = self.registries.iter().map(|entry| *entry.key()).collect();
        let mut handles = self.handles.lock();
        for chain in chains {
            let this = Arc::clone(self);
            handles.push(tokio::spawn(async move { this.run_chain(chain).await }));
        }
    }

    /// Request shutdown and wait for every chain loop to exit.
    pub async fn stop(&self) {
        if self.state.swap(STATE_STOPPING, Ordering::SeqCst) == STATE_STOPPED {
            self.state.store(STATE_STOPPED, Ordering::SeqCst);
            return;
        }
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
        self.state.store(STATE_STOPPED, Ordering::SeqCst);
    }

    fn cadence_ms(&self, tier: Tier) -> u64 {
        match tier {
            Tier::High => self.settings.tier_refresh_ms.high,
            Tier::Normal => self.settings.tier_refresh_ms.normal,
            Tier::Low => self.settings.tier_refresh_ms.low,
        }
    }

    async fn run_chain(self: Arc<Self>, chain: Chain) {
        let mut pending: Vec<PoolKey> = Vec::new();
        let mut collecting_since: Option<u64> = None;
        self.phases.insert(chain, CoalescePhase::Idle);

        loop {
            if self.state.load(Ordering::SeqCst) == STATE_STOPPING {
                self.phases.remove(&chain);
                return;
            }

            let due = self.pool_set.due_pools(now_ms(), |tier| self.cadence_ms(tier));
            for key in due {
                if key.0 == chain && !pending.contains(&key) {
                    pending.push(key);
                }
            }
            if !pending.is_empty() && collecting_since.is_none() {
                collecting_since = Some(now_ms());
                self.phases.insert(chain, CoalescePhase::Collecting);
            }
            self.pending_sizes.insert(chain, pending.len());

            let window_elapsed = collecting_since
                .map(|since| now_ms().saturating_sub(since) >= self.settings.collection_window_ms)
                .unwrap_or(false);
            let threshold_hit = pending.len() >= self.settings.flush_threshold;

            if !pending.is_empty() && (window_elapsed || threshold_hit) {
                let flushed = std::mem::take(&mut pending);
                collecting_since = None;
                self.phases.insert(chain, CoalescePhase::Flushing);
                self.flush(chain, flushed).await;
                self.phases.insert(chain, CoalescePhase::Idle);
                self.pending_sizes.insert(chain, 0);
                self.last_batch_ms.insert(chain, now_ms());
            }

            tokio::time::sleep(Duration::from_millis(TICK_MS)).await;
        }
    }

    async fn flush(&self, chain: Chain, keys: Vec<PoolKey>) {
        let Some(registry_handle) = self.registries.get(&chain) else {
            return;
        };
        let registry = registry_handle.snapshot();
        let provider_count = self.chain_client.provider_count(chain).max(1);
        let batches = self
            .batch_planner
            .plan(chain, &keys, &registry, provider_count);

        for batch in batches {
            let response = multicall_with_retry(
                self.chain_client.as_ref(),
                batch.chain,
                batch.provider_index,
                &batch.calls,
                &self.settings.retry_backoff_ms,
            )
            .await;

            let response = match response {
                Ok(response) => response,
                Err(_) => {
                    let retry_at = now_ms() + self.settings.failure_retry_ms;
                    for call in &batch.calls {
                        self.pool_set.record_failure((chain, call.pool), retry_at);
                    }
                    continue;
                }
            };

            for result in response.results {
                let key = (chain, result.pool);
                match result.outcome {
                    Ok(state) => {
                        let outcome = self.state_store.put(key, state, response.block_number);
                        if outcome.is_new_block() {
                            self.pool_set.record_refresh(key, now_ms());
                            self.pricing_engine.on_state_updated(key);
                        }
                    }
                    Err(_) => {
                        let retry_at = now_ms() + self.settings.failure_retry_ms;
                        self.pool_set.record_failure(key, retry_at);
                    }
                }
            }
        }
    }
}
