//! Background sweeper that retires pools whose ref count has sat at zero
//! past the grace period (spec §4.8). Runs on its own interval,
//! independent of the scheduler's per-chain loops, mirroring the
//! teacher's habit of giving upkeep tasks their own `tokio::spawn` rather
//! than piggybacking on the hot loop.

use crate::pool_set::PoolSet;
use crate::state_store::StateStore;
use crate::utils::types::Chain;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub struct Gc {
    pool_set: Arc<PoolSet>,
    state_store: Arc<StateStore>,
    chains: Vec<Chain>,
    grace_period_ms: u64,
    interval_ms: u64,
    stopping: Arc<AtomicBool>,
    handle: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Gc {
    pub fn new(
        pool_set: Arc<PoolSet>,
        state_store: Arc<StateStore>,
        chains: Vec<Chain>,
        grace_period_ms: u64,
        interval_ms: u64,
    ) -> Self {
        Self {
            pool_set,
            state_store,
            chains,
            grace_period_ms,
            interval_ms,
            stopping: Arc::new(AtomicBool::new(false)),
            handle: parking_lot::Mutex::new(None),
        }
    }

    pub fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }
        let this = Arc::clone(self);
        *handle = Some(tokio::spawn(async move { this.run().await }));
    }

    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn run(&self) {
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                return;
            }
            self.sweep();
            tokio::time::sleep(Duration::from_millis(self.interval_ms)).await;
        }
    }

    /// One sweep pass: mark newly-zero pools with the current time, then
    /// remove pools whose mark is older than the grace period. No-resurrect
    /// invariant holds because `PoolSet::touch` clears the mark the moment
    /// a pool's ref count leaves zero, and `expired` only ever returns keys
    /// still at zero at sweep time.
    pub fn sweep(&self) -> usize {
        let now = now_ms();
        for &chain in &self.chains {
            for key in self.all_zero_refcount_keys(chain) {
                self.pool_set.mark_zero_if_unmarked(key, now);
            }
        }

        let expired = self.pool_set.expired(now, self.grace_period_ms);
        for key in &expired {
            self.pool_set.remove(*key);
            self.state_store.remove(*key);
        }
        expired.len()
    }

    fn all_zero_refcount_keys(&self, chain: Chain) -> Vec<crate::utils::types::PoolKey> {
        self.pool_set
            .keys_with_tier(crate::utils::types::Tier::High)
            .into_iter()
            .chain(self.pool_set.keys_with_tier(crate::utils::types::Tier::Normal))
            .chain(self.pool_set.keys_with_tier(crate::utils::types::Tier::Low))
            .filter(|key| key.0 == chain)
            .filter(|key| {
                self.pool_set
                    .get(*key)
                    .map(|entry| entry.ref_count == 0)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::address_from_u64;

    fn key(n: u64) -> crate::utils::types::PoolKey {
        (Chain::Ethereum, address_from_u64(n))
    }

    #[test]
    fn sweep_removes_pools_past_grace_period() {
        let pool_set = Arc::new(PoolSet::new());
        let state_store = Arc::new(StateStore::new());
        pool_set.touch(key(1));
        pool_set.release(key(1), 0);

        let gc = Gc::new(
            Arc::clone(&pool_set),
            Arc::clone(&state_store),
            vec![Chain::Ethereum],
            0,
            1_000,
        );
        let removed = gc.sweep();
        assert_eq!(removed, 1);
        assert!(pool_set.get(key(1)).is_none());
    }

    #[test]
    fn sweep_spares_pools_still_referenced() {
        let pool_set = Arc::new(PoolSet::new());
        let state_store = Arc::new(StateStore::new());
        pool_set.touch(key(1));

        let gc = Gc::new(pool_set.clone(), state_store, vec![Chain::Ethereum], 0, 1_000);
        let removed = gc.sweep();
        assert_eq!(removed, 0);
        assert!(pool_set.get(key(1)).is_some());
    }

    #[test]
    fn touch_between_sweeps_resurrects_before_expiry() {
        let pool_set = Arc::new(PoolSet::new());
        let state_store = Arc::new(StateStore::new());
        pool_set.touch(key(1));
        pool_set.release(key(1), 0); // zero_since_ms stamped here, not at sweep time

        let gc = Gc::new(
            Arc::clone(&pool_set),
            Arc::clone(&state_store),
            vec![Chain::Ethereum],
            10_000,
            1_000,
        );
        gc.sweep();

        pool_set.touch(key(1)); // caller comes back before grace elapses
        let removed = gc.sweep();
        assert_eq!(removed, 0);
        assert!(pool_set.get(key(1)).is_some());
    }

    #[test]
    fn release_sets_grace_deadline_before_any_sweep_runs() {
        let pool_set = Arc::new(PoolSet::new());
        pool_set.touch(key(1));
        pool_set.release(key(1), 500);

        // zero_since_ms is set the instant the ref count hits zero, with
        // no `Gc` involved at all.
        assert_eq!(pool_set.get(key(1)).unwrap().zero_since_ms, Some(500));
        assert!(pool_set.expired(1_000, 1_000).is_empty());
        assert_eq!(pool_set.expired(1_501, 1_000), vec![key(1)]);
    }
}
