//! Reference-counted "alive pool" set (spec §4.3). A pool becomes alive
//! the first time any caller touches a token it's reachable from release
//! drops its ref count; it only leaves the set once `Gc` sweeps it after a
//! grace period at zero (no-resurrect invariant — see `gc`).
//!
//! Concurrent map keyed by `PoolKey`, same sharded-locking shape as
//! `StateStore`.

use crate::utils::types::{PoolKey, Tier};
use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
pub struct PoolEntry {
    pub ref_count: u32,
    pub tier: Tier,
    /// Stamped by `release` the instant `ref_count` hits zero; cleared if
    /// a `touch` brings the pool back to life before the grace period
    /// elapses. `Gc` only removes entries whose grace deadline has passed
    /// AND whose ref count is still zero.
    pub zero_since_ms: Option<u64>,
    pub last_price: Option<f64>,
    /// When this pool's state was last refreshed from chain, used by the
    /// scheduler to decide due-ness against its tier's cadence.
    pub last_refreshed_ms: Option<u64>,
    /// Set on a failed refresh attempt to the earliest time the pool may
    /// be considered due again, regardless of tier cadence. Cleared by
    /// the next successful refresh.
    pub retry_not_before_ms: Option<u64>,
}

impl PoolEntry {
    fn new() -> Self {
        Self {
            ref_count: 1,
            tier: Tier::Normal,
            zero_since_ms: None,
            last_price: None,
            last_refreshed_ms: None,
            retry_not_before_ms: None,
        }
    }
}

#[derive(Default)]
pub struct PoolSet {
    entries: DashMap<PoolKey, PoolEntry>,
}

impl PoolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a pool, incrementing its ref count (or
    /// inserting it at count 1 if new). Clears any pending grace-period
    /// mark — a touch always resurrects a pool still present in the set.
    pub fn touch(&self, key: PoolKey) {
        self.entries
            .entry(key)
            .and_modify(|entry| {
                entry.ref_count += 1;
                entry.zero_since_ms = None;
            })
            .or_insert_with(PoolEntry::new);
    }

    /// Release interest in a pool. Idempotent: releasing a pool that's
    /// already at zero (or not present) is a no-op rather than a panic or
    /// underflow, since multiple callers may race to release the same
    /// token's pools during teardown. Stamps `zero_since_ms` the instant
    /// the ref count reaches zero — the grace deadline starts here, not
    /// whenever `Gc` next happens to sweep.
    pub fn release(&self, key: PoolKey, now_ms: u64) {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            if entry.ref_count > 0 {
                entry.ref_count -= 1;
                if entry.ref_count == 0 {
                    entry.zero_since_ms = Some(now_ms);
                }
            }
        }
    }

    pub fn get(&self, key: PoolKey) -> Option<PoolEntry> {
        self.entries.get(&key).map(|entry| *entry)
    }

    pub fn contains(&self, key: PoolKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn set_tier(&self, key: PoolKey, tier: Tier) {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.tier = tier;
        }
    }

    pub fn record_price(&self, key: PoolKey, price: f64) {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.last_price = Some(price);
        }
    }

    pub fn record_refresh(&self, key: PoolKey, now_ms: u64) {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.last_refreshed_ms = Some(now_ms);
            entry.retry_not_before_ms = None;
        }
    }

    /// Back a pool off after a failed refresh attempt: it won't be
    /// considered due again until `retry_at_ms`, overriding tier cadence
    /// (spec §4.2/§4.8 `failure_retry_ms`).
    pub fn record_failure(&self, key: PoolKey, retry_at_ms: u64) {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            entry.retry_not_before_ms = Some(retry_at_ms);
        }
    }

    /// Pools with `ref_count > 0` whose tier cadence has elapsed since
    /// `last_refreshed_ms` (or that have never been refreshed) — the set
    /// the scheduler packs into batches on each tick (spec §4.4). A pool
    /// backed off by `record_failure` stays excluded until its
    /// `retry_not_before_ms` passes, even if tier cadence alone would
    /// otherwise mark it due.
    pub fn due_pools(&self, now_ms: u64, cadence_ms: impl Fn(Tier) -> u64) -> Vec<PoolKey> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let (key, value) = (entry.key(), entry.value());
                if value.ref_count == 0 {
                    return None;
                }
                if let Some(retry_at) = value.retry_not_before_ms {
                    if now_ms < retry_at {
                        return None;
                    }
                }
                let due = match value.last_refreshed_ms {
                    None => true,
                    Some(last) => now_ms.saturating_sub(last) >= cadence_ms(value.tier),
                };
                due.then_some(*key)
            })
            .collect()
    }

    /// Defensive backstop called by `Gc` on its sweep: `release` already
    /// stamps `zero_since_ms` the instant ref count hits zero, so this is
    /// normally a no-op by the time it runs. No-op if the pool isn't at
    /// zero or is already marked.
    pub fn mark_zero_if_unmarked(&self, key: PoolKey, now_ms: u64) {
        if let Some(mut entry) = self.entries.get_mut(&key) {
            if entry.ref_count == 0 && entry.zero_since_ms.is_none() {
                entry.zero_since_ms = Some(now_ms);
            }
        }
    }

    pub fn remove(&self, key: PoolKey) {
        self.entries.remove(&key);
    }

    /// All pools currently at zero ref count whose `zero_since_ms` is at
    /// least `grace_period_ms` in the past, relative to `now_ms` —
    /// collected by `Gc::sweep` for removal from both this set and the
    /// `StateStore`.
    pub fn expired(&self, now_ms: u64, grace_period_ms: u64) -> Vec<PoolKey> {
        self.entries
            .iter()
            .filter_map(|entry| {
                let (key, value) = (entry.key(), entry.value());
                match value.zero_since_ms {
                    Some(since) if value.ref_count == 0 && now_ms.saturating_sub(since) >= grace_period_ms => {
                        Some(*key)
                    }
                    _ => None,
                }
            })
            .collect()
    }

    pub fn keys_with_tier(&self, tier: Tier) -> Vec<PoolKey> {
        self.entries
            .iter()
            .filter(|entry| entry.value().tier == tier)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Pools with `ref_count > 0` — the set a caller would consider
    /// "alive" (as opposed to present but pending grace-period removal).
    pub fn alive_len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().ref_count > 0).count()
    }

    /// Count of alive pools (`ref_count > 0`) currently classified in
    /// `tier`.
    pub fn alive_count_with_tier(&self, tier: Tier) -> usize {
        self.entries
            .iter()
            .filter(|e| e.value().ref_count > 0 && e.value().tier == tier)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
