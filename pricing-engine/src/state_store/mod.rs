//! Latest-known on-chain state per pool, keyed by `(Chain, Address)` (spec
//! §4.2). Backed by `dashmap::DashMap` the same way the teacher's
//! `PoolGraph` keeps its node/edge tables — sharded locking so writers on
//! different pools never contend.

use crate::utils::types::PoolKey;
use alloy_primitives::U256;
use dashmap::DashMap;

/// Raw state last observed for one pool. Which variant is stored is
/// determined entirely by the pool's `DexKind` in the registry; the store
/// itself doesn't enforce that pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    V2 {
        reserve0: U256,
        reserve1: U256,
    },
    V3 {
        sqrt_price_x96: U256,
        tick: i32,
        liquidity: u128,
    },
}

/// One pool's state plus the block it was observed at.
#[derive(Debug, Clone, Copy)]
pub struct StateEntry {
    pub state: PoolState,
    pub block_number: u64,
}

/// Result of a `StateStore::put` call. Distinguishes a stale write from
/// one that landed on the same block already on record — the latter
/// still refreshes the stored value (a provider may correct a prior read
/// within the same block) but, per spec §4.5 step 5's block-aware skip,
/// must not trigger price recomputation or reset the refresh cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Stale,
    SameBlock,
    NewBlock,
}

impl PutOutcome {
    pub fn is_new_block(self) -> bool {
        matches!(self, PutOutcome::NewBlock)
    }
}

/// Concurrent map of `PoolKey -> StateEntry` with a block-monotonicity
/// write guard (spec §4.2 invariant: a write with `block_number` older
/// than the stored entry is silently dropped — out-of-order RPC responses
/// must never roll state backwards).
#[derive(Default)]
pub struct StateStore {
    entries: DashMap<PoolKey, StateEntry>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: PoolKey) -> Option<StateEntry> {
        self.entries.get(&key).map(|entry| *entry)
    }

    /// Apply a state read, reporting whether it was accepted and, if so,
    /// whether it advanced the pool's block number.
    pub fn put(&self, key: PoolKey, state: PoolState, block_number: u64) -> PutOutcome {
        use dashmap::mapref::entry::Entry;

        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(StateEntry {
                    state,
                    block_number,
                });
                PutOutcome::NewBlock
            }
            Entry::Occupied(mut slot) => {
                let previous_block = slot.get().block_number;
                if block_number < previous_block {
                    PutOutcome::Stale
                } else {
                    slot.insert(StateEntry {
                        state,
                        block_number,
                    });
                    if block_number == previous_block {
                        PutOutcome::SameBlock
                    } else {
                        PutOutcome::NewBlock
                    }
                }
            }
        }
    }

    pub fn remove(&self, key: PoolKey) {
        self.entries.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{address_from_u64, Chain};

    fn key(n: u64) -> PoolKey {
        (Chain::Ethereum, address_from_u64(n))
    }

    fn v2(r0: u64, r1: u64) -> PoolState {
        PoolState::V2 {
            reserve0: U256::from(r0),
            reserve1: U256::from(r1),
        }
    }

    #[test]
    fn first_write_always_applies_as_new_block() {
        let store = StateStore::new();
        assert_eq!(store.put(key(1), v2(100, 200), 10), PutOutcome::NewBlock);
        assert_eq!(store.get(key(1)).unwrap().block_number, 10);
    }

    #[test]
    fn stale_block_write_is_rejected() {
        let store = StateStore::new();
        store.put(key(1), v2(100, 200), 10);

        let outcome = store.put(key(1), v2(999, 999), 5);
        assert_eq!(outcome, PutOutcome::Stale);
        assert_eq!(store.get(key(1)).unwrap().block_number, 10);
    }

    #[test]
    fn equal_block_write_updates_value_but_reports_same_block() {
        let store = StateStore::new();
        store.put(key(1), v2(100, 200), 10);
        let outcome = store.put(key(1), v2(150, 250), 10);
        assert_eq!(outcome, PutOutcome::SameBlock);
        assert!(!outcome.is_new_block());
        match store.get(key(1)).unwrap().state {
            PoolState::V2 { reserve0, .. } => assert_eq!(reserve0, U256::from(150u64)),
            _ => panic!("expected v2 state"),
        }
    }

    #[test]
    fn newer_block_write_applies_as_new_block() {
        let store = StateStore::new();
        store.put(key(1), v2(100, 200), 10);
        assert_eq!(store.put(key(1), v2(300, 400), 11), PutOutcome::NewBlock);
        assert_eq!(store.get(key(1)).unwrap().block_number, 11);
    }

    #[test]
    fn remove_drops_entry() {
        let store = StateStore::new();
        store.put(key(1), v2(100, 200), 10);
        store.remove(key(1));
        assert!(store.get(key(1)).is_none());
        assert!(store.is_empty());
    }
}
