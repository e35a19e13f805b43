//! Read-only topology input from the discovery collaborator (spec §3).
//!
//! A `Registry` is an immutable snapshot; discovery publishes a new one by
//! swapping the pointer held in a `RegistryHandle`. Readers that need a
//! consistent view for the duration of one operation clone the `Arc` once
//! and work off that snapshot — exactly the pattern the teacher's
//! `PoolGraph` uses `parking_lot::RwLock` for, generalized from "one mutable
//! graph" to "one swappable immutable snapshot" since here the whole
//! registry is replaced atomically rather than mutated in place.

use crate::utils::types::DexKind;
use alloy_primitives::Address;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Static per-pool metadata as published by discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    pub dex_kind: DexKind,
    pub token0: Address,
    pub token1: Address,
    pub fee_tier: Option<u32>,
}

impl PoolInfo {
    pub fn weight(&self) -> u32 {
        self.dex_kind.weight()
    }

    pub fn other_token(&self, token: Address) -> Option<Address> {
        if token == self.token0 {
            Some(self.token1)
        } else if token == self.token1 {
            Some(self.token0)
        } else {
            None
        }
    }
}

/// Immutable topology snapshot for one chain.
///
/// Invariant (spec §3): every pool address referenced from `routes` exists
/// in `pools`. `Registry::validate` checks this at construction time so a
/// malformed registry can never reach the scheduler.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub pools: HashMap<Address, PoolInfo>,
    /// token -> base symbol -> ordered candidate pool addresses.
    pub routes: HashMap<Address, HashMap<String, Vec<Address>>>,
    pub symbol_of: HashMap<Address, String>,
    pub stablecoins: HashSet<Address>,
    pub wrapped_native: Option<Address>,
}

impl Registry {
    pub fn validate(&self) -> Result<(), String> {
        for (token, bases) in &self.routes {
            for (base, pools) in bases {
                for pool in pools {
                    if !self.pools.contains_key(pool) {
                        return Err(format!(
                            "routes[{token:?}][{base}] references unknown pool {pool:?}"
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// All pool addresses reachable from a token across every base symbol,
    /// deduplicated — the set `InterestApi::touch` registers interest in
    /// (spec §4.1).
    pub fn pools_for_token(&self, token: Address) -> HashSet<Address> {
        let mut out = HashSet::new();
        if let Some(bases) = self.routes.get(&token) {
            for pools in bases.values() {
                out.extend(pools.iter().copied());
            }
        }
        out
    }

    pub fn wrapped_native_symbol(&self) -> Option<&str> {
        self.wrapped_native
            .and_then(|addr| self.symbol_of.get(&addr))
            .map(String::as_str)
    }

    pub fn is_stablecoin(&self, token: Address) -> bool {
        self.stablecoins.contains(&token)
    }
}

/// Swappable holder for one chain's `Registry`. Discovery publishes a new
/// snapshot with `store`; everything else calls `snapshot` to read.
#[derive(Default)]
pub struct RegistryHandle {
    inner: RwLock<Arc<Registry>>,
}

impl RegistryHandle {
    pub fn new(registry: Registry) -> Self {
        Self {
            inner: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn snapshot(&self) -> Arc<Registry> {
        self.inner.read().clone()
    }

    pub fn store(&self, registry: Registry) {
        *self.inner.write() = Arc::new(registry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::address_from_u64;

    fn pool(dex_kind: DexKind, token0: Address, token1: Address) -> PoolInfo {
        PoolInfo {
            dex_kind,
            token0,
            token1,
            fee_tier: None,
        }
    }

    #[test]
    fn validate_catches_dangling_route() {
        let token = address_from_u64(1);
        let usdc = address_from_u64(2);
        let ghost_pool = address_from_u64(99);

        let mut registry = Registry::default();
        registry
            .routes
            .entry(token)
            .or_default()
            .insert("USDC".to_string(), vec![ghost_pool]);

        assert!(registry.validate().is_err());

        registry
            .pools
            .insert(ghost_pool, pool(DexKind::V2, token, usdc));
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn pools_for_token_dedupes_across_bases() {
        let token = address_from_u64(1);
        let shared_pool = address_from_u64(10);
        let other_pool = address_from_u64(11);

        let mut registry = Registry::default();
        registry
            .routes
            .entry(token)
            .or_default()
            .insert("USDC".to_string(), vec![shared_pool]);
        registry
            .routes
            .entry(token)
            .or_default()
            .insert("WETH".to_string(), vec![shared_pool, other_pool]);

        let pools = registry.pools_for_token(token);
        assert_eq!(pools.len(), 2);
        assert!(pools.contains(&shared_pool));
        assert!(pools.contains(&other_pool));
    }

    #[test]
    fn handle_swap_is_visible_to_new_snapshots() {
        let handle = RegistryHandle::new(Registry::default());
        let before = handle.snapshot();
        assert!(before.pools.is_empty());

        let mut next = Registry::default();
        next.stablecoins.insert(address_from_u64(5));
        handle.store(next);

        let after = handle.snapshot();
        assert!(after.stablecoins.contains(&address_from_u64(5)));
    }
}
