//! Weight-capped batch packing and round-robin provider assignment
//! (spec §4.3). Generalizes the teacher's `routing::parallel` chunk-split
//! idea (divide work into bounded-size units) from "split one swap across
//! pools" to "pack many pools into multicall-sized batches per provider".

use crate::chain_client::PoolCallSpec;
use crate::registry::Registry;
use crate::utils::types::{Chain, PoolKey};
use alloy_primitives::Address;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One provider-bound unit of work: a chain, the provider index to send it
/// to, and the pool calls it carries, never exceeding `max_weight`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub chain: Chain,
    pub provider_index: usize,
    pub calls: Vec<PoolCallSpec>,
}

impl Batch {
    pub fn total_weight(&self) -> u32 {
        self.calls.iter().map(|call| call.dex_kind.weight()).sum()
    }
}

/// Packs a set of due pools into weight-capped batches, assigning each
/// batch a provider index via round-robin so load spreads evenly across a
/// chain's configured providers.
pub struct BatchPlanner {
    max_weight_per_batch: u32,
    next_provider: AtomicUsize,
}

impl BatchPlanner {
    pub fn new(max_weight_per_batch: u32) -> Self {
        Self {
            max_weight_per_batch: max_weight_per_batch.max(1),
            next_provider: AtomicUsize::new(0),
        }
    }

    /// Greedily packs `pools` (in input order) into batches that never
    /// exceed `max_weight_per_batch`, then assigns each batch a provider
    /// index in round-robin order starting from wherever the previous
    /// `plan` call left off. A single pool whose own weight exceeds the
    /// cap still gets its own batch (never silently dropped).
    pub fn plan(
        &self,
        chain: Chain,
        pools: &[PoolKey],
        registry: &Registry,
        provider_count: usize,
    ) -> Vec<Batch> {
        let provider_count = provider_count.max(1);
        let mut batches: Vec<Vec<PoolCallSpec>> = Vec::new();
        let mut current: Vec<PoolCallSpec> = Vec::new();
        let mut current_weight = 0u32;

        for &(pool_chain, address) in pools {
            if pool_chain != chain {
                continue;
            }
            let Some(info) = registry.pools.get(&address) else {
                continue;
            };
            let call = PoolCallSpec {
                pool: address,
                dex_kind: info.dex_kind,
            };
            let weight = call.dex_kind.weight();

            if !current.is_empty() && current_weight + weight > self.max_weight_per_batch {
                batches.push(std::mem::take(&mut current));
                current_weight = 0;
            }
            current.push(call);
            current_weight += weight;
        }
        if !current.is_empty() {
            batches.push(current);
        }

        batches
            .into_iter()
            .map(|calls| {
                let provider_index =
                    self.next_provider.fetch_add(1, Ordering::SeqCst) % provider_count;
                Batch {
                    chain,
                    provider_index,
                    calls,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PoolInfo;
    use crate::utils::address_from_u64;
    use crate::utils::types::DexKind;

    fn registry_with(pools: Vec<(Address, DexKind)>) -> Registry {
        let mut registry = Registry::default();
        for (addr, dex_kind) in pools {
            registry.pools.insert(
                addr,
                PoolInfo {
                    dex_kind,
                    token0: address_from_u64(1000),
                    token1: address_from_u64(1001),
                    fee_tier: None,
                },
            );
        }
        registry
    }

    #[test]
    fn packs_without_exceeding_weight_cap() {
        let addrs: Vec<Address> = (0..5).map(address_from_u64).collect();
        let registry = registry_with(addrs.iter().map(|a| (*a, DexKind::V3)).collect());
        let keys: Vec<PoolKey> = addrs.iter().map(|a| (Chain::Ethereum, *a)).collect();

        let planner = BatchPlanner::new(4); // weight 2 each -> 2 per batch
        let batches = planner.plan(Chain::Ethereum, &keys, &registry, 1);

        assert_eq!(batches.len(), 3); // 2,2,1
        for batch in &batches {
            assert!(batch.total_weight() <= 4);
        }
    }

    #[test]
    fn oversized_single_pool_gets_its_own_batch() {
        let addr = address_from_u64(1);
        let registry = registry_with(vec![(addr, DexKind::V3)]);
        let keys = vec![(Chain::Ethereum, addr)];

        let planner = BatchPlanner::new(1); // cap smaller than one v3 call's weight
        let batches = planner.plan(Chain::Ethereum, &keys, &registry, 1);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].calls.len(), 1);
    }

    #[test]
    fn provider_assignment_round_robins() {
        let addrs: Vec<Address> = (0..4).map(address_from_u64).collect();
        let registry = registry_with(addrs.iter().map(|a| (*a, DexKind::V2)).collect());
        let keys: Vec<PoolKey> = addrs.iter().map(|a| (Chain::Ethereum, *a)).collect();

        let planner = BatchPlanner::new(1); // one pool per batch -> 4 batches
        let batches = planner.plan(Chain::Ethereum, &keys, &registry, 2);

        let providers: Vec<usize> = batches.iter().map(|b| b.provider_index).collect();
        assert_eq!(providers, vec![0, 1, 0, 1]);
    }

    #[test]
    fn pools_on_other_chains_are_skipped() {
        let addr = address_from_u64(1);
        let registry = registry_with(vec![(addr, DexKind::V2)]);
        let keys = vec![(Chain::Base, addr)];

        let planner = BatchPlanner::new(10);
        let batches = planner.plan(Chain::Ethereum, &keys, &registry, 1);
        assert!(batches.is_empty());
    }
}
