//! Recursive, cycle-safe USD pricing traversal (spec §4.6). Walks the
//! registry's `routes` from a token toward a base it already knows the
//! USD price of, preferring stablecoin bases, then wrapped-native, then
//! any remaining base, the same priority order the teacher's
//! `routing::pathfinder` applies to candidate edges generalized from
//! "find a swap path" to "find a pricing path".

use crate::pool_set::PoolSet;
use crate::registry::{Registry, RegistryHandle};
use crate::state_store::{PoolState, StateStore};
use crate::utils::math::{adjust_for_decimals, sqrt_price_x96_to_raw_price};
use crate::utils::types::{Chain, PoolKey, Tier};
use crate::config::EngineSettings;
use alloy_primitives::Address;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Result of pricing a token in USD (spec §4.6/§9). `NotReady` and
/// `NoRoute` are deliberately not errors: both are expected, common
/// states for a token the engine hasn't finished warming up or can't
/// reach a base for, not failures of the engine itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceOutcome {
    Usd(f64),
    NotReady,
    NoRoute,
}

/// Decimals needed to convert a pool's raw token0/token1 ratio into a
/// human price; supplied by whoever calls `PricingEngine::price_token`
/// (usually sourced from the same token metadata discovery publishes
/// alongside the registry).
#[derive(Debug, Clone, Copy)]
pub struct TokenMeta {
    pub decimals: u8,
    pub usd_price: Option<f64>,
}

pub struct PricingEngine {
    state_store: Arc<StateStore>,
    pool_set: Arc<PoolSet>,
    registries: Arc<DashMap<Chain, Arc<RegistryHandle>>>,
    settings: EngineSettings,
    /// token -> known metadata, including a hardcoded USD anchor for
    /// stablecoins (usd_price = Some(1.0)) that terminates the recursion.
    token_meta: DashMap<(Chain, Address), TokenMeta>,
}

impl PricingEngine {
    pub fn new(
        state_store: Arc<StateStore>,
        pool_set: Arc<PoolSet>,
        registries: Arc<DashMap<Chain, Arc<RegistryHandle>>>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            state_store,
            pool_set,
            registries,
            settings,
            token_meta: DashMap::new(),
        }
    }

    pub fn set_token_meta(&self, chain: Chain, token: Address, meta: TokenMeta) {
        self.token_meta.insert((chain, token), meta);
    }

    /// Called by the scheduler after a state write lands; recomputes the
    /// price of both sides of the pool and updates their volatility-based
    /// tier (spec §4.4 tiering, §4.6 recompute-on-update).
    pub fn on_state_updated(&self, key: PoolKey) {
        let (chain, pool_address) = key;
        let Some(registry_handle) = self.registries.get(&chain) else {
            return;
        };
        let registry = registry_handle.snapshot();
        let Some(info) = registry.pools.get(&pool_address) else {
            return;
        };

        for token in [info.token0, info.token1] {
            if let PriceOutcome::Usd(price) = self.price_token(chain, token) {
                self.update_tier(key, price);
            }
        }
    }

    fn update_tier(&self, key: PoolKey, new_price: f64) {
        let previous = self.pool_set.get(key).and_then(|entry| entry.last_price);
        self.pool_set.record_price(key, new_price);

        let tier = match previous {
            None => Tier::Normal,
            Some(old) if old == 0.0 => Tier::High,
            Some(old) => {
                let change = ((new_price - old) / old).abs();
                if change > self.settings.tier_thresholds.high {
                    Tier::High
                } else if change > self.settings.tier_thresholds.normal {
                    Tier::Normal
                } else {
                    Tier::Low
                }
            }
        };
        self.pool_set.set_tier(key, tier);
    }

    /// Price `token` in USD by walking the registry's routes toward a
    /// base with a known price, preferring in order: stablecoin bases,
    /// the chain's wrapped-native token, then any remaining base
    /// (spec §4.6 strategy order). `visited` guards against cycles in
    /// malformed topology data.
    pub fn price_token(&self, chain: Chain, token: Address) -> PriceOutcome {
        let Some(registry_handle) = self.registries.get(&chain) else {
            return PriceOutcome::NoRoute;
        };
        let registry = registry_handle.snapshot();
        let mut visited = HashSet::new();
        self.price_token_inner(chain, &registry, token, &mut visited)
    }

    fn price_token_inner(
        &self,
        chain: Chain,
        registry: &Registry,
        token: Address,
        visited: &mut HashSet<Address>,
    ) -> PriceOutcome {
        if !visited.insert(token) {
            return PriceOutcome::NoRoute;
        }

        if registry.is_stablecoin(token) {
            return PriceOutcome::Usd(1.0);
        }

        if let Some(meta) = self.token_meta.get(&(chain, token)) {
            if let Some(price) = meta.usd_price {
                return PriceOutcome::Usd(price);
            }
        }

        let Some(bases) = registry.routes.get(&token) else {
            return PriceOutcome::NoRoute;
        };

        for base_symbol in self.ordered_base_strategies(registry) {
            let Some(pool_addrs) = bases.get(&base_symbol) else {
                continue;
            };
            for pool_addr in pool_addrs {
                let Some(info) = registry.pools.get(pool_addr) else {
                    continue;
                };
                let Some(base_token) = info.other_token(token) else {
                    continue;
                };

                let base_price = match self.price_token_inner(chain, registry, base_token, visited)
                {
                    PriceOutcome::Usd(price) => price,
                    PriceOutcome::NotReady => return PriceOutcome::NotReady,
                    PriceOutcome::NoRoute => continue,
                };

                match self.pool_relative_price(chain, *pool_addr, token, base_token, info.token0) {
                    Some(relative) => return PriceOutcome::Usd(relative * base_price),
                    None => return PriceOutcome::NotReady,
                }
            }
        }

        PriceOutcome::NoRoute
    }

    /// Base symbols to try, in spec §4.6 strategy order: stablecoins
    /// first, then wrapped-native, then whatever else the registry has
    /// routes for.
    fn ordered_base_strategies(&self, registry: &Registry) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();

        for addr in &registry.stablecoins {
            if let Some(symbol) = registry.symbol_of.get(addr) {
                if seen.insert(symbol.clone()) {
                    ordered.push(symbol.clone());
                }
            }
        }
        if let Some(symbol) = registry.wrapped_native_symbol() {
            if seen.insert(symbol.to_string()) {
                ordered.push(symbol.to_string());
            }
        }
        for bases in registry.routes.values() {
            for symbol in bases.keys() {
                if seen.insert(symbol.clone()) {
                    ordered.push(symbol.clone());
                }
            }
        }
        ordered
    }

    /// Price of `token` denominated in `base_token` implied by one pool's
    /// latest state, or `None` if the pool has no state yet (spec §4.6
    /// step 5/6: v2 ratio of reserves, v3 sqrtPriceX96 squared and
    /// decimal-adjusted).
    fn pool_relative_price(
        &self,
        chain: Chain,
        pool_addr: Address,
        token: Address,
        base_token: Address,
        pool_token0: Address,
    ) -> Option<f64> {
        let entry = self.state_store.get((chain, pool_addr))?;
        let token_is_token0 = token == pool_token0;

        let (token_decimals, base_decimals) = self.decimals_for(chain, token, base_token);

        let raw = match entry.state {
            PoolState::V2 {
                reserve0,
                reserve1,
            } => {
                let r0 = crate::utils::types::u256_ext::to_f64(reserve0);
                let r1 = crate::utils::types::u256_ext::to_f64(reserve1);
                if token_is_token0 {
                    if r0 == 0.0 {
                        return None;
                    }
                    r1 / r0
                } else {
                    if r1 == 0.0 {
                        return None;
                    }
                    r0 / r1
                }
            }
            PoolState::V3 {
                sqrt_price_x96, ..
            } => {
                let token0_per_token1 = sqrt_price_x96_to_raw_price(sqrt_price_x96);
                if token_is_token0 {
                    if token0_per_token1 == 0.0 {
                        return None;
                    }
                    1.0 / token0_per_token1
                } else {
                    token0_per_token1
                }
            }
        };

        let (dec0, dec1) = if token_is_token0 {
            (token_decimals, base_decimals)
        } else {
            (base_decimals, token_decimals)
        };
        Some(adjust_for_decimals(raw, dec0, dec1))
    }

    fn decimals_for(&self, chain: Chain, token: Address, base_token: Address) -> (u8, u8) {
        let token_dec = self
            .token_meta
            .get(&(chain, token))
            .map(|m| m.decimals)
            .unwrap_or(18);
        let base_dec = self
            .token_meta
            .get(&(chain, base_token))
            .map(|m| m.decimals)
            .unwrap_or(18);
        (token_dec, base_dec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TierRefreshMs, TierThresholds};
    use crate::registry::PoolInfo;
    use crate::utils::address_from_u64;
    use crate::utils::types::DexKind;
    use alloy_primitives::U256;

    fn settings() -> EngineSettings {
        EngineSettings {
            collection_window_ms: 150,
            flush_threshold: 10,
            max_weight_per_batch: 50,
            tier_refresh_ms: TierRefreshMs {
                high: 5_000,
                normal: 10_000,
                low: 30_000,
            },
            tier_thresholds: TierThresholds {
                high: 0.05,
                normal: 0.001,
            },
            failure_retry_ms: 5_000,
            retry_attempts: 3,
            retry_backoff_ms: vec![1_000, 2_000, 4_000],
            grace_period_ms: 10_000,
            gc_interval_ms: 10_000,
            state_ttl_ms: 30_000,
            batch_deadline_ms: 5_000,
        }
    }

    fn engine_with_direct_route() -> (PricingEngine, Address, Address, Address) {
        let weth = address_from_u64(1);
        let usdc = address_from_u64(2);
        let pool = address_from_u64(10);

        let mut registry = Registry::default();
        registry.stablecoins.insert(usdc);
        registry.symbol_of.insert(usdc, "USDC".to_string());
        registry.wrapped_native = Some(weth);
        registry.symbol_of.insert(weth, "WETH".to_string());
        registry.pools.insert(
            pool,
            PoolInfo {
                dex_kind: DexKind::V2,
                token0: weth,
                token1: usdc,
                fee_tier: None,
            },
        );
        registry
            .routes
            .entry(weth)
            .or_default()
            .insert("USDC".to_string(), vec![pool]);

        let registries = Arc::new(DashMap::new());
        registries.insert(Chain::Ethereum, Arc::new(RegistryHandle::new(registry)));

        let state_store = Arc::new(StateStore::new());
        state_store.put(
            (Chain::Ethereum, pool),
            PoolState::V2 {
                reserve0: U256::from(1_000u64), // WETH
                reserve1: U256::from(2_000_000u64), // USDC, price 2000 USDC/WETH
            },
            1,
        );

        let pool_set = Arc::new(PoolSet::new());
        let engine = PricingEngine::new(state_store, pool_set, registries, settings());
        engine.set_token_meta(
            Chain::Ethereum,
            usdc,
            TokenMeta {
                decimals: 6,
                usd_price: Some(1.0),
            },
        );
        engine.set_token_meta(
            Chain::Ethereum,
            weth,
            TokenMeta {
                decimals: 18,
                usd_price: None,
            },
        );

        (engine, weth, usdc, pool)
    }

    #[test]
    fn direct_stable_pair_prices_correctly() {
        let (engine, weth, _usdc, _pool) = engine_with_direct_route();
        match engine.price_token(Chain::Ethereum, weth) {
            PriceOutcome::Usd(price) => assert!((price - 2000.0).abs() < 1.0),
            other => panic!("expected Usd, got {other:?}"),
        }
    }

    #[test]
    fn token_with_no_state_is_not_ready() {
        let weth = address_from_u64(1);
        let usdc = address_from_u64(2);
        let pool = address_from_u64(10);

        let mut registry = Registry::default();
        registry.stablecoins.insert(usdc);
        registry.symbol_of.insert(usdc, "USDC".to_string());
        registry.pools.insert(
            pool,
            PoolInfo {
                dex_kind: DexKind::V2,
                token0: weth,
                token1: usdc,
                fee_tier: None,
            },
        );
        registry
            .routes
            .entry(weth)
            .or_default()
            .insert("USDC".to_string(), vec![pool]);

        let registries = Arc::new(DashMap::new());
        registries.insert(Chain::Ethereum, Arc::new(RegistryHandle::new(registry)));

        let engine = PricingEngine::new(
            Arc::new(StateStore::new()),
            Arc::new(PoolSet::new()),
            registries,
            settings(),
        );
        engine.set_token_meta(
            Chain::Ethereum,
            usdc,
            TokenMeta {
                decimals: 6,
                usd_price: Some(1.0),
            },
        );

        assert_eq!(
            engine.price_token(Chain::Ethereum, weth),
            PriceOutcome::NotReady
        );
    }

    #[test]
    fn token_with_no_route_at_all() {
        let orphan = address_from_u64(77);
        let registries = Arc::new(DashMap::new());
        registries.insert(Chain::Ethereum, Arc::new(RegistryHandle::new(Registry::default())));

        let engine = PricingEngine::new(
            Arc::new(StateStore::new()),
            Arc::new(PoolSet::new()),
            registries,
            settings(),
        );
        assert_eq!(
            engine.price_token(Chain::Ethereum, orphan),
            PriceOutcome::NoRoute
        );
    }

    #[test]
    fn cycle_in_routes_does_not_hang() {
        let a = address_from_u64(1);
        let b = address_from_u64(2);
        let pool = address_from_u64(10);

        let mut registry = Registry::default();
        registry.pools.insert(
            pool,
            PoolInfo {
                dex_kind: DexKind::V2,
                token0: a,
                token1: b,
                fee_tier: None,
            },
        );
        // a routes to b labeled "B", b routes to a labeled "A" -- a cycle
        // with no stablecoin anchor in reach.
        registry
            .routes
            .entry(a)
            .or_default()
            .insert("B".to_string(), vec![pool]);
        registry
            .routes
            .entry(b)
            .or_default()
            .insert("A".to_string(), vec![pool]);

        let registries = Arc::new(DashMap::new());
        registries.insert(Chain::Ethereum, Arc::new(RegistryHandle::new(registry)));

        let engine = PricingEngine::new(
            Arc::new(StateStore::new()),
            Arc::new(PoolSet::new()),
            registries,
            settings(),
        );

        assert_eq!(engine.price_token(Chain::Ethereum, a), PriceOutcome::NoRoute);
    }

    #[test]
    fn tier_promotes_to_high_on_large_price_move() {
        let (engine, _weth, _usdc, pool) = engine_with_direct_route();
        let key = (Chain::Ethereum, pool);
        engine.pool_set.touch(key);
        engine.update_tier(key, 100.0);
        engine.update_tier(key, 200.0); // 100% change
        assert_eq!(engine.pool_set.get(key).unwrap().tier, Tier::High);
    }

    #[test]
    fn change_of_exactly_high_threshold_stays_normal() {
        let (engine, _weth, _usdc, pool) = engine_with_direct_route();
        let key = (Chain::Ethereum, pool);
        engine.pool_set.touch(key);
        engine.update_tier(key, 100.0);
        engine.update_tier(key, 105.0); // exactly 5% change
        assert_eq!(engine.pool_set.get(key).unwrap().tier, Tier::Normal);
    }

    #[test]
    fn change_of_exactly_normal_threshold_stays_low() {
        let (engine, _weth, _usdc, pool) = engine_with_direct_route();
        let key = (Chain::Ethereum, pool);
        engine.pool_set.touch(key);
        engine.update_tier(key, 100.0);
        engine.update_tier(key, 100.1); // exactly 0.1% change
        assert_eq!(engine.pool_set.get(key).unwrap().tier, Tier::Low);
    }
}
