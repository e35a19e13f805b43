use crate::chain_client::mock::MockChainClient;
use crate::chain_client::ChainClient;
use crate::config::Settings;
use crate::gc::Gc;
use crate::interest::InterestApi;
use crate::pool_set::PoolSet;
use crate::pricing::PricingEngine;
use crate::registry::{Registry, RegistryHandle};
use crate::scheduler::Scheduler;
use crate::state_store::StateStore;
use crate::utils::types::Chain;
use dashmap::DashMap;
use std::sync::Arc;

/// Application state shared across handlers. Wires the core engine
/// components together the way the demo binary needs to; production
/// deployments would swap `MockChainClient` for a real multicall client
/// but otherwise assemble the same graph.
#[derive(Clone)]
pub struct AppState {
    pub interest_api: Arc<InterestApi>,
    pub scheduler: Arc<Scheduler>,
    pub gc: Arc<Gc>,
    pub settings: Settings,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let state_store = Arc::new(StateStore::new());
        let pool_set = Arc::new(PoolSet::new());

        let registries: Arc<DashMap<Chain, Arc<RegistryHandle>>> = Arc::new(DashMap::new());
        for chain in Chain::all() {
            registries.insert(chain, Arc::new(RegistryHandle::new(Registry::default())));
        }

        let pricing_engine = Arc::new(PricingEngine::new(
            Arc::clone(&state_store),
            Arc::clone(&pool_set),
            Arc::clone(&registries),
            settings.engine.clone(),
        ));

        let chain_client: Arc<dyn ChainClient> =
            Arc::new(MockChainClient::new(settings.providers.provider_count.clone()));

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&state_store),
            Arc::clone(&pool_set),
            Arc::clone(&registries),
            chain_client,
            Arc::clone(&pricing_engine),
            settings.engine.clone(),
        ));

        let gc = Arc::new(Gc::new(
            Arc::clone(&pool_set),
            Arc::clone(&state_store),
            Chain::all().to_vec(),
            settings.engine.grace_period_ms,
            settings.engine.gc_interval_ms,
        ));

        let interest_api = Arc::new(InterestApi::new(
            pool_set,
            registries,
            pricing_engine,
            Arc::clone(&scheduler),
        ));

        Self {
            interest_api,
            scheduler,
            gc,
            settings,
        }
    }

    pub fn start_background_tasks(&self) {
        self.scheduler.start();
        self.gc.start();
    }
}
