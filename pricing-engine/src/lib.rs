//! Hot-path USD pricing engine for curated tokens on Ethereum and Base.
//!
//! Tracks on-chain pool state for registered tokens, keeps it fresh on an
//! adaptive per-pool cadence, and answers USD price queries by walking a
//! cycle-safe route through known stablecoin/wrapped-native bases.

pub mod api;
pub mod batch;
pub mod chain_client;
pub mod config;
pub mod gc;
pub mod interest;
pub mod pool_set;
pub mod pricing;
pub mod registry;
pub mod scheduler;
pub mod state_store;
pub mod utils;

pub use interest::{InterestApi, Stats};
pub use pricing::{PriceOutcome, PricingEngine, TokenMeta};
pub use registry::{PoolInfo, Registry, RegistryHandle};
pub use scheduler::{Scheduler, SchedulerState};

pub use utils::error::{EngineError, Result};
pub use utils::types::{Chain, DexKind, PoolKey, Tier};
