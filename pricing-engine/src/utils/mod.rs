pub mod error;
pub mod math;
pub mod types;

pub use error::{EngineError, Result};
pub use types::{address_from_u64, Chain, DexKind, PoolKey, Tier};
