use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A blockchain network this engine prices tokens on.
///
/// Kept as a closed enum rather than a bare chain id: the engine's
/// per-chain independence (spec Non-goal: no cross-chain aggregation)
/// is easiest to enforce when `Chain` can't silently grow a third variant
/// without touching every `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    Ethereum,
    Base,
}

impl Chain {
    pub fn chain_id(self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Base => 8453,
        }
    }

    pub fn from_chain_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(Chain::Ethereum),
            8453 => Some(Chain::Base),
            _ => None,
        }
    }

    pub fn all() -> [Chain; 2] {
        [Chain::Ethereum, Chain::Base]
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Ethereum => write!(f, "ethereum"),
            Chain::Base => write!(f, "base"),
        }
    }
}

/// AMM flavor backing a pool. Determines both the multicall shape
/// (`ChainClient::multicall`) and the pricing formula (`PricingEngine`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DexKind {
    V2,
    V3,
}

impl DexKind {
    /// Batch weight charged per pool of this kind (spec §3: weight is 1
    /// for v2, 2 for v3 — a v3 read costs two calls, `slot0` + `liquidity`).
    pub fn weight(self) -> u32 {
        match self {
            DexKind::V2 => 1,
            DexKind::V3 => 2,
        }
    }
}

/// Refresh cadence class, chosen per pool from recent price volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    High,
    Normal,
    Low,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::High => write!(f, "high"),
            Tier::Normal => write!(f, "normal"),
            Tier::Low => write!(f, "low"),
        }
    }
}

/// Identifies a pool uniquely across both chains.
pub type PoolKey = (Chain, Address);

/// Helper to create an Address from a u64 value (for tests).
/// Places the value in the last 8 bytes (big-endian), matching
/// the old `Address::from_low_u64_be` behaviour from ethers-rs.
pub fn address_from_u64(n: u64) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..20].copy_from_slice(&n.to_be_bytes());
    Address::from(bytes)
}

/// Helper functions for U256, used by the pricing engine's v3 price math.
pub mod u256_ext {
    use alloy_primitives::U256;

    pub fn to_f64(value: U256) -> f64 {
        let mut result = 0.0;
        let mut multiplier = 1.0;

        for word in value.as_limbs().iter() {
            result += (*word as f64) * multiplier;
            multiplier *= 2.0_f64.powi(64);
        }

        result
    }
}
