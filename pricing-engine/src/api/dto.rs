use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct TouchRequest {
    pub chain: String,
    pub token: Address,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub chain: String,
    pub token: Address,
}

#[derive(Debug, Deserialize)]
pub struct PriceQuery {
    pub chain: String,
    pub token: Address,
}

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub chain: String,
    pub token: Address,
    pub status: PriceStatus,
    pub usd: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStatus {
    Ready,
    NotReady,
    NoRoute,
}

#[derive(Debug, Serialize)]
pub struct TierCountsResponse {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub alive_pools: usize,
    pub by_tier: TierCountsResponse,
    pub pending_batch_size: usize,
    pub last_batch_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
