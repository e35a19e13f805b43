use super::dto::{
    ErrorResponse, HealthResponse, PriceQuery, PriceResponse, PriceStatus, ReleaseRequest,
    StatsResponse, TierCountsResponse, TouchRequest,
};
use super::state::AppState;
use crate::pricing::PriceOutcome;
use crate::utils::error::EngineError;
use crate::utils::types::Chain;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn touch(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TouchRequest>,
) -> Result<StatusCode, ApiError> {
    let chain = parse_chain(&body.chain)?;
    state.interest_api.touch(chain, body.token)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn release(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReleaseRequest>,
) -> Result<StatusCode, ApiError> {
    let chain = parse_chain(&body.chain)?;
    state.interest_api.release(chain, body.token)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn price(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PriceQuery>,
) -> Result<Json<PriceResponse>, ApiError> {
    let chain = parse_chain(&params.chain)?;
    let outcome = state.interest_api.price(chain, params.token)?;

    let (status, usd) = match outcome {
        PriceOutcome::Usd(value) => (PriceStatus::Ready, Some(value)),
        PriceOutcome::NotReady => (PriceStatus::NotReady, None),
        PriceOutcome::NoRoute => (PriceStatus::NoRoute, None),
    };

    Ok(Json(PriceResponse {
        chain: params.chain,
        token: params.token,
        status,
        usd,
    }))
}

pub async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.interest_api.stats();
    Json(StatsResponse {
        alive_pools: stats.alive_pools,
        by_tier: TierCountsResponse {
            high: stats.by_tier.high,
            normal: stats.by_tier.normal,
            low: stats.by_tier.low,
        },
        pending_batch_size: stats.pending_batch_size,
        last_batch_ms: stats.last_batch_ms,
    })
}

fn parse_chain(name: &str) -> Result<Chain, ApiError> {
    match name.to_ascii_lowercase().as_str() {
        "ethereum" | "eth" => Ok(Chain::Ethereum),
        "base" => Ok(Chain::Base),
        other => Err(ApiError::BadRequest(format!("unknown chain '{other}'"))),
    }
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalError(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownChain(_) | EngineError::InvalidInput(_) => {
                ApiError::BadRequest(err.to_string())
            }
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let error_response = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
        };

        (status, Json(error_response)).into_response()
    }
}
