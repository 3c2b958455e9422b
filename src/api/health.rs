//! Health check and statistics endpoints.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::relay::CoordinatorStatsSnapshot;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub environment: String,
    pub gateway: String,
    pub registry: RegistryHealthResponse,
    pub signing_key_cached: bool,
}

#[derive(Debug, Serialize)]
pub struct RegistryHealthResponse {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_breaker_state: Option<String>,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub uptime_seconds: u64,
    pub relay: CoordinatorStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let (circuit_breaker_state, available) = match &state.redis_pool {
        Some(pool) => (Some(pool.circuit_state().as_str().to_string()), pool.is_healthy()),
        None => (None, true),
    };

    let status = if available { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        environment: state.dispatcher.environment().as_str().to_string(),
        gateway: state.dispatcher.base_url().to_string(),
        registry: RegistryHealthResponse {
            backend: state.coordinator.registry_backend().to_string(),
            circuit_breaker_state,
            available,
        },
        signing_key_cached: state.signer.is_key_cached(),
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        uptime_seconds: state.start_time.elapsed().as_secs(),
        relay: state.coordinator.stats(),
    })
}
