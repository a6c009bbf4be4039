//! Health check handler

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::application::ChargingProfileService;
use crate::domain::ProfileFilter;

/// Station id used for the read-only storage probe; never written.
const PROBE_CHARGE_POINT: &str = "__health_probe__";

#[derive(Clone)]
pub struct HealthState {
    pub service: Arc<ChargingProfileService>,
    /// Configured backend name (memory, document, database)
    pub backend: &'static str,
    pub started_at: Arc<Instant>,
}

/// Service health response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage: ComponentHealth,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub backend: String,
    pub status: String,
    pub latency_ms: Option<u64>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Storage is unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let probe_start = Instant::now();
    let storage = match state
        .service
        .get_charging_profiles(PROBE_CHARGE_POINT, &ProfileFilter::default())
        .await
    {
        Ok(_) => ComponentHealth {
            backend: state.backend.to_string(),
            status: "ok".to_string(),
            latency_ms: Some(probe_start.elapsed().as_millis() as u64),
        },
        Err(_) => ComponentHealth {
            backend: state.backend.to_string(),
            status: "error".to_string(),
            latency_ms: None,
        },
    };

    let (status, http_status) = if storage.status == "ok" {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.started_at.elapsed().as_secs(),
            storage,
        }),
    )
}
