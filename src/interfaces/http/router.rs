//! API router with OpenAPI document

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware, routing::get, Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::modules::charging_profiles::{self, ChargingProfileState};
use super::modules::health::{self, HealthState};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics};
use crate::application::ChargingProfileService;
use crate::domain::charging_profile::{
    ChargingProfile, ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit,
    ChargingSchedule, ChargingSchedulePeriod, CompositeSchedule, RecurrencyKind,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        charging_profiles::set_charging_profile,
        charging_profiles::get_charging_profiles,
        charging_profiles::clear_charging_profile,
        charging_profiles::get_composite_schedule,
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ComponentHealth,
            ChargingProfile,
            ChargingProfilePurpose,
            ChargingProfileKind,
            RecurrencyKind,
            ChargingRateUnit,
            ChargingSchedule,
            ChargingSchedulePeriod,
            CompositeSchedule,
            charging_profiles::SetChargingProfileRequest,
            charging_profiles::ChargingProfileBody,
            charging_profiles::SetChargingProfileResponse,
            charging_profiles::ClearChargingProfileResponse,
            charging_profiles::CompositeScheduleResponse,
        )
    ),
    tags(
        (name = "Health", description = "Service and storage health"),
        (name = "Charging Profiles", description = "Smart charging profiles and composite schedules"),
    ),
    info(
        title = "Texnouz Smart Charging API",
        version = "1.0.0",
        description = "Charging profile store and composite schedule resolution for OCPP charge points"
    )
)]
pub struct ApiDoc;

pub struct RouterOptions {
    pub service: Arc<ChargingProfileService>,
    /// Backend name reported by `/health`
    pub backend: &'static str,
    /// `/metrics` is mounted only when a recorder handle is given.
    pub metrics: Option<PrometheusHandle>,
}

/// Create the API router with all routes
pub fn create_api_router(options: RouterOptions) -> Router {
    let profile_state = ChargingProfileState {
        service: Arc::clone(&options.service),
    };
    let health_state = HealthState {
        service: options.service,
        backend: options.backend,
        started_at: Arc::new(Instant::now()),
    };

    let charge_point_routes = Router::new()
        .route(
            "/{charge_point_id}/charging-profiles",
            get(charging_profiles::get_charging_profiles)
                .put(charging_profiles::set_charging_profile)
                .delete(charging_profiles::clear_charging_profile),
        )
        .route(
            "/{charge_point_id}/composite-schedule",
            get(charging_profiles::get_composite_schedule),
        )
        .with_state(profile_state);

    let mut router = Router::new()
        .nest("/api/v1/charge-points", charge_point_routes)
        .route(
            "/health",
            get(health::health_check).with_state(health_state),
        )
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );

    if let Some(handle) = options.metrics {
        router = router.route("/metrics", get(prometheus_metrics).with_state(handle));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_profile_routes() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/v1/charge-points/{charge_point_id}/charging-profiles"));
        assert!(paths.contains_key("/api/v1/charge-points/{charge_point_id}/composite-schedule"));
        assert!(paths.contains_key("/health"));
    }
}
