//! End-to-end behaviour of the charging profile service and its REST binding.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tower::Service;

use texnouz_smart_charging::config::ProfileSettings;
use texnouz_smart_charging::domain::charging_profile::{
    ChargingProfile, ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit,
    ChargingSchedule, ChargingSchedulePeriod, ClearCriteria, ProfileFilter,
};
use texnouz_smart_charging::domain::DomainError;
use texnouz_smart_charging::interfaces::http::{create_api_router, RouterOptions};
use texnouz_smart_charging::shared::time::FixedClock;
use texnouz_smart_charging::{ChargingProfileService, InMemoryChargingProfileRepository};

const CP: &str = "CP001";

fn service() -> Arc<ChargingProfileService> {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    Arc::new(ChargingProfileService::with_clock(
        Arc::new(InMemoryChargingProfileRepository::new()),
        Arc::new(FixedClock(now)),
        ProfileSettings::default(),
    ))
}

fn profile(
    id: i32,
    purpose: ChargingProfilePurpose,
    stack_level: i32,
    unit: ChargingRateUnit,
    periods: &[(i32, f64)],
) -> ChargingProfile {
    ChargingProfile {
        charge_point_id: CP.into(),
        charging_profile_id: id,
        connector_id: 0,
        stack_level,
        purpose,
        kind: ChargingProfileKind::Absolute,
        recurrency_kind: None,
        transaction_id: None,
        valid_from: None,
        valid_to: None,
        schedule: ChargingSchedule {
            duration_seconds: None,
            start_schedule: None,
            rate_unit: unit,
            periods: periods
                .iter()
                .map(|&(start, limit)| ChargingSchedulePeriod::new(start, limit))
                .collect(),
            min_charging_rate: None,
        },
    }
}

// ── Service scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn tx_default_profile_in_watts_over_two_hours() {
    let svc = service();
    svc.set_charging_profile(
        CP,
        1,
        profile(
            100,
            ChargingProfilePurpose::TxDefaultProfile,
            0,
            ChargingRateUnit::W,
            &[(0, 11000.0), (3600, 7000.0)],
        ),
    )
    .await
    .unwrap();

    let composite = svc
        .get_composite_schedule(CP, 1, Some(7200), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(composite.rate_unit, ChargingRateUnit::W);
    assert_eq!(composite.duration_seconds, 7200);
    assert_eq!(composite.charging_profile_id, 100);
    assert_eq!(
        composite.periods,
        vec![
            ChargingSchedulePeriod::new(0, 11000.0),
            ChargingSchedulePeriod::new(3600, 7000.0),
        ]
    );
}

#[tokio::test]
async fn no_profiles_means_no_schedule() {
    let svc = service();
    let composite = svc
        .get_composite_schedule(CP, 1, Some(3600), None)
        .await
        .unwrap();
    assert!(composite.is_none());
}

#[tokio::test]
async fn station_wide_profile_applies_to_every_connector() {
    let svc = service();
    svc.set_charging_profile(
        CP,
        0,
        profile(
            1,
            ChargingProfilePurpose::TxDefaultProfile,
            0,
            ChargingRateUnit::A,
            &[(0, 32.0)],
        ),
    )
    .await
    .unwrap();

    for connector_id in [1, 2, 7] {
        let composite = svc
            .get_composite_schedule(CP, connector_id, Some(3600), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(composite.charging_profile_id, 1);
        assert_eq!(composite.connector_id, connector_id);
    }
}

#[tokio::test]
async fn purpose_outranks_stack_level_across_connectors() {
    let svc = service();
    svc.set_charging_profile(
        CP,
        1,
        profile(
            1,
            ChargingProfilePurpose::TxProfile,
            99,
            ChargingRateUnit::A,
            &[(0, 10.0)],
        ),
    )
    .await
    .unwrap();
    svc.set_charging_profile(
        CP,
        0,
        profile(
            2,
            ChargingProfilePurpose::TxDefaultProfile,
            0,
            ChargingRateUnit::A,
            &[(0, 20.0)],
        ),
    )
    .await
    .unwrap();

    let composite = svc
        .get_composite_schedule(CP, 1, Some(3600), None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(composite.charging_profile_id, 2);
}

#[tokio::test]
async fn empty_schedule_is_rejected_before_storage() {
    let svc = service();
    let err = svc
        .set_charging_profile(
            CP,
            1,
            profile(
                1,
                ChargingProfilePurpose::TxProfile,
                0,
                ChargingRateUnit::W,
                &[],
            ),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::Validation(_)));
    assert!(svc
        .get_charging_profiles(CP, &ProfileFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn clearing_removes_profile_from_composite() {
    let svc = service();
    svc.set_charging_profile(
        CP,
        1,
        profile(
            5,
            ChargingProfilePurpose::TxProfile,
            0,
            ChargingRateUnit::W,
            &[(0, 7400.0)],
        ),
    )
    .await
    .unwrap();

    assert_eq!(
        svc.clear_charging_profile(CP, &ClearCriteria::by_id(5))
            .await
            .unwrap(),
        1
    );
    assert!(svc
        .get_composite_schedule(CP, 1, Some(3600), None)
        .await
        .unwrap()
        .is_none());
}

// ── REST binding ───────────────────────────────────────────────────

fn app() -> Router {
    create_api_router(RouterOptions {
        service: service(),
        backend: "memory",
        metrics: None,
    })
}

async fn call(app: &Router, req: Request<Body>) -> Response<Body> {
    let mut svc = app.clone().into_service();
    svc.call(req).await.unwrap()
}

async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn put_profile(body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(format!("/api/v1/charge-points/{}/charging-profiles", CP))
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn tx_default_body() -> Value {
    json!({
        "connector_id": 1,
        "charging_profile": {
            "charging_profile_id": 100,
            "stack_level": 0,
            "purpose": "TxDefaultProfile",
            "kind": "Absolute",
            "charging_schedule": {
                "rate_unit": "W",
                "periods": [
                    {"start_period": 0, "limit": 11000.0},
                    {"start_period": 3600, "limit": 7000.0}
                ]
            }
        }
    })
}

#[tokio::test]
async fn http_set_then_composite() {
    let app = app();

    let resp = call(&app, put_profile(tx_default_body())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "Accepted");

    let resp = call(
        &app,
        get("/api/v1/charge-points/CP001/composite-schedule?connector_id=1&duration=7200&charging_rate_unit=W"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["data"]["status"], "Accepted");
    assert_eq!(body["data"]["schedule"]["rate_unit"], "W");
    assert_eq!(
        body["data"]["schedule"]["periods"].as_array().unwrap().len(),
        2
    );
}

#[tokio::test]
async fn http_composite_without_profiles_is_no_schedule() {
    let resp = call(
        &app(),
        get("/api/v1/charge-points/CP001/composite-schedule?connector_id=1"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["data"]["status"], "NoSchedule");
    assert!(body["data"]["schedule"].is_null());
}

#[tokio::test]
async fn http_composite_unit_defaults_to_amperes() {
    let app = app();
    call(&app, put_profile(tx_default_body())).await;

    // Only a W profile is stored, so the implicit A request finds nothing.
    let resp = call(
        &app,
        get("/api/v1/charge-points/CP001/composite-schedule?connector_id=1"),
    )
    .await;
    assert_eq!(json_body(resp).await["data"]["status"], "NoSchedule");

    let mut body = tx_default_body();
    body["charging_profile"]["charging_profile_id"] = json!(101);
    body["charging_profile"]["charging_schedule"]["rate_unit"] = json!("A");
    body["charging_profile"]["charging_schedule"]["periods"] =
        json!([{"start_period": 0, "limit": 16.0}]);
    call(&app, put_profile(body)).await;

    let resp = call(
        &app,
        get("/api/v1/charge-points/CP001/composite-schedule?connector_id=1"),
    )
    .await;
    let body = json_body(resp).await;
    assert_eq!(body["data"]["status"], "Accepted");
    assert_eq!(body["data"]["schedule"]["rate_unit"], "A");
    assert_eq!(body["data"]["schedule"]["charging_profile_id"], 101);
}

#[tokio::test]
async fn http_list_filters_and_clear() {
    let app = app();
    call(&app, put_profile(tx_default_body())).await;

    let resp = call(
        &app,
        get("/api/v1/charge-points/CP001/charging-profiles?purpose=TxDefaultProfile&connector_id=1"),
    )
    .await;
    let body = json_body(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["charge_point_id"], "CP001");

    let resp = call(
        &app,
        get("/api/v1/charge-points/CP001/charging-profiles?purpose=TxProfile"),
    )
    .await;
    assert!(json_body(resp).await["data"].as_array().unwrap().is_empty());

    let resp = call(&app, delete("/api/v1/charge-points/CP001/charging-profiles?id=100")).await;
    let body = json_body(resp).await;
    assert_eq!(body["data"]["cleared"], 1);
    assert_eq!(body["data"]["status"], "Accepted");

    let resp = call(&app, delete("/api/v1/charge-points/CP001/charging-profiles?id=100")).await;
    let body = json_body(resp).await;
    assert_eq!(body["data"]["cleared"], 0);
    assert_eq!(body["data"]["status"], "Unknown");
}

#[tokio::test]
async fn http_invalid_profile_is_422() {
    let mut body = tx_default_body();
    body["charging_profile"]["charging_schedule"]["periods"] = json!([]);

    let resp = call(&app(), put_profile(body)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(resp).await["success"], false);
}

#[tokio::test]
async fn http_negative_connector_is_422() {
    let mut body = tx_default_body();
    body["connector_id"] = json!(-1);

    let resp = call(&app(), put_profile(body)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn http_malformed_json_is_400() {
    let req = Request::builder()
        .method("PUT")
        .uri("/api/v1/charge-points/CP001/charging-profiles")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = call(&app(), req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn http_zero_duration_is_422() {
    let resp = call(
        &app(),
        get("/api/v1/charge-points/CP001/composite-schedule?connector_id=1&duration=0"),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn http_health_reports_backend() {
    let resp = call(&app(), get("/health")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"]["backend"], "memory");
}

#[tokio::test]
async fn http_openapi_document_is_served() {
    let resp = call(&app(), get("/api-docs/openapi.json")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(body["paths"]
        .as_object()
        .unwrap()
        .contains_key("/api/v1/charge-points/{charge_point_id}/composite-schedule"));
}
