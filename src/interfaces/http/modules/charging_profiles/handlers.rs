//! Charging profile handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;

use super::dto::{
    ChargingProfileQueryParams, ClearChargingProfileParams, ClearChargingProfileResponse,
    CompositeScheduleParams, CompositeScheduleResponse, SetChargingProfileRequest,
    SetChargingProfileResponse,
};
use crate::application::ChargingProfileService;
use crate::domain::charging_profile::ChargingProfile;
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};

#[derive(Clone)]
pub struct ChargingProfileState {
    pub service: Arc<ChargingProfileService>,
}

#[utoipa::path(
    put,
    path = "/api/v1/charge-points/{charge_point_id}/charging-profiles",
    tag = "Charging Profiles",
    params(("charge_point_id" = String, Path, description = "Charge point ID")),
    request_body = SetChargingProfileRequest,
    responses(
        (status = 200, description = "Profile installed", body = ApiResponse<SetChargingProfileResponse>),
        (status = 400, description = "Malformed JSON"),
        (status = 422, description = "Invalid profile"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn set_charging_profile(
    State(state): State<ChargingProfileState>,
    Path(charge_point_id): Path<String>,
    ValidatedJson(request): ValidatedJson<SetChargingProfileRequest>,
) -> Result<Json<ApiResponse<SetChargingProfileResponse>>, ApiError> {
    let connector_id = request.connector_id;
    let profile = request
        .charging_profile
        .into_profile(&charge_point_id, connector_id);
    let charging_profile_id = profile.charging_profile_id;

    state
        .service
        .set_charging_profile(&charge_point_id, connector_id, profile)
        .await?;

    Ok(Json(ApiResponse::success(SetChargingProfileResponse {
        status: "Accepted".to_string(),
        charging_profile_id,
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/charge-points/{charge_point_id}/charging-profiles",
    tag = "Charging Profiles",
    params(
        ("charge_point_id" = String, Path, description = "Charge point ID"),
        ChargingProfileQueryParams
    ),
    responses(
        (status = 200, description = "Matching profiles", body = ApiResponse<Vec<ChargingProfile>>),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn get_charging_profiles(
    State(state): State<ChargingProfileState>,
    Path(charge_point_id): Path<String>,
    Query(params): Query<ChargingProfileQueryParams>,
) -> Result<Json<ApiResponse<Vec<ChargingProfile>>>, ApiError> {
    let profiles = state
        .service
        .get_charging_profiles(&charge_point_id, &(&params).into())
        .await?;
    Ok(Json(ApiResponse::success(profiles)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/charge-points/{charge_point_id}/charging-profiles",
    tag = "Charging Profiles",
    params(
        ("charge_point_id" = String, Path, description = "Charge point ID"),
        ClearChargingProfileParams
    ),
    responses(
        (status = 200, description = "Number of profiles removed", body = ApiResponse<ClearChargingProfileResponse>),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn clear_charging_profile(
    State(state): State<ChargingProfileState>,
    Path(charge_point_id): Path<String>,
    Query(params): Query<ClearChargingProfileParams>,
) -> Result<Json<ApiResponse<ClearChargingProfileResponse>>, ApiError> {
    let cleared = state
        .service
        .clear_charging_profile(&charge_point_id, &(&params).into())
        .await?;
    Ok(Json(ApiResponse::success(
        ClearChargingProfileResponse::from_count(cleared),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/charge-points/{charge_point_id}/composite-schedule",
    tag = "Charging Profiles",
    params(
        ("charge_point_id" = String, Path, description = "Charge point ID"),
        CompositeScheduleParams
    ),
    responses(
        (status = 200, description = "Composite schedule or NoSchedule", body = ApiResponse<CompositeScheduleResponse>),
        (status = 422, description = "Invalid connector or duration"),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn get_composite_schedule(
    State(state): State<ChargingProfileState>,
    Path(charge_point_id): Path<String>,
    Query(params): Query<CompositeScheduleParams>,
) -> Result<Json<ApiResponse<CompositeScheduleResponse>>, ApiError> {
    let schedule = state
        .service
        .get_composite_schedule(
            &charge_point_id,
            params.connector_id,
            params.duration,
            Some(params.charging_rate_unit),
        )
        .await?;
    Ok(Json(ApiResponse::success(schedule.into())))
}
