//! Charging profile DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::charging_profile::{
    ChargingProfile, ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit,
    ChargingSchedule, ClearCriteria, CompositeSchedule, ProfileFilter, RecurrencyKind,
};

/// SetChargingProfile request body
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetChargingProfileRequest {
    /// Target connector (0 = whole station)
    #[validate(range(min = 0, message = "connector_id must be >= 0"))]
    pub connector_id: i32,
    #[validate(nested)]
    pub charging_profile: ChargingProfileBody,
}

/// Charging profile as sent by the caller; station and connector come from
/// the request path and body.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChargingProfileBody {
    pub charging_profile_id: i32,
    #[validate(range(min = 0, message = "stack_level must be >= 0"))]
    pub stack_level: i32,
    pub purpose: ChargingProfilePurpose,
    pub kind: ChargingProfileKind,
    pub recurrency_kind: Option<RecurrencyKind>,
    pub transaction_id: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub charging_schedule: ChargingSchedule,
}

impl ChargingProfileBody {
    pub fn into_profile(self, charge_point_id: &str, connector_id: i32) -> ChargingProfile {
        ChargingProfile {
            charge_point_id: charge_point_id.to_string(),
            charging_profile_id: self.charging_profile_id,
            connector_id,
            stack_level: self.stack_level,
            purpose: self.purpose,
            kind: self.kind,
            recurrency_kind: self.recurrency_kind,
            transaction_id: self.transaction_id,
            valid_from: self.valid_from,
            valid_to: self.valid_to,
            schedule: self.charging_schedule,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetChargingProfileResponse {
    /// Always `Accepted`; failures are reported as errors.
    pub status: String,
    pub charging_profile_id: i32,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ChargingProfileQueryParams {
    pub connector_id: Option<i32>,
    pub purpose: Option<ChargingProfilePurpose>,
    pub stack_level: Option<i32>,
}

impl From<&ChargingProfileQueryParams> for ProfileFilter {
    fn from(p: &ChargingProfileQueryParams) -> Self {
        ProfileFilter {
            connector_id: p.connector_id,
            purpose: p.purpose,
            stack_level: p.stack_level,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClearChargingProfileParams {
    /// Charging profile id
    pub id: Option<i32>,
    pub connector_id: Option<i32>,
    pub purpose: Option<ChargingProfilePurpose>,
    pub stack_level: Option<i32>,
}

impl From<&ClearChargingProfileParams> for ClearCriteria {
    fn from(p: &ClearChargingProfileParams) -> Self {
        ClearCriteria {
            charging_profile_id: p.id,
            filter: ProfileFilter {
                connector_id: p.connector_id,
                purpose: p.purpose,
                stack_level: p.stack_level,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClearChargingProfileResponse {
    /// `Accepted` when at least one profile was removed, `Unknown` otherwise.
    pub status: String,
    pub cleared: u64,
}

impl ClearChargingProfileResponse {
    pub fn from_count(cleared: u64) -> Self {
        let status = if cleared > 0 { "Accepted" } else { "Unknown" };
        Self {
            status: status.to_string(),
            cleared,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CompositeScheduleParams {
    pub connector_id: i32,
    /// Window length in seconds; server default when omitted
    pub duration: Option<i32>,
    /// Unit to report and filter by; `A` when omitted
    #[serde(default = "default_charging_rate_unit")]
    pub charging_rate_unit: ChargingRateUnit,
}

fn default_charging_rate_unit() -> ChargingRateUnit {
    ChargingRateUnit::A
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompositeScheduleResponse {
    /// `Accepted` or `NoSchedule`
    pub status: String,
    pub schedule: Option<CompositeSchedule>,
}

impl From<Option<CompositeSchedule>> for CompositeScheduleResponse {
    fn from(schedule: Option<CompositeSchedule>) -> Self {
        let status = if schedule.is_some() { "Accepted" } else { "NoSchedule" };
        Self {
            status: status.to_string(),
            schedule,
        }
    }
}
