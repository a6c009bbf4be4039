//! Composite schedule resolution
//!
//! Picks a single winning profile among those applicable to a connector and
//! projects its schedule onto the requested window. Profiles are not blended:
//! a ChargePointMaxProfile and a TxProfile active at the same time do not
//! combine, the higher-ranked one is returned as is.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::model::{ChargingProfile, ChargingRateUnit, ChargingSchedulePeriod};

/// Parameters of a GetCompositeSchedule request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeScheduleRequest {
    pub connector_id: i32,
    pub duration_seconds: i32,
    /// When set, profiles in another unit are not candidates.
    pub rate_unit: Option<ChargingRateUnit>,
}

/// Effective schedule for a connector, derived on demand and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CompositeSchedule {
    pub connector_id: i32,
    /// Profile the schedule was taken from.
    pub charging_profile_id: i32,
    pub start_schedule: DateTime<Utc>,
    pub duration_seconds: i32,
    pub rate_unit: ChargingRateUnit,
    pub periods: Vec<ChargingSchedulePeriod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_charging_rate: Option<f64>,
}

/// Resolve the composite schedule for `request` from `records`.
///
/// `records` is typically the union of the connector's own profiles and the
/// station-wide ones; duplicates by `charging_profile_id` are ignored after
/// their first occurrence. Returns `None` when no profile applies.
pub fn resolve_composite(
    records: &[ChargingProfile],
    request: &CompositeScheduleRequest,
    now: DateTime<Utc>,
) -> Option<CompositeSchedule> {
    let mut seen = HashSet::new();

    let winner = records
        .iter()
        .filter(|p| seen.insert(p.charging_profile_id))
        .filter(|p| p.applies_to_connector(request.connector_id))
        .filter(|p| {
            request
                .rate_unit
                .map_or(true, |unit| p.schedule.rate_unit == unit)
        })
        .min_by(|a, b| rank(a, b))?;

    let periods = winner
        .schedule
        .periods
        .iter()
        .filter(|period| period.start_period < request.duration_seconds)
        .cloned()
        .collect();

    Some(CompositeSchedule {
        connector_id: request.connector_id,
        charging_profile_id: winner.charging_profile_id,
        start_schedule: now,
        duration_seconds: request.duration_seconds,
        rate_unit: request.rate_unit.unwrap_or(winner.schedule.rate_unit),
        periods,
        min_charging_rate: winner.schedule.min_charging_rate,
    })
}

/// Total order where the preferred profile sorts first: purpose priority
/// desc, stack level desc, then profile id asc.
fn rank(a: &ChargingProfile, b: &ChargingProfile) -> Ordering {
    b.purpose
        .priority()
        .cmp(&a.purpose.priority())
        .then_with(|| b.stack_level.cmp(&a.stack_level))
        .then_with(|| a.charging_profile_id.cmp(&b.charging_profile_id))
}
