//! ChargingProfile domain entity

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{DomainError, DomainResult};

/// Connector id that addresses the whole charge point.
pub const STATION_WIDE_CONNECTOR: i32 = 0;

/// Charging profile purpose
///
/// Precedence is fixed: `ChargePointMaxProfile` > `TxDefaultProfile` >
/// `TxProfile`, regardless of stack level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ChargingProfilePurpose {
    ChargePointMaxProfile,
    TxDefaultProfile,
    TxProfile,
}

impl ChargingProfilePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChargePointMaxProfile => "ChargePointMaxProfile",
            Self::TxDefaultProfile => "TxDefaultProfile",
            Self::TxProfile => "TxProfile",
        }
    }

    /// Rank used by composite resolution; higher wins.
    ///
    /// Fixed precedence ChargePointMaxProfile > TxDefaultProfile > TxProfile,
    /// compared before stack level: a TxDefaultProfile at stack level 0 beats
    /// a TxProfile at any stack level.
    pub fn priority(&self) -> u8 {
        match self {
            Self::ChargePointMaxProfile => 3,
            Self::TxDefaultProfile => 2,
            Self::TxProfile => 1,
        }
    }
}

impl FromStr for ChargingProfilePurpose {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ChargePointMaxProfile" => Ok(Self::ChargePointMaxProfile),
            "TxDefaultProfile" => Ok(Self::TxDefaultProfile),
            "TxProfile" => Ok(Self::TxProfile),
            other => Err(DomainError::Validation(format!(
                "unknown charging profile purpose '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ChargingProfilePurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Charging profile kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ChargingProfileKind {
    Absolute,
    Relative,
    Recurring,
}

impl ChargingProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absolute => "Absolute",
            Self::Relative => "Relative",
            Self::Recurring => "Recurring",
        }
    }
}

impl FromStr for ChargingProfileKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Absolute" => Ok(Self::Absolute),
            "Relative" => Ok(Self::Relative),
            "Recurring" => Ok(Self::Recurring),
            other => Err(DomainError::Validation(format!(
                "unknown charging profile kind '{}'",
                other
            ))),
        }
    }
}

/// Recurrency kind, only meaningful for `Recurring` profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RecurrencyKind {
    Daily,
    Weekly,
}

impl RecurrencyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
        }
    }
}

impl FromStr for RecurrencyKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Daily" => Ok(Self::Daily),
            "Weekly" => Ok(Self::Weekly),
            other => Err(DomainError::Validation(format!(
                "unknown recurrency kind '{}'",
                other
            ))),
        }
    }
}

/// Unit in which schedule limits are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ChargingRateUnit {
    /// Watts
    W,
    /// Amperes
    A,
}

impl ChargingRateUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::W => "W",
            Self::A => "A",
        }
    }
}

impl FromStr for ChargingRateUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "W" => Ok(Self::W),
            "A" => Ok(Self::A),
            _ => Err(DomainError::Validation(format!(
                "unknown charging rate unit '{}'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ChargingRateUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of a charging schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChargingSchedulePeriod {
    /// Offset in seconds from the start of the schedule.
    pub start_period: i32,
    /// Power or current limit, in the schedule's rate unit.
    pub limit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_phases: Option<i32>,
}

impl ChargingSchedulePeriod {
    pub fn new(start_period: i32, limit: f64) -> Self {
        Self {
            start_period,
            limit,
            number_phases: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChargingSchedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_schedule: Option<DateTime<Utc>>,
    pub rate_unit: ChargingRateUnit,
    /// Ordered by ascending `start_period`.
    pub periods: Vec<ChargingSchedulePeriod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_charging_rate: Option<f64>,
}

/// Stored charging profile record.
///
/// Identified by `(charge_point_id, charging_profile_id)`; storing a profile
/// with an existing identity replaces the previous record entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChargingProfile {
    /// Charge point this profile is installed on.
    pub charge_point_id: String,
    /// Profile ID from the OCPP ChargingProfile object.
    pub charging_profile_id: i32,
    /// Connector ID (0 = station-wide).
    pub connector_id: i32,
    /// Stack level (higher = higher priority within a purpose).
    pub stack_level: i32,
    pub purpose: ChargingProfilePurpose,
    pub kind: ChargingProfileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrency_kind: Option<RecurrencyKind>,
    /// Running transaction, TxProfile only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    pub schedule: ChargingSchedule,
}

impl ChargingProfile {
    /// Whether this profile applies when resolving for `connector_id`.
    pub fn applies_to_connector(&self, connector_id: i32) -> bool {
        self.connector_id == connector_id || self.connector_id == STATION_WIDE_CONNECTOR
    }

    /// Check the record before it is handed to a repository.
    pub fn validate(&self) -> DomainResult<()> {
        if self.charge_point_id.trim().is_empty() {
            return Err(invalid("charge_point_id must not be empty"));
        }
        if self.connector_id < 0 {
            return Err(invalid(format!(
                "connector_id must be >= 0, got {}",
                self.connector_id
            )));
        }
        if self.stack_level < 0 {
            return Err(invalid(format!(
                "stack_level must be >= 0, got {}",
                self.stack_level
            )));
        }

        match (self.kind, self.recurrency_kind) {
            (ChargingProfileKind::Recurring, None) => {
                return Err(invalid("Recurring profiles require recurrency_kind"));
            }
            (ChargingProfileKind::Absolute | ChargingProfileKind::Relative, Some(_)) => {
                return Err(invalid(format!(
                    "recurrency_kind is only allowed for Recurring profiles, kind is {}",
                    self.kind.as_str()
                )));
            }
            _ => {}
        }

        if self.transaction_id.is_some() && self.purpose != ChargingProfilePurpose::TxProfile {
            return Err(invalid(format!(
                "transaction_id is only allowed on TxProfile, purpose is {}",
                self.purpose
            )));
        }

        if let (Some(from), Some(to)) = (self.valid_from, self.valid_to) {
            if from >= to {
                return Err(invalid("valid_from must be before valid_to"));
            }
        }

        self.schedule.validate()
    }
}

impl ChargingSchedule {
    pub fn validate(&self) -> DomainResult<()> {
        if self.periods.is_empty() {
            return Err(invalid("charging schedule must contain at least one period"));
        }
        if let Some(d) = self.duration_seconds {
            if d <= 0 {
                return Err(invalid(format!("schedule duration must be > 0, got {}", d)));
            }
        }
        if let Some(rate) = self.min_charging_rate {
            if !rate.is_finite() || rate < 0.0 {
                return Err(invalid(format!("invalid min_charging_rate {}", rate)));
            }
        }

        let mut previous: Option<i32> = None;
        for period in &self.periods {
            if period.start_period < 0 {
                return Err(invalid(format!(
                    "start_period must be >= 0, got {}",
                    period.start_period
                )));
            }
            if let Some(prev) = previous {
                if period.start_period <= prev {
                    return Err(invalid(format!(
                        "periods must be strictly ascending by start_period ({} after {})",
                        period.start_period, prev
                    )));
                }
            }
            if !period.limit.is_finite() || period.limit < 0.0 {
                return Err(invalid(format!(
                    "invalid limit {} at start_period {}",
                    period.limit, period.start_period
                )));
            }
            if let Some(phases) = period.number_phases {
                if !(1..=3).contains(&phases) {
                    return Err(invalid(format!(
                        "number_phases must be 1..=3, got {}",
                        phases
                    )));
                }
            }
            previous = Some(period.start_period);
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> DomainError {
    DomainError::Validation(msg.into())
}
