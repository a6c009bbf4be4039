//! ChargingProfile entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "charging_profiles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Unique together with `charging_profile_id`.
    pub charge_point_id: String,

    /// Profile ID from the OCPP ChargingProfile object.
    pub charging_profile_id: i32,

    /// Connector ID (0 = station-wide).
    pub connector_id: i32,

    pub stack_level: i32,

    /// ChargingProfilePurpose: ChargePointMaxProfile, TxDefaultProfile, TxProfile.
    pub purpose: String,

    /// ChargingProfileKind: Absolute, Recurring, Relative.
    pub kind: String,

    /// RecurrencyKind: Daily, Weekly (nullable).
    #[sea_orm(nullable)]
    pub recurrency_kind: Option<String>,

    #[sea_orm(nullable)]
    pub transaction_id: Option<i32>,

    #[sea_orm(nullable)]
    pub valid_from: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub valid_to: Option<DateTimeUtc>,

    /// ChargingSchedule serialized as JSON.
    #[sea_orm(column_type = "Text")]
    pub schedule_json: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
