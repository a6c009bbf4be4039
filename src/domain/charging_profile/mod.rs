//! Charging profile aggregate
//!
//! Contains the ChargingProfile entity, the repository interface, and the
//! composite schedule resolver.

pub mod composite;
pub mod model;
pub mod repository;

pub use composite::{resolve_composite, CompositeSchedule, CompositeScheduleRequest};
pub use model::{
    ChargingProfile, ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit,
    ChargingSchedule, ChargingSchedulePeriod, RecurrencyKind, STATION_WIDE_CONNECTOR,
};
pub use repository::{sort_profiles, ChargingProfileRepository, ClearCriteria, ProfileFilter};
