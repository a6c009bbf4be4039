pub mod charging_profile;

pub use charging_profile::{
    ChargingProfile, ChargingProfilePurpose, ChargingProfileRepository, ChargingRateUnit,
    ClearCriteria, CompositeSchedule, ProfileFilter,
};

// Re-export DomainError from shared for convenience
pub use crate::shared::errors::{DomainError, DomainResult};
