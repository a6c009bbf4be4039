//! Charging profiles module: SetChargingProfile, GetChargingProfiles,
//! ClearChargingProfile and GetCompositeSchedule over REST

pub mod dto;
pub mod handlers;

pub use dto::*;
pub use handlers::*;
