//! Application services

mod charging_profile;

pub use charging_profile::ChargingProfileService;
