//! Database entities module

pub mod charging_profile;

pub use charging_profile::Entity as ChargingProfile;
