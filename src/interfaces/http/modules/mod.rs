pub mod charging_profiles;
pub mod health;
pub mod metrics;
