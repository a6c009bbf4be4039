//! Database repository implementations

pub mod charging_profile_repository;

pub use charging_profile_repository::SeaOrmChargingProfileRepository;
