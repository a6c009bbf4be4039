//! Infrastructure layer - storage backends for charging profiles

pub mod database;
pub mod document;
pub mod storage;

pub use database::{init_database, DatabaseConfig, SeaOrmChargingProfileRepository};
pub use document::DocumentChargingProfileRepository;
pub use storage::InMemoryChargingProfileRepository;
