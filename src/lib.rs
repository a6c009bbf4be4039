//! # Texnouz Smart Charging
//!
//! Charging profile store and composite schedule resolution for OCPP
//! charge points.
//!
//! ## Architecture
//!
//! - **domain**: charging profile model, repository contract, composite resolver
//! - **application**: `ChargingProfileService`, the entry point for callers
//! - **infrastructure**: in-memory, document and SeaORM repository backends
//! - **interfaces**: REST API with OpenAPI document
//! - **server**: runtime wiring and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use application::ChargingProfileService;
pub use infrastructure::{
    init_database, DatabaseConfig, DocumentChargingProfileRepository,
    InMemoryChargingProfileRepository, SeaOrmChargingProfileRepository,
};
pub use interfaces::http::create_api_router;
