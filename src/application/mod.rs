pub mod services;

pub use services::ChargingProfileService;
