//! JSON document store for charging profiles
//!
//! Layout: `<root>/<hex(charge_point_id)>/<charging_profile_id>.json`, one
//! document per profile. Station ids are hex-encoded so any id is a valid
//! directory name.

mod store;

pub use store::{DocumentChargingProfileRepository, ProfileDocument};
