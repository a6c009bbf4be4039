//! ChargingProfile repository interface
//!
//! Every backend implements the same contract:
//!
//! - `set` upserts by `(charge_point_id, charging_profile_id)` with full
//!   replacement.
//! - `query` applies each present filter as an equality predicate and returns
//!   records ordered by `(stack_level, charging_profile_id)` ascending.
//! - `clear` with a profile id deletes that record only when it also matches
//!   the other filters; without an id it deletes every `query` match.
//! - Absence is never an error: empty lists, `None` and a count of 0.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::model::{ChargingProfile, ChargingProfilePurpose};
use crate::domain::DomainResult;

/// Optional equality filters. `None` fields impose no constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFilter {
    pub connector_id: Option<i32>,
    pub purpose: Option<ChargingProfilePurpose>,
    pub stack_level: Option<i32>,
}

impl ProfileFilter {
    pub fn connector(connector_id: i32) -> Self {
        Self {
            connector_id: Some(connector_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, profile: &ChargingProfile) -> bool {
        self.connector_id.map_or(true, |c| profile.connector_id == c)
            && self.purpose.map_or(true, |p| profile.purpose == p)
            && self.stack_level.map_or(true, |s| profile.stack_level == s)
    }
}

/// Criteria for `ClearChargingProfile`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCriteria {
    pub charging_profile_id: Option<i32>,
    #[serde(flatten)]
    pub filter: ProfileFilter,
}

impl ClearCriteria {
    pub fn by_id(charging_profile_id: i32) -> Self {
        Self {
            charging_profile_id: Some(charging_profile_id),
            filter: ProfileFilter::default(),
        }
    }

    pub fn matches(&self, profile: &ChargingProfile) -> bool {
        self.charging_profile_id
            .map_or(true, |id| profile.charging_profile_id == id)
            && self.filter.matches(profile)
    }
}

/// Canonical result order shared by all backends.
pub fn sort_profiles(profiles: &mut [ChargingProfile]) {
    profiles.sort_by_key(|p| (p.stack_level, p.charging_profile_id));
}

#[async_trait]
pub trait ChargingProfileRepository: Send + Sync {
    /// Insert or fully replace a profile.
    async fn set(&self, profile: ChargingProfile) -> DomainResult<()>;

    /// Look up one profile by its identity.
    async fn find(
        &self,
        charge_point_id: &str,
        charging_profile_id: i32,
    ) -> DomainResult<Option<ChargingProfile>>;

    /// Profiles of a charge point matching every present filter.
    async fn query(
        &self,
        charge_point_id: &str,
        filter: &ProfileFilter,
    ) -> DomainResult<Vec<ChargingProfile>>;

    /// Delete matching profiles and return how many were removed.
    ///
    /// If `cancel` fires while a bulk delete is in progress the call stops
    /// early and the returned count covers only what was actually deleted.
    async fn clear(
        &self,
        charge_point_id: &str,
        criteria: &ClearCriteria,
        cancel: &CancellationToken,
    ) -> DomainResult<u64>;
}
