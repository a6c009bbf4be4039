//! In-memory charging profile store

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::charging_profile::{
    sort_profiles, ChargingProfile, ChargingProfileRepository, ClearCriteria, ProfileFilter,
};
use crate::domain::DomainResult;

/// In-memory storage for development and testing.
///
/// Profiles are sharded per charge point; each station's map is guarded by
/// its DashMap entry lock, so a single `set` or `clear` is atomic with
/// respect to other calls for the same station.
#[derive(Default)]
pub struct InMemoryChargingProfileRepository {
    stations: DashMap<String, BTreeMap<i32, ChargingProfile>>,
}

impl InMemoryChargingProfileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored profiles across all stations.
    pub fn len(&self) -> usize {
        self.stations.iter().map(|s| s.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ChargingProfileRepository for InMemoryChargingProfileRepository {
    async fn set(&self, profile: ChargingProfile) -> DomainResult<()> {
        debug!(
            charge_point_id = %profile.charge_point_id,
            profile_id = profile.charging_profile_id,
            "Storing charging profile in memory"
        );
        self.stations
            .entry(profile.charge_point_id.clone())
            .or_default()
            .insert(profile.charging_profile_id, profile);
        Ok(())
    }

    async fn find(
        &self,
        charge_point_id: &str,
        charging_profile_id: i32,
    ) -> DomainResult<Option<ChargingProfile>> {
        Ok(self
            .stations
            .get(charge_point_id)
            .and_then(|profiles| profiles.get(&charging_profile_id).cloned()))
    }

    async fn query(
        &self,
        charge_point_id: &str,
        filter: &ProfileFilter,
    ) -> DomainResult<Vec<ChargingProfile>> {
        let mut found: Vec<ChargingProfile> = match self.stations.get(charge_point_id) {
            Some(profiles) => profiles
                .values()
                .filter(|p| filter.matches(p))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        sort_profiles(&mut found);
        Ok(found)
    }

    async fn clear(
        &self,
        charge_point_id: &str,
        criteria: &ClearCriteria,
        cancel: &CancellationToken,
    ) -> DomainResult<u64> {
        if cancel.is_cancelled() {
            debug!(charge_point_id, "Clear cancelled before start");
            return Ok(0);
        }

        let Some(mut profiles) = self.stations.get_mut(charge_point_id) else {
            return Ok(0);
        };

        let before = profiles.len();
        profiles.retain(|_, p| !criteria.matches(p));
        let removed = (before - profiles.len()) as u64;
        let now_empty = profiles.is_empty();
        drop(profiles);

        if now_empty {
            self.stations.remove_if(charge_point_id, |_, p| p.is_empty());
        }

        debug!(charge_point_id, removed, "Cleared charging profiles from memory");
        Ok(removed)
    }
}
