//! Charging profile business logic service
//!
//! Front door for SetChargingProfile, GetChargingProfiles,
//! ClearChargingProfile and GetCompositeSchedule. Validates writes, applies
//! per-call deadlines to the repository and feeds the resolver with the
//! current time.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProfileSettings;
use crate::domain::charging_profile::{
    resolve_composite, ChargingProfile, ChargingProfileRepository, ChargingRateUnit,
    ClearCriteria, CompositeSchedule, CompositeScheduleRequest, ProfileFilter,
    STATION_WIDE_CONNECTOR,
};
use crate::domain::{DomainError, DomainResult};
use crate::shared::time::{Clock, SystemClock};

/// Service for charging profile operations
pub struct ChargingProfileService {
    repo: Arc<dyn ChargingProfileRepository>,
    clock: Arc<dyn Clock>,
    settings: ProfileSettings,
}

impl ChargingProfileService {
    pub fn new(repo: Arc<dyn ChargingProfileRepository>, settings: ProfileSettings) -> Self {
        Self::with_clock(repo, Arc::new(SystemClock), settings)
    }

    pub fn with_clock(
        repo: Arc<dyn ChargingProfileRepository>,
        clock: Arc<dyn Clock>,
        settings: ProfileSettings,
    ) -> Self {
        Self {
            repo,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &ProfileSettings {
        &self.settings
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.request_timeout_ms)
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, fut: F) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        let timeout = self.request_timeout();
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_ms = timeout.as_millis() as u64, "Repository call timed out");
                metrics::counter!("charging_profile_timeouts_total", "operation" => operation)
                    .increment(1);
                Err(DomainError::Timeout(format!(
                    "{} exceeded {} ms",
                    operation,
                    timeout.as_millis()
                )))
            }
        }
    }

    /// Install a profile on a connector, replacing any profile with the same id.
    ///
    /// `charge_point_id` and `connector_id` are taken from the request, not from
    /// the profile body.
    pub async fn set_charging_profile(
        &self,
        charge_point_id: &str,
        connector_id: i32,
        mut profile: ChargingProfile,
    ) -> DomainResult<()> {
        profile.charge_point_id = charge_point_id.to_string();
        profile.connector_id = connector_id;
        profile.validate()?;

        let profile_id = profile.charging_profile_id;
        let purpose = profile.purpose;

        self.with_deadline("set", self.repo.set(profile)).await?;

        metrics::counter!("charging_profiles_set_total", "purpose" => purpose.as_str())
            .increment(1);
        info!(
            charge_point_id,
            connector_id,
            profile_id,
            purpose = %purpose,
            "Charging profile installed"
        );
        Ok(())
    }

    pub async fn get_charging_profile(
        &self,
        charge_point_id: &str,
        charging_profile_id: i32,
    ) -> DomainResult<Option<ChargingProfile>> {
        self.with_deadline("find", self.repo.find(charge_point_id, charging_profile_id))
            .await
    }

    /// Profiles of a charge point matching every present filter, ordered by
    /// `(stack_level, charging_profile_id)`.
    pub async fn get_charging_profiles(
        &self,
        charge_point_id: &str,
        filter: &ProfileFilter,
    ) -> DomainResult<Vec<ChargingProfile>> {
        self.with_deadline("query", self.repo.query(charge_point_id, filter))
            .await
    }

    /// Remove matching profiles. Returns the number removed; 0 is not an error.
    pub async fn clear_charging_profile(
        &self,
        charge_point_id: &str,
        criteria: &ClearCriteria,
    ) -> DomainResult<u64> {
        self.clear_charging_profile_with_cancel(charge_point_id, criteria, CancellationToken::new())
            .await
    }

    /// Like [`clear_charging_profile`](Self::clear_charging_profile), stopping
    /// early when `cancel` fires or the request deadline passes. Backends that
    /// delete one by one return the count actually removed; a single in-flight
    /// statement that gets cut off yields `Timeout`.
    pub async fn clear_charging_profile_with_cancel(
        &self,
        charge_point_id: &str,
        criteria: &ClearCriteria,
        cancel: CancellationToken,
    ) -> DomainResult<u64> {
        let deadline = cancel.child_token();
        let timer = {
            let deadline = deadline.clone();
            let timeout = self.request_timeout();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => deadline.cancel(),
                    _ = deadline.cancelled() => {}
                }
            })
        };

        let result = self.repo.clear(charge_point_id, criteria, &deadline).await;
        let interrupted = deadline.is_cancelled();
        timer.abort();

        let cleared = result?;
        if interrupted {
            warn!(charge_point_id, cleared, ?criteria, "Clear interrupted, partial result");
        }

        metrics::counter!("charging_profiles_cleared_total").increment(cleared);
        info!(charge_point_id, cleared, ?criteria, "Charging profiles cleared");
        Ok(cleared)
    }

    /// Effective schedule for a connector over the next `duration_seconds`.
    ///
    /// Falls back to the configured defaults for duration and rate unit.
    /// `Ok(None)` means no profile applies.
    pub async fn get_composite_schedule(
        &self,
        charge_point_id: &str,
        connector_id: i32,
        duration_seconds: Option<i32>,
        rate_unit: Option<ChargingRateUnit>,
    ) -> DomainResult<Option<CompositeSchedule>> {
        let request = CompositeScheduleRequest {
            connector_id,
            duration_seconds: duration_seconds.unwrap_or(self.settings.default_duration_seconds),
            rate_unit: rate_unit.or(self.settings.default_rate_unit),
        };
        validate_composite_request(&request)?;

        let started = Instant::now();

        let mut records = self
            .get_charging_profiles(charge_point_id, &ProfileFilter::connector(connector_id))
            .await?;
        if connector_id != STATION_WIDE_CONNECTOR {
            let station_wide = self
                .get_charging_profiles(
                    charge_point_id,
                    &ProfileFilter::connector(STATION_WIDE_CONNECTOR),
                )
                .await?;
            records.extend(station_wide);
        }

        let composite = resolve_composite(&records, &request, self.clock.now());

        metrics::histogram!("composite_schedule_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        let outcome = if composite.is_some() { "accepted" } else { "no_schedule" };
        metrics::counter!("composite_schedules_total", "outcome" => outcome).increment(1);

        debug!(
            charge_point_id,
            connector_id,
            duration = request.duration_seconds,
            candidates = records.len(),
            winner = ?composite.as_ref().map(|c| c.charging_profile_id),
            "Composite schedule resolved"
        );

        Ok(composite)
    }
}

fn validate_composite_request(request: &CompositeScheduleRequest) -> DomainResult<()> {
    if request.connector_id < 0 {
        return Err(DomainError::Validation(format!(
            "connector_id must be >= 0, got {}",
            request.connector_id
        )));
    }
    if request.duration_seconds <= 0 {
        return Err(DomainError::Validation(format!(
            "duration must be > 0, got {}",
            request.duration_seconds
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::charging_profile::{
        ChargingProfileKind, ChargingProfilePurpose, ChargingSchedule, ChargingSchedulePeriod,
    };
    use crate::infrastructure::InMemoryChargingProfileRepository;
    use crate::shared::time::FixedClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()))
    }

    fn service() -> ChargingProfileService {
        ChargingProfileService::with_clock(
            Arc::new(InMemoryChargingProfileRepository::new()),
            clock(),
            ProfileSettings::default(),
        )
    }

    fn profile(id: i32, purpose: ChargingProfilePurpose, stack_level: i32) -> ChargingProfile {
        ChargingProfile {
            charge_point_id: String::new(),
            charging_profile_id: id,
            connector_id: 0,
            stack_level,
            purpose,
            kind: ChargingProfileKind::Absolute,
            recurrency_kind: None,
            transaction_id: None,
            valid_from: None,
            valid_to: None,
            schedule: ChargingSchedule {
                duration_seconds: None,
                start_schedule: None,
                rate_unit: ChargingRateUnit::W,
                periods: vec![
                    ChargingSchedulePeriod::new(0, 11000.0),
                    ChargingSchedulePeriod::new(3600, 7000.0),
                ],
                min_charging_rate: None,
            },
        }
    }

    #[tokio::test]
    async fn set_stamps_station_and_connector() {
        let svc = service();
        svc.set_charging_profile("CP001", 2, profile(7, ChargingProfilePurpose::TxDefaultProfile, 0))
            .await
            .unwrap();

        let stored = svc.get_charging_profile("CP001", 7).await.unwrap().unwrap();
        assert_eq!(stored.charge_point_id, "CP001");
        assert_eq!(stored.connector_id, 2);
    }

    #[tokio::test]
    async fn invalid_profile_never_reaches_storage() {
        let svc = service();
        let mut bad = profile(1, ChargingProfilePurpose::TxDefaultProfile, 0);
        bad.schedule.periods.clear();

        let err = svc.set_charging_profile("CP001", 1, bad).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(svc
            .get_charging_profiles("CP001", &ProfileFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn composite_uses_injected_clock_and_defaults() {
        let svc = service();
        svc.set_charging_profile("CP001", 1, profile(100, ChargingProfilePurpose::TxDefaultProfile, 0))
            .await
            .unwrap();

        let composite = svc
            .get_composite_schedule("CP001", 1, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(composite.start_schedule, clock().now());
        assert_eq!(composite.duration_seconds, 3600);
        assert_eq!(composite.rate_unit, ChargingRateUnit::W);
        assert_eq!(composite.periods, vec![ChargingSchedulePeriod::new(0, 11000.0)]);
    }

    #[tokio::test]
    async fn configured_default_unit_filters_candidates() {
        let svc = ChargingProfileService::with_clock(
            Arc::new(InMemoryChargingProfileRepository::new()),
            clock(),
            ProfileSettings {
                default_rate_unit: Some(ChargingRateUnit::A),
                ..ProfileSettings::default()
            },
        );
        svc.set_charging_profile("CP001", 1, profile(1, ChargingProfilePurpose::TxProfile, 0))
            .await
            .unwrap();

        assert!(svc
            .get_composite_schedule("CP001", 1, Some(7200), None)
            .await
            .unwrap()
            .is_none());
        assert!(svc
            .get_composite_schedule("CP001", 1, Some(7200), Some(ChargingRateUnit::W))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn station_wide_profile_is_not_counted_twice_for_connector_zero() {
        let svc = service();
        svc.set_charging_profile("CP001", 0, profile(5, ChargingProfilePurpose::ChargePointMaxProfile, 0))
            .await
            .unwrap();

        let at_zero = svc
            .get_composite_schedule("CP001", 0, Some(7200), None)
            .await
            .unwrap()
            .unwrap();
        let at_three = svc
            .get_composite_schedule("CP001", 3, Some(7200), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(at_zero.charging_profile_id, 5);
        assert_eq!(at_three.charging_profile_id, 5);
        assert_eq!(at_three.connector_id, 3);
    }

    #[tokio::test]
    async fn bad_composite_request_is_rejected() {
        let svc = service();
        let err = svc
            .get_composite_schedule("CP001", 1, Some(0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = svc
            .get_composite_schedule("CP001", -1, Some(60), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    struct StalledRepository;

    #[async_trait]
    impl ChargingProfileRepository for StalledRepository {
        async fn set(&self, _profile: ChargingProfile) -> DomainResult<()> {
            std::future::pending().await
        }

        async fn find(&self, _cp: &str, _id: i32) -> DomainResult<Option<ChargingProfile>> {
            std::future::pending().await
        }

        async fn query(&self, _cp: &str, _f: &ProfileFilter) -> DomainResult<Vec<ChargingProfile>> {
            std::future::pending().await
        }

        async fn clear(
            &self,
            _cp: &str,
            _c: &ClearCriteria,
            cancel: &CancellationToken,
        ) -> DomainResult<u64> {
            cancel.cancelled().await;
            Ok(0)
        }
    }

    fn stalled_service() -> ChargingProfileService {
        ChargingProfileService::with_clock(
            Arc::new(StalledRepository),
            clock(),
            ProfileSettings {
                request_timeout_ms: 20,
                ..ProfileSettings::default()
            },
        )
    }

    #[tokio::test]
    async fn stalled_query_times_out() {
        let err = stalled_service()
            .get_charging_profiles("CP001", &ProfileFilter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Timeout(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn stalled_clear_is_cancelled_by_deadline() {
        let cleared = stalled_service()
            .clear_charging_profile("CP001", &ClearCriteria::default())
            .await
            .unwrap();
        assert_eq!(cleared, 0);
    }

    #[tokio::test]
    async fn caller_cancellation_reaches_repository() {
        let svc = ChargingProfileService::with_clock(
            Arc::new(StalledRepository),
            clock(),
            ProfileSettings::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let cleared = svc
            .clear_charging_profile_with_cancel("CP001", &ClearCriteria::default(), cancel)
            .await
            .unwrap();
        assert_eq!(cleared, 0);
    }
}
