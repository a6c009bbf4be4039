//! SeaORM implementation of ChargingProfileRepository

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DeleteResult, EntityTrait, NotSet, QueryFilter,
    QueryOrder, Set,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::charging_profile::{
    ChargingProfile, ChargingProfileRepository, ChargingSchedule, ClearCriteria, ProfileFilter,
    RecurrencyKind,
};
use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::database::entities::charging_profile;
use crate::shared::errors::InfraError;

pub struct SeaOrmChargingProfileRepository {
    db: DatabaseConnection,
}

impl SeaOrmChargingProfileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

// ── Conversion helpers ──────────────────────────────────────────

fn model_to_domain(m: charging_profile::Model) -> Result<ChargingProfile, InfraError> {
    let row_id = m.id;
    let decode = |field: &str, e: DomainError| {
        InfraError::Decode(format!(
            "charging_profiles row {} ({}): {}",
            row_id, field, e
        ))
    };

    let schedule: ChargingSchedule = serde_json::from_str(&m.schedule_json)?;

    Ok(ChargingProfile {
        purpose: m.purpose.parse().map_err(|e| decode("purpose", e))?,
        kind: m.kind.parse().map_err(|e| decode("kind", e))?,
        recurrency_kind: m
            .recurrency_kind
            .as_deref()
            .map(str::parse::<RecurrencyKind>)
            .transpose()
            .map_err(|e| decode("recurrency_kind", e))?,
        charge_point_id: m.charge_point_id,
        charging_profile_id: m.charging_profile_id,
        connector_id: m.connector_id,
        stack_level: m.stack_level,
        transaction_id: m.transaction_id,
        valid_from: m.valid_from,
        valid_to: m.valid_to,
        schedule,
    })
}

fn filter_condition(charge_point_id: &str, filter: &ProfileFilter) -> Condition {
    let mut condition =
        Condition::all().add(charging_profile::Column::ChargePointId.eq(charge_point_id));

    if let Some(connector_id) = filter.connector_id {
        condition = condition.add(charging_profile::Column::ConnectorId.eq(connector_id));
    }
    if let Some(purpose) = filter.purpose {
        condition = condition.add(charging_profile::Column::Purpose.eq(purpose.as_str()));
    }
    if let Some(stack_level) = filter.stack_level {
        condition = condition.add(charging_profile::Column::StackLevel.eq(stack_level));
    }
    condition
}

// ── ChargingProfileRepository impl ─────────────────────────────

#[async_trait]
impl ChargingProfileRepository for SeaOrmChargingProfileRepository {
    async fn set(&self, profile: ChargingProfile) -> DomainResult<()> {
        debug!(
            charge_point_id = %profile.charge_point_id,
            profile_id = profile.charging_profile_id,
            connector_id = profile.connector_id,
            purpose = %profile.purpose,
            "Saving charging profile"
        );

        let now = Utc::now();
        let schedule_json = serde_json::to_string(&profile.schedule).map_err(InfraError::from)?;
        let model = charging_profile::ActiveModel {
            id: NotSet,
            charge_point_id: Set(profile.charge_point_id),
            charging_profile_id: Set(profile.charging_profile_id),
            connector_id: Set(profile.connector_id),
            stack_level: Set(profile.stack_level),
            purpose: Set(profile.purpose.as_str().to_string()),
            kind: Set(profile.kind.as_str().to_string()),
            recurrency_kind: Set(profile.recurrency_kind.map(|r| r.as_str().to_string())),
            transaction_id: Set(profile.transaction_id),
            valid_from: Set(profile.valid_from),
            valid_to: Set(profile.valid_to),
            schedule_json: Set(schedule_json),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Single-statement upsert: every column except identity and
        // created_at is overwritten, so nothing of the old record survives.
        charging_profile::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    charging_profile::Column::ChargePointId,
                    charging_profile::Column::ChargingProfileId,
                ])
                .update_columns([
                    charging_profile::Column::ConnectorId,
                    charging_profile::Column::StackLevel,
                    charging_profile::Column::Purpose,
                    charging_profile::Column::Kind,
                    charging_profile::Column::RecurrencyKind,
                    charging_profile::Column::TransactionId,
                    charging_profile::Column::ValidFrom,
                    charging_profile::Column::ValidTo,
                    charging_profile::Column::ScheduleJson,
                    charging_profile::Column::UpdatedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(InfraError::from)?;

        Ok(())
    }

    async fn find(
        &self,
        charge_point_id: &str,
        charging_profile_id: i32,
    ) -> DomainResult<Option<ChargingProfile>> {
        let model = charging_profile::Entity::find()
            .filter(charging_profile::Column::ChargePointId.eq(charge_point_id))
            .filter(charging_profile::Column::ChargingProfileId.eq(charging_profile_id))
            .one(&self.db)
            .await
            .map_err(InfraError::from)?;

        Ok(model.map(model_to_domain).transpose()?)
    }

    async fn query(
        &self,
        charge_point_id: &str,
        filter: &ProfileFilter,
    ) -> DomainResult<Vec<ChargingProfile>> {
        let models = charging_profile::Entity::find()
            .filter(filter_condition(charge_point_id, filter))
            .order_by_asc(charging_profile::Column::StackLevel)
            .order_by_asc(charging_profile::Column::ChargingProfileId)
            .all(&self.db)
            .await
            .map_err(InfraError::from)?;

        let profiles = models
            .into_iter()
            .map(model_to_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
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

        debug!(
            charge_point_id,
            ?criteria,
            "Deleting charging profiles by criteria"
        );

        let mut condition = filter_condition(charge_point_id, &criteria.filter);
        if let Some(id) = criteria.charging_profile_id {
            condition = condition.add(charging_profile::Column::ChargingProfileId.eq(id));
        }

        // One statement: once it is in flight the row count is unknown until it
        // returns, so cancellation surfaces as Timeout rather than a count.
        let delete = charging_profile::Entity::delete_many()
            .filter(condition)
            .exec(&self.db);
        let result: DeleteResult = tokio::select! {
            result = delete => result.map_err(InfraError::from)?,
            _ = cancel.cancelled() => {
                warn!(charge_point_id, "Clear cancelled while DELETE was in flight");
                return Err(DomainError::Timeout(format!(
                    "clear for {} cancelled before the database responded",
                    charge_point_id
                )));
            }
        };

        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sea_orm::TransactionTrait;
    use sea_orm_migration::MigratorTrait;

    use super::*;
    use crate::infrastructure::database::migrator::Migrator;
    use crate::infrastructure::database::{init_database, DatabaseConfig};

    async fn repository() -> SeaOrmChargingProfileRepository {
        let db = init_database(&DatabaseConfig::sqlite_in_memory())
            .await
            .unwrap();
        Migrator::up(&db, None).await.unwrap();
        SeaOrmChargingProfileRepository::new(db)
    }

    #[tokio::test]
    async fn clear_stuck_on_database_times_out_when_cancelled() {
        let repo = repository().await;
        // The pool has a single connection; holding it in a transaction
        // leaves the DELETE waiting for a connection.
        let txn = repo.db.begin().await.unwrap();

        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            repo.clear("CP001", &ClearCriteria::default(), &cancel),
        )
        .await
        .expect("clear must return once cancelled");
        assert!(matches!(result, Err(DomainError::Timeout(_))));

        timer.await.unwrap();
        txn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn clear_cancelled_before_start_is_zero() {
        let repo = repository().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let removed = repo
            .clear("CP001", &ClearCriteria::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(removed, 0);
    }
}
