//! Create charging_profiles table
//!
//! One row per `(charge_point_id, charging_profile_id)`; the unique index
//! backs the upsert used by SetChargingProfile.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const UNIQUE_PROFILE_INDEX: &str = "uq_charging_profiles_cp_profile";
const CONNECTOR_INDEX: &str = "idx_charging_profiles_cp_connector";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        use self::ChargingProfiles as T;

        let table = Table::create()
            .table(T::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(T::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(T::ChargePointId).string().not_null())
            .col(ColumnDef::new(T::ChargingProfileId).integer().not_null())
            .col(ColumnDef::new(T::ConnectorId).integer().not_null().default(0))
            .col(ColumnDef::new(T::StackLevel).integer().not_null().default(0))
            .col(ColumnDef::new(T::Purpose).string().not_null())
            .col(ColumnDef::new(T::Kind).string().not_null())
            .col(ColumnDef::new(T::RecurrencyKind).string().null())
            .col(ColumnDef::new(T::TransactionId).integer().null())
            .col(ColumnDef::new(T::ValidFrom).timestamp_with_time_zone().null())
            .col(ColumnDef::new(T::ValidTo).timestamp_with_time_zone().null())
            .col(ColumnDef::new(T::ScheduleJson).text().not_null())
            .col(ColumnDef::new(T::CreatedAt).timestamp_with_time_zone().not_null())
            .col(ColumnDef::new(T::UpdatedAt).timestamp_with_time_zone().not_null())
            .to_owned();
        manager.create_table(table).await?;

        manager
            .create_index(
                Index::create()
                    .name(UNIQUE_PROFILE_INDEX)
                    .table(T::Table)
                    .col(T::ChargePointId)
                    .col(T::ChargingProfileId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Composite lookups query by station and connector.
        manager
            .create_index(
                Index::create()
                    .name(CONNECTOR_INDEX)
                    .table(T::Table)
                    .col(T::ChargePointId)
                    .col(T::ConnectorId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChargingProfiles::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub enum ChargingProfiles {
    Table,
    Id,
    ChargePointId,
    ChargingProfileId,
    ConnectorId,
    StackLevel,
    Purpose,
    Kind,
    RecurrencyKind,
    TransactionId,
    ValidFrom,
    ValidTo,
    ScheduleJson,
    CreatedAt,
    UpdatedAt,
}
