//! Create the local scan queue

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(ScanAttempt::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(ScanAttempt::Seq)
							.integer()
							.not_null()
							.auto_increment()
							.primary_key(),
					)
					.col(ColumnDef::new(ScanAttempt::Uuid).text().not_null().unique_key())
					.col(ColumnDef::new(ScanAttempt::Code).text().not_null())
					.col(ColumnDef::new(ScanAttempt::EventId).text().not_null())
					.col(ColumnDef::new(ScanAttempt::AmbassadorId).text().not_null())
					.col(ColumnDef::new(ScanAttempt::DeviceInfo).text().not_null())
					.col(ColumnDef::new(ScanAttempt::Location).text().not_null())
					.col(
						ColumnDef::new(ScanAttempt::CapturedAtMs)
							.big_integer()
							.not_null(),
					)
					.col(
						ColumnDef::new(ScanAttempt::Synced)
							.boolean()
							.not_null()
							.default(false),
					)
					.col(ColumnDef::new(ScanAttempt::SyncedAtMs).big_integer())
					.col(ColumnDef::new(ScanAttempt::OutcomeKind).string().not_null())
					.col(ColumnDef::new(ScanAttempt::Outcome).text().not_null())
					.col(
						ColumnDef::new(ScanAttempt::SyncAttempts)
							.integer()
							.not_null()
							.default(0),
					)
					.col(ColumnDef::new(ScanAttempt::LastSyncError).text())
					.to_owned(),
			)
			.await?;

		// Drives the unsynced listing: filter on synced, ordered by capture time
		manager
			.create_index(
				Index::create()
					.name("idx_scan_attempt_synced_captured_at")
					.table(ScanAttempt::Table)
					.col(ScanAttempt::Synced)
					.col(ScanAttempt::CapturedAtMs)
					.col(ScanAttempt::Seq)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_scan_attempt_event_id")
					.table(ScanAttempt::Table)
					.col(ScanAttempt::EventId)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_scan_attempt_outcome_kind")
					.table(ScanAttempt::Table)
					.col(ScanAttempt::OutcomeKind)
					.to_owned(),
			)
			.await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(ScanAttempt::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum ScanAttempt {
	Table,
	Seq,
	Uuid,
	Code,
	EventId,
	AmbassadorId,
	DeviceInfo,
	Location,
	CapturedAtMs,
	Synced,
	SyncedAtMs,
	OutcomeKind,
	Outcome,
	SyncAttempts,
	LastSyncError,
}
