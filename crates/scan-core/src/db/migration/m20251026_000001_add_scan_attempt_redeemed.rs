//! Record whether the authoritative store redeemed the ticket of a queued attempt

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.alter_table(
				Table::alter()
					.table(ScanAttempt::Table)
					.add_column(
						ColumnDef::new(ScanAttempt::Redeemed)
							.boolean()
							.not_null()
							.default(false),
					)
					.to_owned(),
			)
			.await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.alter_table(
				Table::alter()
					.table(ScanAttempt::Table)
					.drop_column(ScanAttempt::Redeemed)
					.to_owned(),
			)
			.await
	}
}

#[derive(DeriveIden)]
enum ScanAttempt {
	Table,
	Redeemed,
}
