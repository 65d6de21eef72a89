//! Create the offline catalog cache

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
	async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.create_table(
				Table::create()
					.table(CachedEvent::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(CachedEvent::Id)
							.text()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(CachedEvent::Name).text().not_null())
					.col(ColumnDef::new(CachedEvent::Date).string().not_null())
					.col(ColumnDef::new(CachedEvent::CatalogDownloadedAtMs).big_integer())
					.to_owned(),
			)
			.await?;

		manager
			.create_table(
				Table::create()
					.table(CachedTicket::Table)
					.if_not_exists()
					.col(
						ColumnDef::new(CachedTicket::Code)
							.text()
							.not_null()
							.primary_key(),
					)
					.col(ColumnDef::new(CachedTicket::EventId).text().not_null())
					.col(ColumnDef::new(CachedTicket::Status).string().not_null())
					.col(ColumnDef::new(CachedTicket::CustomerName).text())
					.col(ColumnDef::new(CachedTicket::TicketType).text())
					.col(
						ColumnDef::new(CachedTicket::UsedLocally)
							.boolean()
							.not_null()
							.default(false),
					)
					.to_owned(),
			)
			.await?;

		manager
			.create_index(
				Index::create()
					.name("idx_cached_ticket_event_id")
					.table(CachedTicket::Table)
					.col(CachedTicket::EventId)
					.to_owned(),
			)
			.await
	}

	async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
		manager
			.drop_table(Table::drop().table(CachedTicket::Table).to_owned())
			.await?;

		manager
			.drop_table(Table::drop().table(CachedEvent::Table).to_owned())
			.await
	}
}

#[derive(DeriveIden)]
enum CachedEvent {
	Table,
	Id,
	Name,
	Date,
	CatalogDownloadedAtMs,
}

#[derive(DeriveIden)]
enum CachedTicket {
	Table,
	Code,
	EventId,
	Status,
	CustomerName,
	TicketType,
	UsedLocally,
}
