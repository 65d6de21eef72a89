//! Tickets and events downloaded ahead of time, used to validate while offline.

use tg_remote_store::RemoteStore;
use tg_scan_types::{Event, EventId, Ticket, TicketStatus};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{
	sea_query::{Expr, OnConflict},
	ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
	TransactionTrait,
};
use tokio::time::timeout;
use tracing::{debug, info};

use super::{
	db::{
		entities::{cached_event, cached_ticket, CachedEventEntity, CachedTicketEntity},
		Error as DbError, LocalDatabase,
	},
	validator::{LookupError, TicketLookup},
	Error,
};

#[derive(Debug, Clone)]
pub struct Catalog {
	conn: DatabaseConnection,
}

impl Catalog {
	#[must_use]
	pub fn new(db: &LocalDatabase) -> Self {
		Self {
			conn: db.conn().clone(),
		}
	}

	/// Downloads every ticket of `event` and replaces whatever was cached for it.
	///
	/// Returns the number of tickets cached.
	pub async fn download_event(
		&self,
		store: &dyn RemoteStore,
		event: &Event,
		remote_timeout: Duration,
	) -> Result<usize, Error> {
		let tickets = timeout(remote_timeout, store.tickets_for_event(&event.id))
			.await
			.map_err(|_| tg_remote_store::Error::Timeout)??;

		let count = tickets.len();
		self.replace_event_catalog(event, tickets).await?;

		info!(event_id = %event.id, tickets = count, "Downloaded event catalog");

		Ok(count)
	}

	async fn replace_event_catalog(
		&self,
		event: &Event,
		tickets: Vec<Ticket>,
	) -> Result<(), DbError> {
		let txn = self.conn.begin().await?;

		CachedTicketEntity::delete_many()
			.filter(cached_ticket::Column::EventId.eq(event.id.as_str()))
			.exec(&txn)
			.await?;

		if !tickets.is_empty() {
			CachedTicketEntity::insert_many(tickets.into_iter().map(|ticket| {
				cached_ticket::ActiveModel {
					code: Set(ticket.code),
					event_id: Set(ticket.event_id.to_string()),
					status: Set(ticket.status.to_string()),
					customer_name: Set(ticket.customer_name),
					ticket_type: Set(ticket.ticket_type),
					used_locally: Set(false),
				}
			}))
			.on_conflict(
				OnConflict::column(cached_ticket::Column::Code)
					.update_columns([
						cached_ticket::Column::EventId,
						cached_ticket::Column::Status,
						cached_ticket::Column::CustomerName,
						cached_ticket::Column::TicketType,
						cached_ticket::Column::UsedLocally,
					])
					.to_owned(),
			)
			.exec_without_returning(&txn)
			.await?;
		}

		CachedEventEntity::insert(cached_event::ActiveModel {
			id: Set(event.id.to_string()),
			name: Set(event.name.clone()),
			date: Set(event.date.to_string()),
			catalog_downloaded_at_ms: Set(Some(Utc::now().timestamp_millis())),
		})
		.on_conflict(
			OnConflict::column(cached_event::Column::Id)
				.update_columns([
					cached_event::Column::Name,
					cached_event::Column::Date,
					cached_event::Column::CatalogDownloadedAtMs,
				])
				.to_owned(),
		)
		.exec_without_returning(&txn)
		.await?;

		txn.commit().await.map_err(Into::into)
	}

	/// Remembers event metadata without touching any downloaded tickets.
	pub async fn cache_events(&self, events: &[Event]) -> Result<(), DbError> {
		if events.is_empty() {
			return Ok(());
		}

		CachedEventEntity::insert_many(events.iter().map(|event| cached_event::ActiveModel {
			id: Set(event.id.to_string()),
			name: Set(event.name.clone()),
			date: Set(event.date.to_string()),
			catalog_downloaded_at_ms: Set(None),
		}))
		.on_conflict(
			OnConflict::column(cached_event::Column::Id)
				.update_columns([cached_event::Column::Name, cached_event::Column::Date])
				.to_owned(),
		)
		.exec_without_returning(&self.conn)
		.await?;

		debug!(count = events.len(), "Cached event list");

		Ok(())
	}

	/// Cached events in date order.
	pub async fn cached_events(&self) -> Result<Vec<Event>, DbError> {
		CachedEventEntity::find()
			.order_by_asc(cached_event::Column::Date)
			.order_by_asc(cached_event::Column::Id)
			.all(&self.conn)
			.await?
			.into_iter()
			.map(Event::try_from)
			.collect()
	}

	pub async fn cached_event(&self, event_id: &EventId) -> Result<Option<Event>, DbError> {
		CachedEventEntity::find_by_id(event_id.to_string())
			.one(&self.conn)
			.await?
			.map(Event::try_from)
			.transpose()
	}

	/// Whether the tickets of `event_id` were downloaded to this device.
	pub async fn has_event(&self, event_id: &EventId) -> Result<bool, DbError> {
		Ok(CachedEventEntity::find_by_id(event_id.to_string())
			.one(&self.conn)
			.await?
			.is_some_and(|event| event.catalog_downloaded_at_ms.is_some()))
	}

	/// A ticket admitted locally while offline is reported as used.
	pub async fn find(&self, code: &str) -> Result<Option<Ticket>, DbError> {
		CachedTicketEntity::find_by_id(code)
			.one(&self.conn)
			.await?
			.map(Ticket::try_from)
			.transpose()
	}

	/// Flags a cached ticket as admitted by this device. Returns `false` for unknown codes.
	pub async fn mark_used_locally(&self, code: &str) -> Result<bool, DbError> {
		let res = CachedTicketEntity::update_many()
			.col_expr(cached_ticket::Column::UsedLocally, Expr::value(true))
			.filter(cached_ticket::Column::Code.eq(code))
			.exec(&self.conn)
			.await?;

		Ok(res.rows_affected > 0)
	}
}

#[async_trait]
impl TicketLookup for Catalog {
	async fn find_ticket(&self, code: &str) -> Result<Option<Ticket>, LookupError> {
		self.find(code).await.map_err(Into::into)
	}
}

impl TryFrom<cached_event::Model> for Event {
	type Error = DbError;

	fn try_from(model: cached_event::Model) -> Result<Self, Self::Error> {
		Ok(Self {
			date: model
				.date
				.parse::<NaiveDate>()
				.map_err(|e| DbError::Corrupted {
					table: "cached_event",
					reason: format!("invalid date '{}': {e}", model.date),
				})?,
			id: EventId::from(model.id),
			name: model.name,
		})
	}
}

impl TryFrom<cached_ticket::Model> for Ticket {
	type Error = DbError;

	fn try_from(model: cached_ticket::Model) -> Result<Self, Self::Error> {
		let status = if model.used_locally {
			TicketStatus::Used
		} else {
			model
				.status
				.parse::<TicketStatus>()
				.map_err(|e| DbError::Corrupted {
					table: "cached_ticket",
					reason: format!("invalid status '{}': {e}", model.status),
				})?
		};

		Ok(Self {
			code: model.code,
			event_id: EventId::from(model.event_id),
			status,
			customer_name: model.customer_name,
			ticket_type: model.ticket_type,
		})
	}
}
