//! Durable on-device queue of scan attempts.
//!
//! The orchestrator is the only writer and the synchronizer the only drainer. Rows are never
//! deleted here; once synced they stay as the local audit trail.

use tg_scan_types::{AmbassadorId, EventId, Outcome, ScanAttempt, ScanAttemptId};

use chrono::{DateTime, Utc};
use futures::{stream, Stream, TryStreamExt};
use sea_orm::{
	sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
	PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{debug, trace};

use super::{
	db::{
		entities::{scan_attempt, ScanAttemptEntity},
		Error, LocalDatabase,
	},
	history::ScanQuery,
};

const DEFAULT_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone)]
pub struct LocalQueue {
	conn: DatabaseConnection,
	page_size: u64,
}

/// Keyset position in the `(captured_at_ms, seq)` order.
#[derive(Debug, Clone, Copy)]
enum Cursor {
	Start,
	After { captured_at_ms: i64, seq: i32 },
	Done,
}

impl LocalQueue {
	#[must_use]
	pub fn new(db: &LocalDatabase) -> Self {
		Self {
			conn: db.conn().clone(),
			page_size: DEFAULT_PAGE_SIZE,
		}
	}

	/// Number of rows fetched per round trip while listing unsynced attempts.
	#[must_use]
	pub fn with_page_size(mut self, page_size: u64) -> Self {
		self.page_size = page_size.max(1);
		self
	}

	/// Persists `attempt` as unsynced and returns the stored record.
	///
	/// The insert is committed before this returns.
	pub async fn enqueue(&self, attempt: ScanAttempt) -> Result<ScanAttempt, Error> {
		let model = scan_attempt::ActiveModel {
			uuid: Set(attempt.id.to_string()),
			code: Set(attempt.code),
			event_id: Set(attempt.event_id.to_string()),
			ambassador_id: Set(attempt.ambassador_id.to_string()),
			device_info: Set(attempt.device_info),
			location: Set(attempt.location),
			captured_at_ms: Set(attempt.captured_at.timestamp_millis()),
			synced: Set(false),
			synced_at_ms: Set(None),
			outcome_kind: Set(attempt.outcome.kind().to_string()),
			outcome: Set(serde_json::to_value(&attempt.outcome)?),
			redeemed: Set(attempt.redeemed),
			sync_attempts: Set(0),
			last_sync_error: Set(None),
			..Default::default()
		}
		.insert(&self.conn)
		.await?;

		trace!(attempt_id = %model.uuid, seq = model.seq, "Enqueued scan attempt");

		model.try_into()
	}

	/// All unsynced attempts, oldest capture first.
	///
	/// The sequence is fetched lazily one page at a time and ends after the last unsynced row.
	/// Attempts marked synced while it is being consumed are neither skipped nor repeated, and
	/// calling this again starts over from the oldest unsynced attempt.
	pub fn list_unsynced(&self) -> impl Stream<Item = Result<ScanAttempt, Error>> + Send + '_ {
		stream::try_unfold(Cursor::Start, move |cursor| self.next_page(cursor))
			.map_ok(|attempts| stream::iter(attempts.into_iter().map(Ok::<_, Error>)))
			.try_flatten()
	}

	async fn next_page(&self, cursor: Cursor) -> Result<Option<(Vec<ScanAttempt>, Cursor)>, Error> {
		if matches!(cursor, Cursor::Done) {
			return Ok(None);
		}

		let page = self.unsynced_page(cursor).await?;
		let Some(last) = page.last() else {
			return Ok(None);
		};

		let next = if page.len() as u64 == self.page_size {
			Cursor::After {
				captured_at_ms: last.captured_at_ms,
				seq: last.seq,
			}
		} else {
			Cursor::Done
		};

		let attempts = page
			.into_iter()
			.map(ScanAttempt::try_from)
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Some((attempts, next)))
	}

	async fn unsynced_page(&self, cursor: Cursor) -> Result<Vec<scan_attempt::Model>, Error> {
		let mut query = ScanAttemptEntity::find().filter(scan_attempt::Column::Synced.eq(false));

		if let Cursor::After {
			captured_at_ms,
			seq,
		} = cursor
		{
			query = query.filter(
				Condition::any()
					.add(scan_attempt::Column::CapturedAtMs.gt(captured_at_ms))
					.add(
						Condition::all()
							.add(scan_attempt::Column::CapturedAtMs.eq(captured_at_ms))
							.add(scan_attempt::Column::Seq.gt(seq)),
					),
			);
		}

		query
			.order_by_asc(scan_attempt::Column::CapturedAtMs)
			.order_by_asc(scan_attempt::Column::Seq)
			.limit(self.page_size)
			.all(&self.conn)
			.await
			.map_err(Into::into)
	}

	/// Marks an attempt as accepted by the authoritative store. Marking it again is a no-op.
	pub async fn mark_synced(&self, id: ScanAttemptId) -> Result<(), Error> {
		let res = ScanAttemptEntity::update_many()
			.col_expr(scan_attempt::Column::Synced, Expr::value(true))
			.col_expr(
				scan_attempt::Column::SyncedAtMs,
				Expr::value(Utc::now().timestamp_millis()),
			)
			.filter(scan_attempt::Column::Uuid.eq(id.to_string()))
			.filter(scan_attempt::Column::Synced.eq(false))
			.exec(&self.conn)
			.await?;

		if res.rows_affected == 0 {
			if self.find_model(id).await?.is_none() {
				return Err(Error::NotFound(id));
			}

			debug!(attempt_id = %id, "Scan attempt was already synced");
		}

		Ok(())
	}

	/// Bookkeeping for a failed sync try, the attempt stays unsynced.
	pub async fn record_sync_failure(&self, id: ScanAttemptId, error: &str) -> Result<(), Error> {
		let res = ScanAttemptEntity::update_many()
			.col_expr(
				scan_attempt::Column::SyncAttempts,
				Expr::col(scan_attempt::Column::SyncAttempts).add(1),
			)
			.col_expr(
				scan_attempt::Column::LastSyncError,
				Expr::value(Some(error.to_string())),
			)
			.filter(scan_attempt::Column::Uuid.eq(id.to_string()))
			.exec(&self.conn)
			.await?;

		if res.rows_affected == 0 {
			return Err(Error::NotFound(id));
		}

		Ok(())
	}

	/// Replaces the stored outcome, used when synchronization refines an offline decision.
	pub async fn update_outcome(&self, id: ScanAttemptId, outcome: &Outcome) -> Result<(), Error> {
		let res = ScanAttemptEntity::update_many()
			.col_expr(
				scan_attempt::Column::OutcomeKind,
				Expr::value(outcome.kind().to_string()),
			)
			.col_expr(
				scan_attempt::Column::Outcome,
				Expr::value(serde_json::to_value(outcome)?),
			)
			.filter(scan_attempt::Column::Uuid.eq(id.to_string()))
			.exec(&self.conn)
			.await?;

		if res.rows_affected == 0 {
			return Err(Error::NotFound(id));
		}

		Ok(())
	}

	pub async fn get(&self, id: ScanAttemptId) -> Result<Option<ScanAttempt>, Error> {
		self.find_model(id)
			.await?
			.map(ScanAttempt::try_from)
			.transpose()
	}

	pub async fn count_unsynced(&self) -> Result<u64, Error> {
		ScanAttemptEntity::find()
			.filter(scan_attempt::Column::Synced.eq(false))
			.count(&self.conn)
			.await
			.map_err(Into::into)
	}

	/// Most recent attempts first, synced or not.
	pub async fn recent(&self, limit: u64) -> Result<Vec<ScanAttempt>, Error> {
		self.search(&ScanQuery::default(), limit).await
	}

	/// Attempts matching `query`, most recent first, synced or not.
	pub async fn search(&self, query: &ScanQuery, limit: u64) -> Result<Vec<ScanAttempt>, Error> {
		let mut select = ScanAttemptEntity::find();

		if let Some(kind) = query.kind {
			select = select.filter(scan_attempt::Column::OutcomeKind.eq(kind.to_string()));
		}

		if let Some(event_id) = &query.event_id {
			select = select.filter(scan_attempt::Column::EventId.eq(event_id.as_str()));
		}

		// SQLite's LIKE ignores ASCII case.
		if let Some(needle) = query.code_contains.as_deref().filter(|n| !n.is_empty()) {
			select = select.filter(scan_attempt::Column::Code.contains(needle));
		}

		select
			.order_by_desc(scan_attempt::Column::CapturedAtMs)
			.order_by_desc(scan_attempt::Column::Seq)
			.limit(limit)
			.all(&self.conn)
			.await?
			.into_iter()
			.map(ScanAttempt::try_from)
			.collect()
	}

	/// Failed sync tries and last error recorded for an attempt.
	pub async fn sync_failures(&self, id: ScanAttemptId) -> Result<(i32, Option<String>), Error> {
		self.find_model(id)
			.await?
			.map(|model| (model.sync_attempts, model.last_sync_error))
			.ok_or(Error::NotFound(id))
	}

	async fn find_model(&self, id: ScanAttemptId) -> Result<Option<scan_attempt::Model>, Error> {
		ScanAttemptEntity::find()
			.filter(scan_attempt::Column::Uuid.eq(id.to_string()))
			.one(&self.conn)
			.await
			.map_err(Into::into)
	}
}

impl TryFrom<scan_attempt::Model> for ScanAttempt {
	type Error = Error;

	fn try_from(model: scan_attempt::Model) -> Result<Self, Self::Error> {
		let corrupted = |reason: String| Error::Corrupted {
			table: "scan_attempt",
			reason,
		};

		Ok(Self {
			id: model
				.uuid
				.parse()
				.map_err(|e| corrupted(format!("invalid uuid '{}': {e}", model.uuid)))?,
			captured_at: DateTime::from_timestamp_millis(model.captured_at_ms).ok_or_else(|| {
				corrupted(format!("timestamp out of range: {}", model.captured_at_ms))
			})?,
			outcome: serde_json::from_value::<Outcome>(model.outcome)?,
			code: model.code,
			event_id: EventId::from(model.event_id),
			ambassador_id: AmbassadorId::from(model.ambassador_id),
			device_info: model.device_info,
			location: model.location,
			synced: model.synced,
			redeemed: model.redeemed,
		})
	}
}
