//! Entry point for every decoded code.
//!
//! One attempt at a time moves through
//! `Idle -> Detected -> Deduplicating -> Validating -> Recording -> Settled`. Online, the
//! outcome is written to the authoritative store; any remote failure while recording falls
//! back to the local queue with the outcome preserved. Offline, attempts go straight to the
//! queue and are validated against a downloaded catalog or the marker heuristic.

use tg_remote_store::{Error as RemoteError, RemoteStore};
use tg_scan_types::{
	Event, EventFilter, EventId, InvalidReason, Outcome, ScanAttempt, ScanSession, TicketStatus,
};

use std::{
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc,
	},
	time::Duration,
};

use chrono::Utc;
use strum::Display;
use tokio::{
	sync::{watch, Mutex},
	time::{timeout, Instant},
};
use tracing::{debug, info, instrument, trace, warn};

use super::{
	catalog::Catalog,
	config::ScannerConfig,
	connectivity::ConnectivityMonitor,
	db::{self, LocalDatabase},
	history::{ScanHistory, ScanQuery, ScanReport, ScanStats},
	queue::LocalQueue,
	validator::{Decision, EventScope, RemoteLookup, TicketLookup, Validator},
	Error,
};

mod feed;

pub use feed::{run_decoder, FeedEvent, FeedSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ScanPhase {
	Idle,
	Detected,
	Deduplicating,
	Validating,
	Recording,
	Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
	/// Measured from the previous attempt reaching `Settled` or being stranded.
	pub dedup_window: Duration,
	pub history_limit: usize,
	pub probe_timeout: Duration,
	pub remote_timeout: Duration,
}

impl From<&ScannerConfig> for OrchestratorSettings {
	fn from(config: &ScannerConfig) -> Self {
		Self {
			dedup_window: config.dedup_window(),
			history_limit: config.history_limit,
			probe_timeout: config.probe_timeout(),
			remote_timeout: config.remote_timeout(),
		}
	}
}

impl From<&Event> for EventScope {
	fn from(event: &Event) -> Self {
		Self {
			id: event.id.clone(),
			date: Some(event.date),
		}
	}
}

impl From<EventId> for EventScope {
	fn from(id: EventId) -> Self {
		Self { id, date: None }
	}
}

/// Held for the whole of one scan, so scans are handled one at a time.
struct State {
	event: Option<EventScope>,
	/// Last code that settled or was stranded, and when.
	last_settled: Option<(String, Instant)>,
}

impl State {
	fn is_duplicate(&self, code: &str, window: Duration) -> bool {
		self.last_settled
			.as_ref()
			.is_some_and(|(last, settled_at)| last == code && settled_at.elapsed() < window)
	}
}

/// What the ambassador sees, readable while a scan is in flight.
struct Records {
	history: ScanHistory,
	stats: ScanStats,
}

pub struct ScanOrchestrator {
	session: ScanSession,
	settings: OrchestratorSettings,
	validator: Validator,
	monitor: Arc<ConnectivityMonitor>,
	store: Arc<dyn RemoteStore>,
	queue: LocalQueue,
	catalog: Catalog,
	state: Mutex<State>,
	/// Attempts whose enqueue failed twice, oldest first.
	stranded: Mutex<Vec<ScanAttempt>>,
	records: Mutex<Records>,
	attempts: AtomicU64,
	phase: watch::Sender<ScanPhase>,
}

impl ScanOrchestrator {
	#[must_use]
	pub fn new(
		session: ScanSession,
		config: &ScannerConfig,
		store: Arc<dyn RemoteStore>,
		monitor: Arc<ConnectivityMonitor>,
		db: &LocalDatabase,
	) -> Self {
		let settings = OrchestratorSettings::from(config);

		Self {
			session,
			settings,
			validator: Validator::new(config.offline_code_marker.clone(), config.max_code_len),
			monitor,
			store,
			queue: LocalQueue::new(db).with_page_size(config.sync_page_size),
			catalog: Catalog::new(db),
			state: Mutex::new(State {
				event: None,
				last_settled: None,
			}),
			stranded: Mutex::new(Vec::new()),
			records: Mutex::new(Records {
				history: ScanHistory::new(settings.history_limit),
				stats: ScanStats::default(),
			}),
			attempts: AtomicU64::new(0),
			phase: watch::Sender::new(ScanPhase::Idle),
		}
	}

	/// Scopes subsequent scans to `event`. The dedup window starts over.
	///
	/// An event selected by id alone takes its date from the local cache when it is there.
	pub async fn select_event(&self, event: impl Into<EventScope>) {
		let mut scope = event.into();

		if scope.date.is_none() {
			match self.catalog.cached_event(&scope.id).await {
				Ok(cached) => scope.date = cached.map(|event| event.date),
				Err(e) => warn!(?e, event_id = %scope.id, "Failed to read cached event date"),
			}
		}

		info!(event_id = %scope.id, date = ?scope.date, "Selected event for scanning");

		let mut state = self.state.lock().await;
		state.event = Some(scope);
		state.last_settled = None;
	}

	pub async fn selected_event(&self) -> Option<EventScope> {
		self.state.lock().await.event.clone()
	}

	/// Handles one decoded code.
	///
	/// Returns `Ok(None)` when the code repeats the previous one within the dedup window.
	/// Storage failures are the only hard errors; the attempt is then kept in memory and
	/// retried before the next recording.
	#[instrument(skip(self), fields(ambassador_id = %self.session.ambassador_id))]
	pub async fn handle_decoded(&self, code: &str) -> Result<Option<ScanReport>, Error> {
		let mut state = self.state.lock().await;

		self.set_phase(ScanPhase::Detected);

		let Some(scope) = state.event.clone() else {
			self.set_phase(ScanPhase::Idle);
			return Err(Error::NoEventSelected);
		};

		if state.is_duplicate(code, self.settings.dedup_window) {
			trace!("Dropped repeated code inside dedup window");
			self.set_phase(ScanPhase::Idle);
			return Ok(None);
		}

		self.set_phase(ScanPhase::Deduplicating);

		let captured_at = Utc::now();
		let reachability = self
			.monitor
			.assess(&*self.store, self.settings.probe_timeout)
			.await;

		self.set_phase(ScanPhase::Validating);

		self.attempts.fetch_add(1, Ordering::Relaxed);
		let today = captured_at.date_naive();
		let online = reachability.is_online();

		let decision = if online {
			let lookup: &dyn TicketLookup =
				&RemoteLookup::new(&*self.store, self.settings.remote_timeout);
			self.validator
				.validate(code, &scope, Some(lookup), today)
				.await
		} else {
			debug!(?reachability, "Validating offline");
			let lookup = self.offline_lookup(&scope.id).await;
			self.validator.validate(code, &scope, lookup, today).await
		};

		self.set_phase(ScanPhase::Recording);

		if let Err(e) = self.flush_stranded().await {
			warn!(?e, "Stranded attempts still not stored");
		}

		let attempt = ScanAttempt::new(
			code,
			scope.id,
			&self.session,
			captured_at,
			decision.outcome.clone(),
		);

		let recorded = if online {
			self.record_online(attempt, &decision).await
		} else {
			self.record_offline(attempt).await
		};

		let report = match recorded {
			Ok(report) => report,
			Err(e) => {
				if let Some(attempt) = e.stranded_attempt() {
					// A stranded attempt opens the dedup window like a settled one.
					state.last_settled = Some((code.to_string(), Instant::now()));
					self.stranded.lock().await.push(attempt.clone());
				}
				self.set_phase(ScanPhase::Idle);
				return Err(e);
			}
		};

		state.last_settled = Some((code.to_string(), Instant::now()));
		{
			let mut records = self.records.lock().await;
			records.history.push(report.clone());
			records.stats.record(&report);
		}

		self.set_phase(ScanPhase::Settled);

		info!(
			attempt_id = %report.attempt.id,
			outcome = %report.attempt.outcome.kind(),
			stored_offline = report.stored_offline,
			"Scan settled"
		);

		Ok(Some(report))
	}

	async fn offline_lookup(&self, event_id: &EventId) -> Option<&dyn TicketLookup> {
		let catalog: &dyn TicketLookup = &self.catalog;

		match self.catalog.has_event(event_id).await {
			Ok(true) => Some(catalog),
			Ok(false) => None,
			Err(e) => {
				warn!(?e, %event_id, "Failed to check offline catalog, using heuristic");
				None
			}
		}
	}

	async fn record_online(
		&self,
		mut attempt: ScanAttempt,
		decision: &Decision,
	) -> Result<ScanReport, Error> {
		if decision.requires_redemption {
			let transition = timeout(
				self.settings.remote_timeout,
				self.store.transition_ticket_status(
					&attempt.code,
					TicketStatus::Active,
					TicketStatus::Used,
				),
			)
			.await
			.unwrap_or(Err(RemoteError::Timeout));

			match transition {
				Ok(_) => attempt.redeemed = true,
				Err(RemoteError::Conflict { current, .. }) => {
					debug!(%current, "Lost redemption race");
					attempt.outcome = Outcome::AlreadyUsed {
						ticket: decision
							.ticket
							.as_ref()
							.map(|ticket| ticket.summary())
							.unwrap_or_default(),
					};
				}
				Err(RemoteError::TicketNotFound(_)) => {
					attempt.outcome = Outcome::invalid(InvalidReason::NotFound);
				}
				Err(e) => {
					warn!(?e, "Redemption failed, storing offline");
					return self.persist(attempt, false).await;
				}
			}
		}

		match timeout(self.settings.remote_timeout, self.store.append_scan(&attempt))
			.await
			.unwrap_or(Err(RemoteError::Timeout))
		{
			Ok(()) => Ok(ScanReport {
				attempt,
				stored_offline: false,
				authoritative: true,
			}),
			Err(e) => {
				warn!(?e, "Failed to append scan, storing offline");
				// The store already decided the outcome, only the audit entry is pending.
				self.persist(attempt, true).await
			}
		}
	}

	async fn record_offline(&self, attempt: ScanAttempt) -> Result<ScanReport, Error> {
		let admitted_from_catalog = matches!(attempt.outcome, Outcome::Valid { .. });
		let code = attempt.code.clone();

		let report = self.persist(attempt, false).await?;

		if admitted_from_catalog {
			if let Err(e) = self.catalog.mark_used_locally(&code).await {
				warn!(?e, "Failed to mark cached ticket as used");
			}
		}

		Ok(report)
	}

	/// Enqueues the attempt, retrying once before giving up.
	async fn persist(&self, attempt: ScanAttempt, authoritative: bool) -> Result<ScanReport, Error> {
		let attempt = match self.queue.enqueue(attempt.clone()).await {
			Ok(stored) => stored,
			Err(e) => {
				warn!(?e, attempt_id = %attempt.id, "Enqueue failed, retrying once");
				self.queue
					.enqueue(attempt.clone())
					.await
					.map_err(|source| Error::StorageEscalated {
						attempt: Box::new(attempt),
						source,
					})?
			}
		};

		Ok(ScanReport {
			attempt,
			stored_offline: true,
			authoritative,
		})
	}

	/// Stops at the first failure, keeping that attempt and the ones after it.
	async fn flush_stranded(&self) -> Result<usize, db::Error> {
		let mut stranded = self.stranded.lock().await;
		let mut flushed = 0;

		while let Some(attempt) = stranded.first() {
			self.queue.enqueue(attempt.clone()).await?;
			stranded.remove(0);
			flushed += 1;
		}

		if flushed > 0 {
			info!(flushed, "Stored previously stranded scan attempts");
		}

		Ok(flushed)
	}

	/// Tries to store attempts that could not be enqueued earlier. Returns how many were stored.
	pub async fn retry_stranded(&self) -> Result<usize, Error> {
		self.flush_stranded().await.map_err(Into::into)
	}

	pub async fn stranded_count(&self) -> usize {
		self.stranded.lock().await.len()
	}

	/// Upcoming events, fresh from the store when it answers, from the local cache otherwise.
	pub async fn load_events(&self) -> Result<Vec<Event>, Error> {
		let today = Utc::now().date_naive();
		let filter = EventFilter::upcoming(today);

		if self
			.monitor
			.assess(&*self.store, self.settings.probe_timeout)
			.await
			.is_online()
		{
			match timeout(self.settings.remote_timeout, self.store.list_events(&filter))
				.await
				.unwrap_or(Err(RemoteError::Timeout))
			{
				Ok(events) => {
					self.catalog.cache_events(&events).await?;
					return Ok(events);
				}
				Err(e) => warn!(?e, "Failed to list events, using cached events"),
			}
		}

		Ok(self
			.catalog
			.cached_events()
			.await?
			.into_iter()
			.filter(|event| filter.matches(event))
			.collect())
	}

	/// Downloads the tickets of `event` so it can be validated while offline.
	pub async fn download_catalog(&self, event: &Event) -> Result<usize, Error> {
		self.catalog
			.download_event(&*self.store, event, self.settings.remote_timeout)
			.await
	}

	/// Most recent first.
	pub async fn history(&self) -> Vec<ScanReport> {
		self.records.lock().await.history.to_vec()
	}

	/// Settled reports matching `query`, most recent first.
	pub async fn filter_history(&self, query: &ScanQuery) -> Vec<ScanReport> {
		self.records.lock().await.history.filter(query)
	}

	pub async fn stats(&self) -> ScanStats {
		self.records.lock().await.stats.clone()
	}

	/// Attempts that reached validation, duplicates excluded.
	pub async fn attempt_count(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	#[must_use]
	pub fn phase(&self) -> ScanPhase {
		*self.phase.borrow()
	}

	#[must_use]
	pub fn subscribe_phase(&self) -> watch::Receiver<ScanPhase> {
		self.phase.subscribe()
	}

	#[must_use]
	pub const fn session(&self) -> &ScanSession {
		&self.session
	}

	#[must_use]
	pub const fn queue(&self) -> &LocalQueue {
		&self.queue
	}

	#[must_use]
	pub const fn catalog(&self) -> &Catalog {
		&self.catalog
	}

	fn set_phase(&self, phase: ScanPhase) {
		trace!(%phase, "Scan phase");
		self.phase.send_replace(phase);
	}
}
