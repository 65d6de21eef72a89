use tg_scan_types::{
	Event, EventFilter, EventId, ScanAttempt, ScanAttemptId, Ticket, TicketStatus,
};

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
	time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, time::sleep};
use tracing::{debug, trace};

use super::{Error, RemoteStore};

/// One row of the scan audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
	pub attempt: ScanAttempt,
	pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
	tickets: HashMap<String, Ticket>,
	events: BTreeMap<EventId, Event>,
	audit_log: Vec<AuditEntry>,
	recorded: HashSet<ScanAttemptId>,
}

/// Authoritative store kept in process memory.
///
/// Every operation runs under a single lock, which linearizes conditional updates the same
/// way a row-level compare-and-swap would. Reachability, latency and injected failures can be
/// controlled to simulate an unreliable network.
#[derive(Debug)]
pub struct MemoryStore {
	state: Mutex<State>,
	reachable: AtomicBool,
	latency_ms: AtomicU64,
	failing_appends: AtomicUsize,
	failing_transitions: AtomicUsize,
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self {
			state: Mutex::default(),
			reachable: AtomicBool::new(true),
			latency_ms: AtomicU64::new(0),
			failing_appends: AtomicUsize::new(0),
			failing_transitions: AtomicUsize::new(0),
		}
	}
}

impl MemoryStore {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn insert_event(&self, event: Event) {
		self.state
			.lock()
			.await
			.events
			.insert(event.id.clone(), event);
	}

	pub async fn insert_ticket(&self, ticket: Ticket) {
		self.state
			.lock()
			.await
			.tickets
			.insert(ticket.code.clone(), ticket);
	}

	pub fn set_reachable(&self, reachable: bool) {
		self.reachable.store(reachable, Ordering::Release);
	}

	#[must_use]
	pub fn is_reachable(&self) -> bool {
		self.reachable.load(Ordering::Acquire)
	}

	/// Delay applied to every request before it reaches the store state.
	pub fn set_latency(&self, latency: Duration) {
		self.latency_ms.store(
			u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
			Ordering::Relaxed,
		);
	}

	/// The next `count` audit appends fail as if the connection dropped mid-request.
	pub fn fail_next_appends(&self, count: usize) {
		self.failing_appends.store(count, Ordering::Release);
	}

	/// The next `count` status transitions fail as if the connection dropped mid-request.
	pub fn fail_next_transitions(&self, count: usize) {
		self.failing_transitions.store(count, Ordering::Release);
	}

	pub async fn ticket(&self, code: &str) -> Option<Ticket> {
		self.state.lock().await.tickets.get(code).cloned()
	}

	pub async fn audit_log(&self) -> Vec<AuditEntry> {
		self.state.lock().await.audit_log.clone()
	}

	pub async fn audit_entries_for(&self, code: &str) -> Vec<AuditEntry> {
		self.state
			.lock()
			.await
			.audit_log
			.iter()
			.filter(|entry| entry.attempt.code == code)
			.cloned()
			.collect()
	}

	async fn round_trip(&self) -> Result<(), Error> {
		let latency = self.latency_ms.load(Ordering::Relaxed);
		if latency > 0 {
			sleep(Duration::from_millis(latency)).await;
		}

		if self.is_reachable() {
			Ok(())
		} else {
			Err(Error::Unavailable("network unreachable".to_string()))
		}
	}

	fn take_injected_failure(counter: &AtomicUsize) -> bool {
		counter
			.try_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
			.is_ok()
	}
}

#[async_trait]
impl RemoteStore for MemoryStore {
	async fn probe(&self) -> Result<(), Error> {
		self.round_trip().await
	}

	async fn lookup_ticket(&self, code: &str) -> Result<Option<Ticket>, Error> {
		self.round_trip().await?;

		Ok(self.state.lock().await.tickets.get(code).cloned())
	}

	async fn transition_ticket_status(
		&self,
		code: &str,
		expected: TicketStatus,
		new: TicketStatus,
	) -> Result<Ticket, Error> {
		self.round_trip().await?;

		if Self::take_injected_failure(&self.failing_transitions) {
			return Err(Error::Unavailable("connection reset during update".to_string()));
		}

		let mut state = self.state.lock().await;
		let ticket = state
			.tickets
			.get_mut(code)
			.ok_or_else(|| Error::TicketNotFound(code.to_string()))?;

		if ticket.status != expected {
			debug!(%code, current = %ticket.status, "Rejected conditional status update");
			return Err(Error::Conflict {
				code: code.to_string(),
				current: ticket.status,
			});
		}

		ticket.status = new;

		Ok(ticket.clone())
	}

	async fn append_scan(&self, attempt: &ScanAttempt) -> Result<(), Error> {
		self.round_trip().await?;

		if Self::take_injected_failure(&self.failing_appends) {
			return Err(Error::Unavailable("connection reset during append".to_string()));
		}

		let mut state = self.state.lock().await;
		if !state.recorded.insert(attempt.id) {
			trace!(attempt_id = %attempt.id, "Scan already in audit log, skipping");
			return Ok(());
		}

		state.audit_log.push(AuditEntry {
			attempt: attempt.clone(),
			received_at: Utc::now(),
		});

		Ok(())
	}

	async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, Error> {
		self.round_trip().await?;

		let mut events = self
			.state
			.lock()
			.await
			.events
			.values()
			.filter(|event| filter.matches(event))
			.cloned()
			.collect::<Vec<_>>();

		events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

		Ok(events)
	}

	async fn tickets_for_event(&self, event_id: &EventId) -> Result<Vec<Ticket>, Error> {
		self.round_trip().await?;

		Ok(self
			.state
			.lock()
			.await
			.tickets
			.values()
			.filter(|ticket| &ticket.event_id == event_id)
			.cloned()
			.collect())
	}
}
