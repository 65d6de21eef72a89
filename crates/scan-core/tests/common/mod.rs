#![allow(dead_code)]

use tg_remote_store::{MemoryStore, RemoteStore};
use tg_scan_core::{
	ConnectivityMonitor, LocalDatabase, LocalQueue, ScanOrchestrator, ScannerConfig, Synchronizer,
};
use tg_scan_types::{
	AmbassadorId, Event, EventId, Outcome, ScanAttempt, ScanSession, Ticket, TicketStatus,
};

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use tempfile::{tempdir, TempDir};

pub fn today() -> NaiveDate {
	Utc::now().date_naive()
}

pub fn event(id: &str) -> Event {
	Event {
		id: EventId::from(id),
		name: format!("Event {id}"),
		date: today(),
	}
}

pub fn past_event(id: &str) -> Event {
	Event {
		date: today() - ChronoDuration::days(1),
		..event(id)
	}
}

pub fn ticket(code: &str, event: &str, status: TicketStatus) -> Ticket {
	Ticket {
		code: code.to_string(),
		event_id: EventId::from(event),
		status,
		customer_name: Some(format!("Holder of {code}")),
		ticket_type: Some("General".to_string()),
	}
}

pub fn session(ambassador: &str) -> ScanSession {
	ScanSession {
		ambassador_id: AmbassadorId::from(ambassador),
		device_info: format!("{ambassador}-phone"),
		location: "North gate".to_string(),
	}
}

/// Millisecond precision, the precision the queue persists.
pub fn at_ms(offset_ms: i64) -> DateTime<Utc> {
	DateTime::from_timestamp_millis(1_760_000_000_000 + offset_ms).unwrap()
}

pub fn attempt(code: &str, event: &str, captured_at: DateTime<Utc>, outcome: Outcome) -> ScanAttempt {
	ScanAttempt::new(
		code,
		EventId::from(event),
		&session("amb-1"),
		captured_at,
		outcome,
	)
}

/// One scanning device: its own data directory and database, talking to `store`.
pub struct Device {
	pub dir: TempDir,
	pub config: ScannerConfig,
	pub db: LocalDatabase,
	pub store: Arc<MemoryStore>,
	pub monitor: Arc<ConnectivityMonitor>,
}

impl Device {
	pub async fn new() -> Self {
		Self::with_store(Arc::new(MemoryStore::new()), |_| {}).await
	}

	pub async fn configured(configure: impl FnOnce(&mut ScannerConfig)) -> Self {
		Self::with_store(Arc::new(MemoryStore::new()), configure).await
	}

	pub async fn with_store(
		store: Arc<MemoryStore>,
		configure: impl FnOnce(&mut ScannerConfig),
	) -> Self {
		let dir = tempdir().unwrap();

		let mut config = ScannerConfig::default_with_dir(dir.path().to_path_buf());
		config.probe_timeout_ms = 200;
		config.remote_timeout_ms = 500;
		configure(&mut config);

		let db = LocalDatabase::open_and_migrate(&config.database_path())
			.await
			.unwrap();

		Self {
			dir,
			config,
			db,
			store,
			monitor: Arc::new(ConnectivityMonitor::new(true)),
		}
	}

	pub fn remote(&self) -> Arc<dyn RemoteStore> {
		self.store.clone()
	}

	pub fn queue(&self) -> LocalQueue {
		LocalQueue::new(&self.db)
	}

	pub fn orchestrator(&self, ambassador: &str) -> ScanOrchestrator {
		ScanOrchestrator::new(
			session(ambassador),
			&self.config,
			self.remote(),
			Arc::clone(&self.monitor),
			&self.db,
		)
	}

	pub fn synchronizer(&self) -> Synchronizer {
		Synchronizer::new(self.queue(), self.remote(), self.config.remote_timeout())
	}
}
