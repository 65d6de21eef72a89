use tg_remote_store::MemoryStore;
use tg_scan_core::{
	validator::{LookupError, RemoteLookup},
	Catalog, EventScope, TicketLookup, Validator,
};
use tg_scan_types::{EventId, InvalidReason, Outcome, Ticket, TicketStatus};

use std::time::Duration;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use tracing_test::traced_test;

mod common;

use common::{event, ticket, today, Device};

struct BrokenLookup;

#[async_trait]
impl TicketLookup for BrokenLookup {
	async fn find_ticket(&self, _code: &str) -> Result<Option<Ticket>, LookupError> {
		Err(LookupError::TimedOut(Duration::from_millis(1)))
	}
}

fn scope(id: &str) -> EventScope {
	EventScope {
		id: EventId::from(id),
		date: Some(today()),
	}
}

#[tokio::test]
async fn unknown_codes_are_invalid_with_any_catalog() {
	let validator = Validator::new(None, 512);

	let store = MemoryStore::new();
	let remote = RemoteLookup::new(&store, Duration::from_secs(1));

	let device = Device::new().await;
	let catalog = Catalog::new(&device.db);

	for lookup in [&remote as &dyn TicketLookup, &catalog] {
		let decision = validator
			.validate("NOPE", &scope("E-1"), Some(lookup), today())
			.await;
		assert_eq!(decision.outcome, Outcome::invalid(InvalidReason::NotFound));
		assert!(!decision.requires_redemption);
	}
}

#[tokio::test]
async fn used_tickets_are_never_valid() {
	let validator = Validator::new(Some("T-".to_string()), 512);
	let store = MemoryStore::new();
	store
		.insert_ticket(ticket("T-1", "E-1", TicketStatus::Used))
		.await;

	let decision = validator
		.validate(
			"T-1",
			&scope("E-1"),
			Some(&RemoteLookup::new(&store, Duration::from_secs(1))),
			today(),
		)
		.await;

	assert!(matches!(
		&decision.outcome,
		Outcome::AlreadyUsed { ticket } if ticket.customer_name.as_deref() == Some("Holder of T-1")
	));
	assert!(!decision.requires_redemption);
}

#[tokio::test]
async fn active_ticket_requires_redemption() {
	let validator = Validator::new(None, 512);
	let store = MemoryStore::new();
	store
		.insert_ticket(ticket("T-1", "E-1", TicketStatus::Active))
		.await;

	let decision = validator
		.validate(
			"T-1",
			&scope("E-1"),
			Some(&RemoteLookup::new(&store, Duration::from_secs(1))),
			today(),
		)
		.await;

	assert!(matches!(decision.outcome, Outcome::Valid { .. }));
	assert!(decision.requires_redemption);
	assert_eq!(decision.ticket.map(|t| t.code).as_deref(), Some("T-1"));

	// Nothing was written by the validator.
	assert_eq!(
		store.ticket("T-1").await.unwrap().status,
		TicketStatus::Active
	);
}

#[tokio::test]
async fn expiry_is_decided_before_any_lookup() {
	let validator = Validator::new(None, 512);
	let yesterday = today() - ChronoDuration::days(1);

	let decision = validator
		.validate(
			"",
			&EventScope {
				id: EventId::from("E-1"),
				date: Some(yesterday),
			},
			Some(&BrokenLookup),
			today(),
		)
		.await;

	assert_eq!(
		decision.outcome,
		Outcome::Expired {
			event_date: yesterday
		}
	);
}

#[tokio::test]
async fn malformed_codes_skip_the_lookup() {
	let validator = Validator::new(None, 16);

	for code in ["", "   ", "T-\n1", "this code is far too long"] {
		let decision = validator
			.validate(code, &scope("E-1"), Some(&BrokenLookup), today())
			.await;
		assert_eq!(
			decision.outcome,
			Outcome::invalid(InvalidReason::Malformed),
			"{code:?}"
		);
	}
}

#[tokio::test]
#[traced_test]
async fn failed_lookups_are_never_valid() {
	let validator = Validator::new(Some("T-".to_string()), 512);

	let decision = validator
		.validate("T-1", &scope("E-1"), Some(&BrokenLookup), today())
		.await;

	assert_eq!(
		decision.outcome,
		Outcome::invalid(InvalidReason::LookupFailed)
	);
}

#[tokio::test]
async fn remote_lookup_times_out() {
	let store = MemoryStore::new();
	store.set_latency(Duration::from_millis(300));

	let lookup = RemoteLookup::new(&store, Duration::from_millis(20));
	assert!(matches!(
		lookup.find_ticket("T-1").await,
		Err(LookupError::TimedOut(_))
	));
}

#[tokio::test]
async fn heuristic_is_used_without_a_catalog() {
	let validator = Validator::new(Some("TG-".to_string()), 512);

	assert_eq!(
		validator
			.validate("TG-42", &scope("E-1"), None, today())
			.await
			.outcome,
		Outcome::UnverifiedOffline
	);
	assert_eq!(
		validator
			.validate("XX-42", &scope("E-1"), None, today())
			.await
			.outcome,
		Outcome::invalid(InvalidReason::UnrecognizedOffline)
	);
}

#[tokio::test]
async fn catalog_reports_locally_used_tickets() {
	let device = Device::new().await;
	let catalog = Catalog::new(&device.db);
	device
		.store
		.insert_ticket(ticket("T-1", "E-1", TicketStatus::Active))
		.await;
	device
		.store
		.insert_ticket(ticket("T-2", "E-2", TicketStatus::Active))
		.await;

	let count = catalog
		.download_event(&*device.store, &event("E-1"), Duration::from_secs(1))
		.await
		.unwrap();
	assert_eq!(count, 1);
	assert!(catalog.has_event(&EventId::from("E-1")).await.unwrap());
	assert!(!catalog.has_event(&EventId::from("E-2")).await.unwrap());
	assert!(catalog.find("T-2").await.unwrap().is_none());

	let validator = Validator::new(None, 512);
	let first = validator
		.validate("T-1", &scope("E-1"), Some(&catalog), today())
		.await;
	assert!(matches!(first.outcome, Outcome::Valid { .. }));

	assert!(catalog.mark_used_locally("T-1").await.unwrap());
	assert!(!catalog.mark_used_locally("T-9").await.unwrap());

	let second = validator
		.validate("T-1", &scope("E-1"), Some(&catalog), today())
		.await;
	assert!(matches!(second.outcome, Outcome::AlreadyUsed { .. }));

	// A fresh download replaces the local flag with the store's view.
	catalog
		.download_event(&*device.store, &event("E-1"), Duration::from_secs(1))
		.await
		.unwrap();
	assert_eq!(
		catalog.find("T-1").await.unwrap().unwrap().status,
		TicketStatus::Active
	);
}

#[tokio::test]
async fn cached_events_are_listed_by_date() {
	let device = Device::new().await;
	let catalog = Catalog::new(&device.db);

	let mut later = event("E-2");
	later.date = today() + ChronoDuration::days(3);

	catalog
		.cache_events(&[later.clone(), event("E-1")])
		.await
		.unwrap();
	catalog.cache_events(&[]).await.unwrap();

	assert_eq!(catalog.cached_events().await.unwrap(), vec![event("E-1"), later]);
	assert!(!catalog.has_event(&EventId::from("E-1")).await.unwrap());
}
