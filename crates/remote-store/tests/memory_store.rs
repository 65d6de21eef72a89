use tg_remote_store::{Error, MemoryStore, RemoteStore};
use tg_scan_types::{
	AmbassadorId, Event, EventFilter, EventId, Outcome, ScanAttempt, ScanSession, Ticket,
	TicketStatus, TicketSummary,
};

use std::{sync::Arc, time::Duration};

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use tracing_test::traced_test;

fn ticket(code: &str, event: &str, status: TicketStatus) -> Ticket {
	Ticket {
		code: code.to_string(),
		event_id: EventId::from(event),
		status,
		customer_name: Some("Ada".to_string()),
		ticket_type: Some("VIP".to_string()),
	}
}

fn attempt(code: &str) -> ScanAttempt {
	let session = ScanSession {
		ambassador_id: AmbassadorId::from("amb-1"),
		device_info: "test-device".to_string(),
		location: "Gate A".to_string(),
	};

	ScanAttempt::new(
		code,
		EventId::from("E-1"),
		&session,
		Utc::now(),
		Outcome::Valid {
			ticket: TicketSummary::default(),
		},
	)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn racing_conditional_updates_have_exactly_one_winner() {
	let store = Arc::new(MemoryStore::new());
	store
		.insert_ticket(ticket("T-1", "E-1", TicketStatus::Active))
		.await;
	store.set_latency(Duration::from_millis(5));

	let results = join_all((0..8).map(|_| {
		let store = Arc::clone(&store);
		tokio::spawn(async move {
			store
				.transition_ticket_status("T-1", TicketStatus::Active, TicketStatus::Used)
				.await
		})
	}))
	.await
	.into_iter()
	.map(|joined| joined.unwrap())
	.collect::<Vec<_>>();

	assert_eq!(results.iter().filter(|res| res.is_ok()).count(), 1);
	assert!(results.iter().filter(|res| res.is_err()).all(|res| matches!(
		res,
		Err(Error::Conflict {
			current: TicketStatus::Used,
			..
		})
	)));
	assert_eq!(
		store.ticket("T-1").await.unwrap().status,
		TicketStatus::Used
	);
}

#[tokio::test]
async fn append_is_idempotent_per_attempt() {
	let store = MemoryStore::new();
	let first = attempt("T-1");

	store.append_scan(&first).await.unwrap();
	store.append_scan(&first).await.unwrap();
	store.append_scan(&attempt("T-1")).await.unwrap();

	let entries = store.audit_entries_for("T-1").await;
	assert_eq!(entries.len(), 2);
	assert_eq!(entries[0].attempt.id, first.id);
}

#[tokio::test]
async fn unreachable_store_rejects_every_request() {
	let store = MemoryStore::new();
	store.set_reachable(false);

	assert!(matches!(store.probe().await, Err(Error::Unavailable(_))));
	assert!(store.lookup_ticket("T-1").await.unwrap_err().is_unavailable());
	assert!(store.append_scan(&attempt("T-1")).await.is_err());
	assert!(store.audit_log().await.is_empty());

	store.set_reachable(true);
	assert!(store.probe().await.is_ok());
}

#[tokio::test]
async fn injected_failures_are_consumed_one_by_one() {
	let store = MemoryStore::new();
	store.fail_next_appends(2);

	assert!(store.append_scan(&attempt("A")).await.is_err());
	assert!(store.append_scan(&attempt("B")).await.is_err());
	assert!(store.append_scan(&attempt("C")).await.is_ok());

	assert_eq!(store.audit_log().await.len(), 1);
}

#[tokio::test]
async fn transition_of_unknown_ticket_is_not_found() {
	let store = MemoryStore::new();

	assert!(matches!(
		store
			.transition_ticket_status("nope", TicketStatus::Active, TicketStatus::Used)
			.await,
		Err(Error::TicketNotFound(code)) if code == "nope"
	));
}

#[tokio::test]
async fn lists_upcoming_events_in_date_order() {
	let store = MemoryStore::new();
	let day = |d| NaiveDate::from_ymd_opt(2026, 10, d).unwrap();

	for (id, date) in [("E-3", day(25)), ("E-1", day(1)), ("E-2", day(20))] {
		store
			.insert_event(Event {
				id: EventId::from(id),
				name: format!("Event {id}"),
				date,
			})
			.await;
	}

	let events = store
		.list_events(&EventFilter::upcoming(day(19)))
		.await
		.unwrap();

	assert_eq!(
		events.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
		vec!["E-2", "E-3"]
	);
}

#[tokio::test]
async fn tickets_for_event_only_returns_that_event() {
	let store = MemoryStore::new();
	store
		.insert_ticket(ticket("T-1", "E-1", TicketStatus::Active))
		.await;
	store
		.insert_ticket(ticket("T-2", "E-2", TicketStatus::Active))
		.await;
	store
		.insert_ticket(ticket("T-3", "E-1", TicketStatus::Used))
		.await;

	let mut codes = store
		.tickets_for_event(&EventId::from("E-1"))
		.await
		.unwrap()
		.into_iter()
		.map(|t| t.code)
		.collect::<Vec<_>>();
	codes.sort();

	assert_eq!(codes, vec!["T-1", "T-3"]);
}
