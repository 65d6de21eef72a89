use tg_scan_core::{db, LocalDatabase, LocalQueue, ScanQuery};
use tg_scan_types::{EventId, InvalidReason, Outcome, OutcomeKind, TicketSummary};

use std::pin::pin;

use futures::{StreamExt, TryStreamExt};
use tracing_test::traced_test;

mod common;

use common::{at_ms, attempt, Device};

#[tokio::test]
#[traced_test]
async fn enqueue_persists_unsynced() {
	let device = Device::new().await;
	let queue = device.queue();

	let queued = attempt("T-1", "E-1", at_ms(0), Outcome::UnverifiedOffline);
	let stored = queue.enqueue(queued.clone()).await.unwrap();

	assert_eq!(stored, queued);
	assert!(!stored.synced);
	assert_eq!(queue.count_unsynced().await.unwrap(), 1);
	assert_eq!(queue.get(queued.id).await.unwrap(), Some(queued));
}

#[tokio::test]
async fn lists_unsynced_by_capture_time_across_pages() {
	let device = Device::new().await;
	let queue = device.queue().with_page_size(2);

	// Inserted out of capture order, two of them in the same millisecond.
	let mut expected = Vec::new();
	for (code, offset) in [("C", 30), ("A", 10), ("B", 20), ("B2", 20), ("D", 40)] {
		let stored = queue
			.enqueue(attempt(code, "E-1", at_ms(offset), Outcome::UnverifiedOffline))
			.await
			.unwrap();
		expected.push((offset, stored.code));
	}
	expected.sort_by_key(|(offset, _)| *offset);

	let listed = queue
		.list_unsynced()
		.map_ok(|attempt| attempt.code)
		.try_collect::<Vec<_>>()
		.await
		.unwrap();

	assert_eq!(
		listed,
		expected.into_iter().map(|(_, code)| code).collect::<Vec<_>>()
	);
}

#[tokio::test]
async fn marking_while_iterating_neither_skips_nor_repeats() {
	let device = Device::new().await;
	let queue = device.queue().with_page_size(2);

	for offset in 0..7 {
		queue
			.enqueue(attempt(
				&format!("T-{offset}"),
				"E-1",
				at_ms(offset),
				Outcome::UnverifiedOffline,
			))
			.await
			.unwrap();
	}

	let mut seen = Vec::new();
	let mut unsynced = pin!(queue.list_unsynced());
	while let Some(next) = unsynced.next().await {
		let attempt = next.unwrap();
		queue.mark_synced(attempt.id).await.unwrap();
		seen.push(attempt.code);
	}

	assert_eq!(
		seen,
		(0..7).map(|offset| format!("T-{offset}")).collect::<Vec<_>>()
	);
	assert_eq!(queue.count_unsynced().await.unwrap(), 0);

	// A fresh listing starts over and finds nothing left.
	assert_eq!(queue.list_unsynced().count().await, 0);
}

#[tokio::test]
async fn mark_synced_is_idempotent() {
	let device = Device::new().await;
	let queue = device.queue();

	let stored = queue
		.enqueue(attempt("T-1", "E-1", at_ms(0), Outcome::UnverifiedOffline))
		.await
		.unwrap();

	queue.mark_synced(stored.id).await.unwrap();
	queue.mark_synced(stored.id).await.unwrap();

	assert!(queue.get(stored.id).await.unwrap().unwrap().synced);
	assert_eq!(queue.count_unsynced().await.unwrap(), 0);

	let unknown = uuid::Uuid::new_v4();
	assert!(matches!(
		queue.mark_synced(unknown).await,
		Err(db::Error::NotFound(id)) if id == unknown
	));
}

#[tokio::test]
async fn survives_reopening_the_database() {
	let device = Device::new().await;
	let path = device.config.database_path();

	let mut redeemed = attempt(
		"T-1",
		"E-1",
		at_ms(5),
		Outcome::Valid {
			ticket: TicketSummary::default(),
		},
	);
	redeemed.redeemed = true;

	let stored = device.queue().enqueue(redeemed).await.unwrap();

	device.db.clone().close().await.unwrap();

	let reopened = LocalDatabase::open_and_migrate(&path).await.unwrap();
	let queue = LocalQueue::new(&reopened);

	assert_eq!(queue.count_unsynced().await.unwrap(), 1);
	assert_eq!(queue.get(stored.id).await.unwrap(), Some(stored));
}

#[tokio::test]
async fn bookkeeping_and_refinement() {
	let device = Device::new().await;
	let queue = device.queue();

	let first = queue
		.enqueue(attempt("T-1", "E-1", at_ms(0), Outcome::UnverifiedOffline))
		.await
		.unwrap();
	let second = queue
		.enqueue(attempt("T-2", "E-1", at_ms(1), Outcome::UnverifiedOffline))
		.await
		.unwrap();

	queue
		.record_sync_failure(first.id, "remote store unreachable")
		.await
		.unwrap();
	queue
		.record_sync_failure(first.id, "remote store request timed out")
		.await
		.unwrap();
	assert_eq!(
		queue.sync_failures(first.id).await.unwrap(),
		(2, Some("remote store request timed out".to_string()))
	);

	let refined = Outcome::invalid(InvalidReason::NotFound);
	queue.update_outcome(first.id, &refined).await.unwrap();
	let updated = queue.get(first.id).await.unwrap().unwrap();
	assert_eq!(updated.outcome.kind(), OutcomeKind::Invalid);
	assert_eq!(updated.outcome, refined);
	assert!(!updated.synced);

	let recent = queue.recent(10).await.unwrap();
	assert_eq!(
		recent.iter().map(|a| a.id).collect::<Vec<_>>(),
		vec![second.id, first.id]
	);
}

#[tokio::test]
async fn searches_by_kind_event_and_code() {
	let device = Device::new().await;
	let queue = device.queue();

	for (offset, (code, event, outcome)) in [
		("VIP-001", "E-1", Outcome::UnverifiedOffline),
		("GEN-002", "E-1", Outcome::invalid(InvalidReason::NotFound)),
		("vip-003", "E-2", Outcome::UnverifiedOffline),
	]
	.into_iter()
	.enumerate()
	{
		queue
			.enqueue(attempt(code, event, at_ms(i64::try_from(offset).unwrap()), outcome))
			.await
			.unwrap();
	}

	let codes = |attempts: Vec<tg_scan_types::ScanAttempt>| {
		attempts.into_iter().map(|a| a.code).collect::<Vec<_>>()
	};

	assert_eq!(
		codes(
			queue
				.search(
					&ScanQuery {
						code_contains: Some("vip".to_string()),
						..Default::default()
					},
					10
				)
				.await
				.unwrap()
		),
		vec!["vip-003", "VIP-001"]
	);

	assert_eq!(
		codes(
			queue
				.search(
					&ScanQuery {
						kind: Some(OutcomeKind::UnverifiedOffline),
						event_id: Some(EventId::from("E-1")),
						..Default::default()
					},
					10
				)
				.await
				.unwrap()
		),
		vec!["VIP-001"]
	);

	assert_eq!(
		codes(queue.search(&ScanQuery::default(), 2).await.unwrap()),
		vec!["vip-003", "GEN-002"]
	);
}
