use tg_scan_core::{run_decoder, FeedEvent, FeedSummary};
use tg_scan_types::{OutcomeKind, TicketStatus};

use futures::{join, stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

mod common;

use common::{event, ticket, Device};

fn frames(codes: &[Option<&str>]) -> Vec<Option<String>> {
	codes
		.iter()
		.map(|code| code.map(ToString::to_string))
		.collect()
}

#[tokio::test]
#[traced_test]
async fn feeds_codes_until_cancelled() {
	let device = Device::new().await;
	device
		.store
		.insert_ticket(ticket("T-1", "E-1", TicketStatus::Active))
		.await;

	let orchestrator = device.orchestrator("amb-1");
	orchestrator.select_event(&event("E-1")).await;

	// The decoder never ends on its own.
	let decoder = stream::iter(frames(&[Some("T-1"), None, Some("T-1"), Some("T-404")]))
		.chain(stream::pending());

	let cancel = CancellationToken::new();
	let (tx, mut rx) = mpsc::channel(8);

	let consume = async {
		let mut kinds = Vec::new();
		while let Some(event) = rx.recv().await {
			match event {
				FeedEvent::Settled(report) => kinds.push(report.attempt.outcome.kind()),
				FeedEvent::Failed { code, error } => panic!("{code} failed: {error}"),
			}

			if kinds.len() == 2 {
				cancel.cancel();
			}
		}
		kinds
	};

	let (summary, kinds) = join!(
		run_decoder(&orchestrator, decoder, cancel.clone(), tx),
		consume
	);

	assert_eq!(kinds, vec![OutcomeKind::Valid, OutcomeKind::Invalid]);
	assert_eq!(
		summary,
		FeedSummary {
			frames: 4,
			settled: 2,
			suppressed: 1,
			failed: 0,
		}
	);
}

#[tokio::test]
async fn errors_are_reported_and_the_feed_goes_on() {
	let device = Device::new().await;
	let orchestrator = device.orchestrator("amb-1");

	let (tx, mut rx) = mpsc::channel(8);
	let summary = run_decoder(
		&orchestrator,
		stream::iter(frames(&[Some("T-1"), Some("T-2")])),
		CancellationToken::new(),
		tx,
	)
	.await;

	assert_eq!(summary.failed, 2);

	let mut failed = Vec::new();
	while let Some(event) = rx.recv().await {
		if let FeedEvent::Failed { code, error } = event {
			assert_eq!(error.kind(), tg_scan_core::ErrorKind::NoEventSelected);
			failed.push(code);
		}
	}
	assert_eq!(failed, vec!["T-1", "T-2"]);
}

#[tokio::test]
async fn dropped_receiver_stops_the_feed() {
	let device = Device::new().await;
	let orchestrator = device.orchestrator("amb-1");
	orchestrator.select_event(&event("E-1")).await;

	let (tx, rx) = mpsc::channel(1);
	drop(rx);

	let summary = run_decoder(
		&orchestrator,
		stream::iter(frames(&[Some("A"), Some("B")])).chain(stream::pending()),
		CancellationToken::new(),
		tx,
	)
	.await;

	assert_eq!(summary.frames, 1);
	assert_eq!(summary.settled, 1);
}
