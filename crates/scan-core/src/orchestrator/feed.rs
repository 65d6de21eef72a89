use std::pin::pin;

use futures::{FutureExt, Stream, StreamExt};
use futures_concurrency::future::Race;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{super::history::ScanReport, Error, ScanOrchestrator};

#[derive(Debug)]
pub enum FeedEvent {
	Settled(ScanReport),
	Failed { code: String, error: Error },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedSummary {
	/// Frames the decoder produced, with or without a code.
	pub frames: u64,
	pub settled: u64,
	/// Codes dropped as repeats inside the dedup window.
	pub suppressed: u64,
	pub failed: u64,
}

/// Feeds decoded codes to `orchestrator` one at a time until `decoder` ends or `cancel` fires.
///
/// Cancellation is only observed while waiting for the next frame: a code already handed to
/// the orchestrator is always carried through to its outcome.
pub async fn run_decoder<S>(
	orchestrator: &ScanOrchestrator,
	decoder: S,
	cancel: CancellationToken,
	reports: mpsc::Sender<FeedEvent>,
) -> FeedSummary
where
	S: Stream<Item = Option<String>>,
{
	enum Race {
		Frame(Option<Option<String>>),
		Stopped,
	}

	let mut decoder = pin!(decoder);
	let mut summary = FeedSummary::default();

	loop {
		let frame = match (
			decoder.next().map(Race::Frame),
			cancel.cancelled().map(|()| Race::Stopped),
		)
			.race()
			.await
		{
			Race::Frame(Some(frame)) => frame,
			Race::Frame(None) => {
				debug!("Decoder stream ended");
				break;
			}
			Race::Stopped => {
				debug!("Decoder feed cancelled");
				break;
			}
		};

		summary.frames += 1;

		let Some(code) = frame else {
			continue;
		};

		let event = match orchestrator.handle_decoded(&code).await {
			Ok(Some(report)) => {
				summary.settled += 1;
				FeedEvent::Settled(report)
			}
			Ok(None) => {
				summary.suppressed += 1;
				continue;
			}
			Err(error) => {
				warn!(?error, "Failed to handle decoded code");
				summary.failed += 1;
				FeedEvent::Failed { code, error }
			}
		};

		if reports.send(event).await.is_err() {
			debug!("Report receiver dropped, stopping decoder feed");
			break;
		}
	}

	summary
}
