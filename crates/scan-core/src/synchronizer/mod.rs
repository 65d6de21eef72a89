//! Drains the local queue into the authoritative store.
//!
//! A run walks unsynced attempts oldest first, appends each one to the remote audit log and
//! marks it synced. The first failure ends the run; the remaining attempts wait for the next
//! trigger. Runs never redeem tickets, they only report what happened on the device.

use tg_remote_store::RemoteStore;
use tg_scan_types::{Outcome, ScanAttempt, ScanAttemptId};

use std::{
	pin::pin,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
	time::Duration,
};

use futures::StreamExt;
use strum::{AsRefStr, Display};
use tokio::{sync::Mutex, time::timeout};
use tracing::{debug, error, info, instrument, warn};

use super::{error::ErrorKind, queue::LocalQueue, validator::Validator, Error};

mod runner;

pub use runner::SyncRunner;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SyncTrigger {
	Startup,
	ConnectivityRestored,
	Periodic,
	Manual,
}

/// The attempt a run stopped at, if it stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
	/// Absent when the queue itself could not be read.
	pub attempt_id: Option<ScanAttemptId>,
	pub kind: ErrorKind,
	pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
	pub trigger: SyncTrigger,
	pub synced: usize,
	/// `unverified_offline` attempts whose outcome was narrowed before being sent.
	pub refined: usize,
	pub failed: Option<SyncFailure>,
	/// Another run was in progress; this trigger was folded into it.
	pub coalesced: bool,
}

impl SyncReport {
	const fn new(trigger: SyncTrigger) -> Self {
		Self {
			trigger,
			synced: 0,
			refined: 0,
			failed: None,
			coalesced: false,
		}
	}

	fn coalesced(trigger: SyncTrigger) -> Self {
		Self {
			coalesced: true,
			..Self::new(trigger)
		}
	}

	#[must_use]
	pub const fn is_complete(&self) -> bool {
		self.failed.is_none() && !self.coalesced
	}

	fn absorb(&mut self, follow_up: Self) {
		self.synced += follow_up.synced;
		self.refined += follow_up.refined;
		self.failed = follow_up.failed;
	}
}

pub struct Synchronizer {
	queue: LocalQueue,
	store: Arc<dyn RemoteStore>,
	remote_timeout: Duration,
	drain_lock: Mutex<()>,
	rerun_requested: AtomicBool,
}

impl Synchronizer {
	#[must_use]
	pub fn new(queue: LocalQueue, store: Arc<dyn RemoteStore>, remote_timeout: Duration) -> Self {
		Self {
			queue,
			store,
			remote_timeout,
			drain_lock: Mutex::new(()),
			rerun_requested: AtomicBool::new(false),
		}
	}

	/// Runs the queue for `trigger`.
	///
	/// If a run is already in progress the trigger is coalesced into it: this returns
	/// immediately and the running call keeps running follow-ups while new requests arrive,
	/// until one finishes with nothing left to honour or a run fails.
	pub async fn trigger(&self, trigger: SyncTrigger) -> SyncReport {
		let mut report = SyncReport::new(trigger);
		let mut ran = false;

		loop {
			// Raised before taking the lock; the holder re-checks it after releasing.
			self.rerun_requested.store(true, Ordering::SeqCst);

			let Ok(guard) = self.drain_lock.try_lock() else {
				if ran {
					return report;
				}
				debug!(%trigger, "Sync already running, coalescing trigger");
				return SyncReport::coalesced(trigger);
			};

			while report.failed.is_none() && self.rerun_requested.swap(false, Ordering::SeqCst) {
				if ran {
					debug!(%trigger, "Running follow-up sync for coalesced triggers");
				}
				report.absorb(self.drain(trigger).await);
				ran = true;
			}

			drop(guard);

			if report.failed.is_some() || !self.rerun_requested.load(Ordering::SeqCst) {
				return report;
			}
		}
	}

	#[instrument(skip_all, fields(%trigger))]
	async fn drain(&self, trigger: SyncTrigger) -> SyncReport {
		let mut report = SyncReport::new(trigger);
		let mut unsynced = pin!(self.queue.list_unsynced());

		while let Some(next) = unsynced.next().await {
			let attempt = match next {
				Ok(attempt) => attempt,
				Err(e) => {
					error!(?e, "Failed to read unsynced scan attempts");
					let e = Error::from(e);
					report.failed = Some(SyncFailure {
						attempt_id: None,
						kind: e.kind(),
						message: e.to_string(),
					});
					break;
				}
			};

			let attempt_id = attempt.id;
			match self.sync_attempt(attempt).await {
				Ok(refined) => {
					report.synced += 1;
					if refined {
						report.refined += 1;
					}
				}
				Err(e) => {
					warn!(%attempt_id, ?e, "Sync stopped, remaining attempts wait for the next run");

					if let Err(e) = self
						.queue
						.record_sync_failure(attempt_id, &e.to_string())
						.await
					{
						error!(%attempt_id, ?e, "Failed to record sync failure");
					}

					report.failed = Some(SyncFailure {
						attempt_id: Some(attempt_id),
						kind: e.kind(),
						message: e.to_string(),
					});
					break;
				}
			}
		}

		if report.synced > 0 || report.failed.is_some() {
			info!(
				synced = report.synced,
				refined = report.refined,
				failed = report.failed.is_some(),
				"Sync run finished"
			);
		}

		report
	}

	/// Returns whether the outcome was refined before sending.
	async fn sync_attempt(&self, mut attempt: ScanAttempt) -> Result<bool, Error> {
		let mut refined = false;

		if attempt.outcome == Outcome::UnverifiedOffline {
			let found = timeout(self.remote_timeout, self.store.lookup_ticket(&attempt.code))
				.await
				.map_err(|_| tg_remote_store::Error::Timeout)??;

			let outcome = Validator::reconcile_unverified(&attempt.event_id, found.as_ref());
			if outcome != attempt.outcome {
				debug!(attempt_id = %attempt.id, kind = %outcome.kind(), "Refined offline outcome");
				self.queue.update_outcome(attempt.id, &outcome).await?;
				attempt.outcome = outcome;
				refined = true;
			}
		}

		if attempt.is_unredeemed_admission() {
			warn!(
				attempt_id = %attempt.id,
				code = %attempt.code,
				"Syncing an admission the store never redeemed"
			);
		}

		// The store ignores repeated appends of the same attempt, so a run abandoned between
		// the append and the mark is safe to replay.
		timeout(self.remote_timeout, self.store.append_scan(&attempt))
			.await
			.map_err(|_| tg_remote_store::Error::Timeout)??;

		self.queue.mark_synced(attempt.id).await?;

		Ok(refined)
	}

	#[must_use]
	pub const fn queue(&self) -> &LocalQueue {
		&self.queue
	}
}
