use std::{sync::Arc, time::Duration};

use futures::FutureExt;
use futures_concurrency::future::Race;
use tokio::{
	sync::Notify,
	task::JoinHandle,
	time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use super::{
	super::connectivity::{ConnectivityMonitor, HandlerId},
	SyncTrigger, Synchronizer,
};

/// Background task running the synchronizer on every trigger source.
pub struct SyncRunner {
	manual: Arc<Notify>,
	cancel: CancellationToken,
	monitor: Arc<ConnectivityMonitor>,
	online_handler: HandlerId,
	handle: JoinHandle<()>,
}

impl SyncRunner {
	/// Starts the task; the first run happens right away.
	#[must_use]
	pub fn spawn(
		sync: Arc<Synchronizer>,
		monitor: Arc<ConnectivityMonitor>,
		interval: Duration,
	) -> Self {
		let restored = Arc::new(Notify::new());
		let manual = Arc::new(Notify::new());
		let cancel = CancellationToken::new();

		let online_handler = monitor.on_became_online({
			let restored = Arc::clone(&restored);
			move || restored.notify_one()
		});

		let handle = tokio::spawn(run(
			sync,
			Arc::clone(&monitor),
			restored,
			Arc::clone(&manual),
			interval,
			cancel.clone(),
		));

		Self {
			manual,
			cancel,
			monitor,
			online_handler,
			handle,
		}
	}

	/// Requests a run. Requests made while a run is in progress collapse into one.
	pub fn notify(&self) {
		self.manual.notify_one();
	}

	/// Stops the task between runs and waits for it.
	pub async fn stop(self) {
		self.monitor.unsubscribe(self.online_handler);
		self.cancel.cancel();

		if let Err(e) = self.handle.await {
			error!(?e, "Sync runner task failed");
		}
	}
}

async fn run(
	sync: Arc<Synchronizer>,
	monitor: Arc<ConnectivityMonitor>,
	restored: Arc<Notify>,
	manual: Arc<Notify>,
	interval: Duration,
	cancel: CancellationToken,
) {
	enum Race {
		Restored,
		Manual,
		Tick,
		Stopped,
	}

	let mut ticks = interval_at(Instant::now() + interval, interval);
	ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

	let mut next = Some(SyncTrigger::Startup);

	loop {
		if let Some(trigger) = next.take() {
			let report = sync.trigger(trigger).await;
			trace!(?report, "Sync trigger handled");
		}

		next = match (
			restored.notified().map(|()| Race::Restored),
			manual.notified().map(|()| Race::Manual),
			ticks.tick().map(|_| Race::Tick),
			cancel.cancelled().map(|()| Race::Stopped),
		)
			.race()
			.await
		{
			Race::Restored => Some(SyncTrigger::ConnectivityRestored),
			Race::Manual => Some(SyncTrigger::Manual),
			Race::Tick if monitor.is_online() => Some(SyncTrigger::Periodic),
			Race::Tick => {
				trace!("Skipping periodic sync while offline");
				None
			}
			Race::Stopped => break,
		};
	}

	info!("Sync runner stopped");
}
