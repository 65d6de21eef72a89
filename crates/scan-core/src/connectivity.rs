//! Online/offline tracking with edge-triggered callbacks.
//!
//! The platform signal only says a network interface is up. Whether the authoritative store
//! answers is a separate question, settled by [`ConnectivityMonitor::assess`] with a probe.

use tg_remote_store::RemoteStore;

use std::{
	fmt,
	sync::{Arc, Mutex, PoisonError},
	time::Duration,
};

use tokio::{sync::watch, time::timeout};
use tracing::{debug, info};

pub type HandlerId = u64;

type Handler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
	Online,
	Offline(OfflineCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflineCause {
	NoSignal,
	/// The signal is up but the store did not answer the probe in time.
	StoreUnreachable,
}

impl Reachability {
	#[must_use]
	pub const fn is_online(self) -> bool {
		matches!(self, Self::Online)
	}
}

#[derive(Default)]
struct Handlers {
	next_id: HandlerId,
	online: Vec<(HandlerId, Handler)>,
	offline: Vec<(HandlerId, Handler)>,
}

pub struct ConnectivityMonitor {
	signal: watch::Sender<bool>,
	handlers: Mutex<Handlers>,
}

impl fmt::Debug for ConnectivityMonitor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConnectivityMonitor")
			.field("online", &self.is_online())
			.finish_non_exhaustive()
	}
}

impl ConnectivityMonitor {
	#[must_use]
	pub fn new(online: bool) -> Self {
		Self {
			signal: watch::Sender::new(online),
			handlers: Mutex::default(),
		}
	}

	#[must_use]
	pub fn is_online(&self) -> bool {
		*self.signal.borrow()
	}

	/// Feeds the platform reachability signal. Handlers only run when the value changes.
	pub fn set_signal(&self, online: bool) {
		let changed = self.signal.send_if_modified(|current| {
			if *current == online {
				false
			} else {
				*current = online;
				true
			}
		});

		if !changed {
			return;
		}

		info!(online, "Connectivity changed");

		// Handlers are cloned out so they can subscribe or unsubscribe without deadlocking.
		let handlers = {
			let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
			if online {
				handlers.online.clone()
			} else {
				handlers.offline.clone()
			}
		};

		for (_, handler) in handlers {
			handler();
		}
	}

	pub fn on_became_online(&self, handler: impl Fn() + Send + Sync + 'static) -> HandlerId {
		self.register(true, Arc::new(handler))
	}

	pub fn on_became_offline(&self, handler: impl Fn() + Send + Sync + 'static) -> HandlerId {
		self.register(false, Arc::new(handler))
	}

	fn register(&self, online: bool, handler: Handler) -> HandlerId {
		let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
		let id = handlers.next_id;
		handlers.next_id += 1;

		if online {
			handlers.online.push((id, handler));
		} else {
			handlers.offline.push((id, handler));
		}

		id
	}

	/// Returns `false` if no handler was registered under `id`.
	pub fn unsubscribe(&self, id: HandlerId) -> bool {
		let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
		let before = handlers.online.len() + handlers.offline.len();

		handlers.online.retain(|(handler_id, _)| *handler_id != id);
		handlers.offline.retain(|(handler_id, _)| *handler_id != id);

		before != handlers.online.len() + handlers.offline.len()
	}

	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<bool> {
		self.signal.subscribe()
	}

	/// Current reachability of the store itself: signal first, then a probe bounded by
	/// `probe_timeout`.
	pub async fn assess(&self, store: &dyn RemoteStore, probe_timeout: Duration) -> Reachability {
		if !self.is_online() {
			return Reachability::Offline(OfflineCause::NoSignal);
		}

		match timeout(probe_timeout, store.probe()).await {
			Ok(Ok(())) => Reachability::Online,
			Ok(Err(e)) => {
				debug!(?e, "Store probe failed");
				Reachability::Offline(OfflineCause::StoreUnreachable)
			}
			Err(_) => {
				debug!(?probe_timeout, "Store probe timed out");
				Reachability::Offline(OfflineCause::StoreUnreachable)
			}
		}
	}
}

impl Default for ConnectivityMonitor {
	fn default() -> Self {
		Self::new(true)
	}
}
