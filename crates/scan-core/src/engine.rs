use tg_remote_store::RemoteStore;
use tg_scan_types::ScanSession;

use std::sync::Arc;

use tracing::info;

use super::{
	config::ScannerConfig,
	connectivity::ConnectivityMonitor,
	db::LocalDatabase,
	orchestrator::ScanOrchestrator,
	queue::LocalQueue,
	synchronizer::{SyncRunner, Synchronizer},
	Error,
};

/// Everything one scanning session needs, wired together.
pub struct ScanEngine {
	config: ScannerConfig,
	db: LocalDatabase,
	monitor: Arc<ConnectivityMonitor>,
	orchestrator: Arc<ScanOrchestrator>,
	synchronizer: Arc<Synchronizer>,
	runner: SyncRunner,
}

impl ScanEngine {
	/// Opens the device database and starts background synchronization, which runs once
	/// right away.
	pub async fn start(
		config: ScannerConfig,
		session: ScanSession,
		store: Arc<dyn RemoteStore>,
		monitor: Arc<ConnectivityMonitor>,
	) -> Result<Self, Error> {
		let db = LocalDatabase::open_and_migrate(&config.database_path()).await?;

		let synchronizer = Arc::new(Synchronizer::new(
			LocalQueue::new(&db).with_page_size(config.sync_page_size),
			Arc::clone(&store),
			config.remote_timeout(),
		));

		let orchestrator = Arc::new(ScanOrchestrator::new(
			session,
			&config,
			store,
			Arc::clone(&monitor),
			&db,
		));

		let runner = SyncRunner::spawn(
			Arc::clone(&synchronizer),
			Arc::clone(&monitor),
			config.sync_interval(),
		);

		info!(
			ambassador_id = %orchestrator.session().ambassador_id,
			data_dir = %config.data_dir.display(),
			"Scan engine started"
		);

		Ok(Self {
			config,
			db,
			monitor,
			orchestrator,
			synchronizer,
			runner,
		})
	}

	#[must_use]
	pub const fn config(&self) -> &ScannerConfig {
		&self.config
	}

	#[must_use]
	pub const fn orchestrator(&self) -> &Arc<ScanOrchestrator> {
		&self.orchestrator
	}

	#[must_use]
	pub const fn synchronizer(&self) -> &Arc<Synchronizer> {
		&self.synchronizer
	}

	#[must_use]
	pub const fn monitor(&self) -> &Arc<ConnectivityMonitor> {
		&self.monitor
	}

	/// Asks the background runner for a sync run.
	pub fn request_sync(&self) {
		self.runner.notify();
	}

	/// Stops background synchronization and closes the database.
	///
	/// Attempts still unsynced stay queued for the next session.
	pub async fn shutdown(self) -> Result<(), Error> {
		self.runner.stop().await;

		drop(self.orchestrator);
		drop(self.synchronizer);

		self.db.close().await?;

		info!("Scan engine stopped");

		Ok(())
	}
}
