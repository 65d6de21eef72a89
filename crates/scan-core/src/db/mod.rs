//! On-device SQLite database holding the scan queue and the downloaded ticket catalog.

use tg_scan_types::ScanAttemptId;

use std::{path::Path, time::Duration};

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use thiserror::Error;
use tracing::info;

pub mod entities;
pub mod migration;

#[derive(Debug, Error)]
pub enum Error {
	#[error("database error: {0}")]
	Database(#[from] DbErr),
	#[error("failed to create database directory '{path}': {source}")]
	CreateDir {
		path: Box<Path>,
		#[source]
		source: std::io::Error,
	},
	#[error("outcome serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
	#[error("scan attempt not found <id='{0}'>")]
	NotFound(ScanAttemptId),
	#[error("corrupted row in '{table}': {reason}")]
	Corrupted { table: &'static str, reason: String },
}

/// Connection to the device database.
///
/// The pool holds a single connection: the queue has one logical writer, and SQLite's default
/// `synchronous=FULL` makes every committed insert durable before the call returns.
#[derive(Debug, Clone)]
pub struct LocalDatabase {
	conn: DatabaseConnection,
}

impl LocalDatabase {
	/// Opens the database at `path`, creating the file and its parent directory if needed.
	pub async fn open(path: &Path) -> Result<Self, Error> {
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
				path: parent.into(),
				source,
			})?;
		}

		let mut opt = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
		opt.max_connections(1)
			.min_connections(1)
			.connect_timeout(Duration::from_secs(8))
			.sqlx_logging(false);

		let conn = Database::connect(opt).await?;

		info!(path = %path.display(), "Opened scanner database");

		Ok(Self { conn })
	}

	/// Opens the database and brings its schema up to date.
	pub async fn open_and_migrate(path: &Path) -> Result<Self, Error> {
		let db = Self::open(path).await?;
		db.migrate().await?;
		Ok(db)
	}

	pub async fn migrate(&self) -> Result<(), Error> {
		migration::Migrator::up(&self.conn, None).await?;
		info!("Scanner database migrations completed");
		Ok(())
	}

	#[must_use]
	pub const fn conn(&self) -> &DatabaseConnection {
		&self.conn
	}

	/// Closes the underlying pool; every clone of this database stops working afterwards.
	pub async fn close(self) -> Result<(), Error> {
		self.conn.close().await.map_err(Into::into)
	}
}
