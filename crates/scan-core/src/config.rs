//! Scanner configuration

use std::{
	fs,
	path::{Path, PathBuf},
	time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const CONFIG_FILE_NAME: &str = "scanner.json";
const DATABASE_FILE_NAME: &str = "scanner.db";

/// Versioned on-disk configuration that knows how to upgrade itself.
pub trait Migrate {
	fn current_version(&self) -> u32;

	fn target_version() -> u32;

	fn migrate(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerConfig {
	/// Config schema version
	pub version: u32,

	/// Directory holding the database, the logs and this file
	pub data_dir: PathBuf,

	/// Default tracing directive, `RUST_LOG` takes precedence
	pub log_level: String,

	/// Window in which a repeat of the previous code is dropped
	#[serde(default = "defaults::dedup_window_ms")]
	pub dedup_window_ms: u64,

	/// Number of recent outcomes kept for display
	#[serde(default = "defaults::history_limit")]
	pub history_limit: usize,

	/// Substring a code must contain to be tentatively accepted without a catalog
	#[serde(default)]
	pub offline_code_marker: Option<String>,

	#[serde(default = "defaults::max_code_len")]
	pub max_code_len: usize,

	#[serde(default = "defaults::probe_timeout_ms")]
	pub probe_timeout_ms: u64,

	#[serde(default = "defaults::remote_timeout_ms")]
	pub remote_timeout_ms: u64,

	#[serde(default = "defaults::sync_interval_secs")]
	pub sync_interval_secs: u64,

	#[serde(default = "defaults::sync_page_size")]
	pub sync_page_size: u64,
}

mod defaults {
	pub const fn dedup_window_ms() -> u64 {
		3_000
	}

	pub const fn history_limit() -> usize {
		5
	}

	pub const fn max_code_len() -> usize {
		512
	}

	pub const fn probe_timeout_ms() -> u64 {
		1_500
	}

	pub const fn remote_timeout_ms() -> u64 {
		5_000
	}

	pub const fn sync_interval_secs() -> u64 {
		30
	}

	pub const fn sync_page_size() -> u64 {
		100
	}
}

impl ScannerConfig {
	/// Loads the configuration from `data_dir`, writing a default one if none exists.
	pub fn load_from(data_dir: &Path) -> Result<Self> {
		let config_path = data_dir.join(CONFIG_FILE_NAME);

		if !config_path.exists() {
			warn!(path = %config_path.display(), "No config found, creating default");
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			return Ok(config);
		}

		info!(path = %config_path.display(), "Loading config");
		let json = fs::read_to_string(&config_path)
			.with_context(|| format!("failed to read '{}'", config_path.display()))?;
		let mut config: Self = serde_json::from_str(&json)
			.with_context(|| format!("failed to parse '{}'", config_path.display()))?;

		if config.current_version() != Self::target_version() {
			info!(
				from = config.current_version(),
				to = Self::target_version(),
				"Migrating config"
			);
			config.migrate()?;
			config.save()?;
		}

		Ok(config)
	}

	/// Like [`Self::load_from`], but replaces an unreadable file with defaults.
	pub fn load_or_create(data_dir: &Path) -> Result<Self> {
		Self::load_from(data_dir).or_else(|e| {
			warn!(?e, "Failed to load config, recreating default");
			let config = Self::default_with_dir(data_dir.to_path_buf());
			config.save()?;
			Ok(config)
		})
	}

	#[must_use]
	pub fn default_with_dir(data_dir: PathBuf) -> Self {
		Self {
			version: Self::target_version(),
			data_dir,
			log_level: "info".to_string(),
			dedup_window_ms: defaults::dedup_window_ms(),
			history_limit: defaults::history_limit(),
			offline_code_marker: None,
			max_code_len: defaults::max_code_len(),
			probe_timeout_ms: defaults::probe_timeout_ms(),
			remote_timeout_ms: defaults::remote_timeout_ms(),
			sync_interval_secs: defaults::sync_interval_secs(),
			sync_page_size: defaults::sync_page_size(),
		}
	}

	pub fn save(&self) -> Result<()> {
		fs::create_dir_all(&self.data_dir)?;

		let config_path = self.data_dir.join(CONFIG_FILE_NAME);
		fs::write(&config_path, serde_json::to_string_pretty(self)?)?;
		info!(path = %config_path.display(), "Saved config");

		Ok(())
	}

	#[must_use]
	pub fn logs_dir(&self) -> PathBuf {
		self.data_dir.join("logs")
	}

	#[must_use]
	pub fn database_path(&self) -> PathBuf {
		self.data_dir.join(DATABASE_FILE_NAME)
	}

	#[must_use]
	pub const fn dedup_window(&self) -> Duration {
		Duration::from_millis(self.dedup_window_ms)
	}

	#[must_use]
	pub const fn probe_timeout(&self) -> Duration {
		Duration::from_millis(self.probe_timeout_ms)
	}

	#[must_use]
	pub const fn remote_timeout(&self) -> Duration {
		Duration::from_millis(self.remote_timeout_ms)
	}

	#[must_use]
	pub const fn sync_interval(&self) -> Duration {
		Duration::from_secs(self.sync_interval_secs)
	}
}

impl Migrate for ScannerConfig {
	fn current_version(&self) -> u32 {
		self.version
	}

	fn target_version() -> u32 {
		1
	}

	fn migrate(&mut self) -> Result<()> {
		match self.version {
			// v0 files predate the offline marker and stored no probe timeout; serde defaults
			// already filled them in.
			0 => {
				self.version = 1;
				Ok(())
			}
			1 => Ok(()),
			v => Err(anyhow!("Unknown config version: {v}")),
		}
	}
}
