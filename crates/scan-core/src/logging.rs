use std::fs;

use anyhow::{Context, Result};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
	filter::LevelFilter,
	fmt::{self, Layer},
	prelude::*,
	EnvFilter,
};

use super::config::ScannerConfig;

#[cfg(debug_assertions)]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::DEBUG;

#[cfg(not(debug_assertions))]
const CONSOLE_LOG_FILTER: LevelFilter = LevelFilter::INFO;

/// Installs the global subscriber: console output plus a daily rolling file in the logs
/// directory.
///
/// The returned guard flushes the file writer on drop and must be held for as long as logs
/// should be written.
pub fn init(config: &ScannerConfig) -> Result<WorkerGuard> {
	let logs_dir = config.logs_dir();
	fs::create_dir_all(&logs_dir)
		.with_context(|| format!("failed to create logs directory '{}'", logs_dir.display()))?;

	let (non_blocking, guard) = tracing_appender::non_blocking(rolling::daily(logs_dir, "log"));

	let filter = EnvFilter::builder()
		.with_default_directive(
			config
				.log_level
				.parse()
				.with_context(|| format!("invalid log level '{}'", config.log_level))?,
		)
		.from_env_lossy();

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_filter(CONSOLE_LOG_FILTER))
		.with(
			Layer::default()
				.with_writer(non_blocking)
				.with_ansi(false)
				.with_filter(LevelFilter::DEBUG),
		)
		.try_init()
		.context("a global tracing subscriber is already installed")?;

	Ok(guard)
}
