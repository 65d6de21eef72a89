//!
//! # Scan Core
//!
//! Offline-first validation of scanned ticket codes.
//!
//! A [`ScanOrchestrator`] turns each decoded code into a [`ScanReport`]. While the
//! authoritative store answers, tickets are redeemed there through a conditional update, so
//! racing devices get exactly one `valid`. When it does not, attempts are written to a durable
//! on-device [`LocalQueue`] and the [`Synchronizer`] replays them as audit entries once the
//! store is reachable again.
//!

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod engine;
pub mod error;
pub mod history;
pub mod logging;
pub mod orchestrator;
pub mod queue;
pub mod synchronizer;
pub mod validator;

pub use catalog::Catalog;
pub use config::ScannerConfig;
pub use connectivity::{ConnectivityMonitor, OfflineCause, Reachability};
pub use db::LocalDatabase;
pub use engine::ScanEngine;
pub use error::{Error, ErrorKind};
pub use history::{ScanHistory, ScanQuery, ScanReport, ScanStats};
pub use orchestrator::{run_decoder, FeedEvent, FeedSummary, ScanOrchestrator, ScanPhase};
pub use queue::LocalQueue;
pub use synchronizer::{SyncReport, SyncRunner, SyncTrigger, Synchronizer};
pub use validator::{Decision, EventScope, TicketLookup, Validator};
