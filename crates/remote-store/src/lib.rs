//!
//! # Remote Store
//!
//! Contract of the authoritative ticket store shared by every scanning device, plus
//! [`MemoryStore`], an in-process implementation of that contract.
//!
//! The store is the only place where the redemption of a ticket is decided: the
//! `active -> used` transition is a conditional update that re-checks the current status at
//! commit time, so two devices racing on the same code get exactly one success and one
//! [`Error::Conflict`].
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

use tg_scan_types::{Event, EventFilter, EventId, ScanAttempt, Ticket, TicketStatus};

use async_trait::async_trait;

mod error;
mod memory;

pub use error::Error;
pub use memory::{AuditEntry, MemoryStore};

#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
	/// Cheapest possible round trip, used to tell "network interface is up" apart from "the
	/// store actually answers".
	async fn probe(&self) -> Result<(), Error>;

	/// Finds a ticket by its code, whatever event it belongs to.
	async fn lookup_ticket(&self, code: &str) -> Result<Option<Ticket>, Error>;

	/// Atomically moves the ticket to `new` only if its current status is still `expected`.
	///
	/// Returns the updated ticket, or [`Error::Conflict`] carrying the status found at commit
	/// time.
	async fn transition_ticket_status(
		&self,
		code: &str,
		expected: TicketStatus,
		new: TicketStatus,
	) -> Result<Ticket, Error>;

	/// Appends the attempt and its outcome to the scan audit log.
	///
	/// Idempotent per attempt id: appending an attempt that was already recorded succeeds
	/// without creating a second entry.
	async fn append_scan(&self, attempt: &ScanAttempt) -> Result<(), Error>;

	async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, Error>;

	/// Every ticket of an event, used to download a catalog for offline validation.
	async fn tickets_for_event(&self, event_id: &EventId) -> Result<Vec<Ticket>, Error>;
}
