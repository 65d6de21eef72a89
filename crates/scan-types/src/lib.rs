//! Shared data model for ticket scanning: tickets and events as the authoritative store knows
//! them, and the scan attempts a device produces while validating codes.

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

mod attempt;
mod event;
mod outcome;
mod ticket;

pub use attempt::{ScanAttempt, ScanAttemptId, ScanSession};
pub use event::{Event, EventFilter, EventId};
pub use outcome::{InvalidReason, Outcome, OutcomeKind};
pub use ticket::{Ticket, TicketStatus, TicketSummary};

/// Identity of the ambassador operating a device, opaque to this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AmbassadorId(String);

impl AmbassadorId {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for AmbassadorId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl From<&str> for AmbassadorId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl std::fmt::Display for AmbassadorId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}
