use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use super::{EventId, TicketSummary};

/// Result of validating one scanned code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
	Valid { ticket: TicketSummary },
	Invalid { reason: InvalidReason },
	WrongEvent { ticket_event: EventId },
	AlreadyUsed { ticket: TicketSummary },
	Expired { event_date: NaiveDate },
	/// Tentatively accepted by the offline heuristic, never authoritative.
	UnverifiedOffline,
}

#[derive(
	Debug,
	Clone,
	Copy,
	PartialEq,
	Eq,
	Hash,
	Serialize,
	Deserialize,
	Display,
	EnumString,
	EnumIter,
	AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutcomeKind {
	Valid,
	Invalid,
	WrongEvent,
	AlreadyUsed,
	Expired,
	UnverifiedOffline,
}

/// Why a code was rejected as invalid, so "bad code" and "code not in system" stay apart.
#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvalidReason {
	/// No ticket with this code exists in the catalog that was consulted.
	NotFound,
	/// The decoder produced something that is not a recognizable code.
	Malformed,
	/// The catalog could not be read (timeout, store failure).
	LookupFailed,
	/// No catalog was available and the code did not match the offline marker.
	UnrecognizedOffline,
}

impl Outcome {
	#[must_use]
	pub const fn kind(&self) -> OutcomeKind {
		match self {
			Self::Valid { .. } => OutcomeKind::Valid,
			Self::Invalid { .. } => OutcomeKind::Invalid,
			Self::WrongEvent { .. } => OutcomeKind::WrongEvent,
			Self::AlreadyUsed { .. } => OutcomeKind::AlreadyUsed,
			Self::Expired { .. } => OutcomeKind::Expired,
			Self::UnverifiedOffline => OutcomeKind::UnverifiedOffline,
		}
	}

	#[must_use]
	pub const fn invalid(reason: InvalidReason) -> Self {
		Self::Invalid { reason }
	}

	/// Whether the holder should be let in, verified or not.
	#[must_use]
	pub const fn admits(&self) -> bool {
		matches!(self, Self::Valid { .. } | Self::UnverifiedOffline)
	}

	#[must_use]
	pub const fn message(&self) -> &'static str {
		match self {
			Self::Valid { .. } => "Valid ticket",
			Self::Invalid {
				reason: InvalidReason::NotFound,
			} => "Invalid ticket",
			Self::Invalid {
				reason: InvalidReason::Malformed,
			} => "Unreadable code",
			Self::Invalid {
				reason: InvalidReason::LookupFailed,
			} => "Ticket could not be verified",
			Self::Invalid {
				reason: InvalidReason::UnrecognizedOffline,
			} => "Code not recognized offline",
			Self::WrongEvent { .. } => "Ticket is for a different event",
			Self::AlreadyUsed { .. } => "Ticket already scanned",
			Self::Expired { .. } => "Event date has passed",
			Self::UnverifiedOffline => "Accepted offline, pending verification",
		}
	}
}
