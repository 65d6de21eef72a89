//! Decides the outcome of a single scanned code.
//!
//! Nothing here writes anywhere: the validator reads a catalog through [`TicketLookup`] and
//! returns a [`Decision`]; performing the redemption it may require is the caller's job.

use tg_remote_store::RemoteStore;
use tg_scan_types::{EventId, InvalidReason, Outcome, Ticket};

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{trace, warn};

use super::{db, error::ErrorKind};

/// Read-only access to a ticket catalog, remote or cached on the device.
#[async_trait]
pub trait TicketLookup: Send + Sync {
	async fn find_ticket(&self, code: &str) -> Result<Option<Ticket>, LookupError>;
}

#[derive(Debug, Error)]
pub enum LookupError {
	#[error(transparent)]
	Remote(#[from] tg_remote_store::Error),
	#[error(transparent)]
	Local(#[from] db::Error),
	#[error("ticket lookup timed out after {0:?}")]
	TimedOut(Duration),
}

/// Lookup against the authoritative store, bounded by a timeout.
pub struct RemoteLookup<'store> {
	store: &'store dyn RemoteStore,
	timeout: Duration,
}

impl<'store> RemoteLookup<'store> {
	#[must_use]
	pub fn new(store: &'store dyn RemoteStore, timeout: Duration) -> Self {
		Self { store, timeout }
	}
}

#[async_trait]
impl TicketLookup for RemoteLookup<'_> {
	async fn find_ticket(&self, code: &str) -> Result<Option<Ticket>, LookupError> {
		timeout(self.timeout, self.store.lookup_ticket(code))
			.await
			.map_err(|_| LookupError::TimedOut(self.timeout))?
			.map_err(Into::into)
	}
}

/// The event a scan is validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventScope {
	pub id: EventId,
	/// Unknown when the event was selected without its metadata being available.
	pub date: Option<NaiveDate>,
}

impl EventScope {
	/// The event date, if the event is over by `today`.
	///
	/// Scans on the day of the event itself are still accepted, and an unknown date never
	/// expires.
	#[must_use]
	pub fn expired_on(&self, today: NaiveDate) -> Option<NaiveDate> {
		self.date.filter(|date| *date < today)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
	pub outcome: Outcome,
	/// The catalog record the decision was based on.
	pub ticket: Option<Ticket>,
	/// The caller must move the ticket `active -> used` and append the scan before the
	/// outcome stands.
	pub requires_redemption: bool,
}

impl Decision {
	fn settled(outcome: Outcome) -> Self {
		Self {
			outcome,
			ticket: None,
			requires_redemption: false,
		}
	}
}

/// Input the decoder produced that cannot be a ticket code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmbiguousCode {
	#[error("decoded code is empty")]
	Empty,
	#[error("decoded code contains control characters")]
	ControlCharacters,
	#[error("decoded code is {len} bytes long, at most {max} are accepted")]
	TooLong { len: usize, max: usize },
}

impl AmbiguousCode {
	#[must_use]
	pub const fn kind(&self) -> ErrorKind {
		ErrorKind::ValidationAmbiguous
	}
}

#[derive(Debug, Clone)]
pub struct Validator {
	offline_marker: Option<String>,
	max_code_len: usize,
}

impl Validator {
	/// An empty marker is treated as no marker at all.
	#[must_use]
	pub fn new(offline_marker: Option<String>, max_code_len: usize) -> Self {
		Self {
			offline_marker: offline_marker.filter(|marker| !marker.is_empty()),
			max_code_len,
		}
	}

	pub fn check_code(&self, code: &str) -> Result<(), AmbiguousCode> {
		if code.trim().is_empty() {
			return Err(AmbiguousCode::Empty);
		}

		if code.chars().any(char::is_control) {
			return Err(AmbiguousCode::ControlCharacters);
		}

		if code.len() > self.max_code_len {
			return Err(AmbiguousCode::TooLong {
				len: code.len(),
				max: self.max_code_len,
			});
		}

		Ok(())
	}

	/// Validates `code` for the event in `scope`.
	///
	/// Without a `lookup` the degraded offline heuristic is used. A lookup that fails is never
	/// reported as valid.
	pub async fn validate(
		&self,
		code: &str,
		scope: &EventScope,
		lookup: Option<&dyn TicketLookup>,
		today: NaiveDate,
	) -> Decision {
		if let Some(event_date) = scope.expired_on(today) {
			return Decision::settled(Outcome::Expired { event_date });
		}

		if let Err(e) = self.check_code(code) {
			trace!(?e, "Rejected ambiguous code");
			return Decision::settled(Outcome::invalid(InvalidReason::Malformed));
		}

		let Some(lookup) = lookup else {
			return self.heuristic(code);
		};

		match lookup.find_ticket(code).await {
			Ok(found) => Self::decide(&scope.id, found),
			Err(e) => {
				warn!(?e, event_id = %scope.id, "Ticket lookup failed");
				Decision::settled(Outcome::invalid(InvalidReason::LookupFailed))
			}
		}
	}

	/// Rules applied once the catalog answered, in order, the first match wins.
	#[must_use]
	pub fn decide(event_id: &EventId, found: Option<Ticket>) -> Decision {
		let Some(ticket) = found else {
			return Decision::settled(Outcome::invalid(InvalidReason::NotFound));
		};

		let (outcome, requires_redemption) = if &ticket.event_id != event_id {
			(
				Outcome::WrongEvent {
					ticket_event: ticket.event_id.clone(),
				},
				false,
			)
		} else if ticket.is_used() {
			(
				Outcome::AlreadyUsed {
					ticket: ticket.summary(),
				},
				false,
			)
		} else {
			(
				Outcome::Valid {
					ticket: ticket.summary(),
				},
				true,
			)
		};

		Decision {
			outcome,
			ticket: Some(ticket),
			requires_redemption,
		}
	}

	/// Offline acceptance by marker substring. Not a security boundary.
	#[must_use]
	pub fn heuristic(&self, code: &str) -> Decision {
		match &self.offline_marker {
			Some(marker) if code.contains(marker.as_str()) => {
				Decision::settled(Outcome::UnverifiedOffline)
			}
			_ => Decision::settled(Outcome::invalid(InvalidReason::UnrecognizedOffline)),
		}
	}

	/// Narrows an `unverified_offline` outcome once the catalog can be read again.
	///
	/// Only rejections are derived here: a ticket that exists for the right event stays
	/// unverified, since its redemption was never performed.
	#[must_use]
	pub fn reconcile_unverified(event_id: &EventId, found: Option<&Ticket>) -> Outcome {
		match found {
			None => Outcome::invalid(InvalidReason::NotFound),
			Some(ticket) if &ticket.event_id != event_id => Outcome::WrongEvent {
				ticket_event: ticket.event_id.clone(),
			},
			Some(_) => Outcome::UnverifiedOffline,
		}
	}
}
