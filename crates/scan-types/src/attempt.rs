use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AmbassadorId, EventId, Outcome};

pub type ScanAttemptId = Uuid;

/// Provenance attached to every attempt made during one scanning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSession {
	pub ambassador_id: AmbassadorId,
	pub device_info: String,
	pub location: String,
}

/// One presentation of a code to the validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanAttempt {
	pub id: ScanAttemptId,
	/// The decoded string, exactly as read.
	pub code: String,
	pub event_id: EventId,
	pub ambassador_id: AmbassadorId,
	pub device_info: String,
	pub location: String,
	pub captured_at: DateTime<Utc>,
	pub synced: bool,
	pub outcome: Outcome,
	/// Set once the authoritative store moved the ticket `active -> used` for this attempt.
	#[serde(default)]
	pub redeemed: bool,
}

impl ScanAttempt {
	#[must_use]
	pub fn new(
		code: impl Into<String>,
		event_id: EventId,
		session: &ScanSession,
		captured_at: DateTime<Utc>,
		outcome: Outcome,
	) -> Self {
		Self {
			id: Uuid::new_v4(),
			code: code.into(),
			event_id,
			ambassador_id: session.ambassador_id.clone(),
			device_info: session.device_info.clone(),
			location: session.location.clone(),
			captured_at,
			synced: false,
			outcome,
			redeemed: false,
		}
	}

	/// A `valid` admission the authoritative store never confirmed, left for reconciliation.
	#[must_use]
	pub const fn is_unredeemed_admission(&self) -> bool {
		matches!(self.outcome, Outcome::Valid { .. }) && !self.redeemed
	}
}
