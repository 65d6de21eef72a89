use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use super::EventId;

#[derive(
	Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TicketStatus {
	Active,
	Used,
}

/// A ticket as held by the authoritative store.
///
/// `status` moves from [`TicketStatus::Active`] to [`TicketStatus::Used`] at most once; that
/// transition is the redemption and only the authoritative store may linearize it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
	pub code: String,
	pub event_id: EventId,
	pub status: TicketStatus,
	pub customer_name: Option<String>,
	pub ticket_type: Option<String>,
}

impl Ticket {
	#[must_use]
	pub fn is_used(&self) -> bool {
		self.status == TicketStatus::Used
	}

	#[must_use]
	pub fn summary(&self) -> TicketSummary {
		TicketSummary {
			customer_name: self.customer_name.clone(),
			ticket_type: self.ticket_type.clone(),
		}
	}
}

/// Display metadata shown to the ambassador alongside an outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketSummary {
	pub customer_name: Option<String>,
	pub ticket_type: Option<String>,
}
