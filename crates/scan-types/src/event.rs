use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl From<String> for EventId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl From<&str> for EventId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
	pub id: EventId,
	pub name: String,
	pub date: NaiveDate,
}

/// Filter for listing events from the authoritative store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
	/// Only events happening on or after this date.
	pub from_date: Option<NaiveDate>,
}

impl EventFilter {
	#[must_use]
	pub const fn upcoming(today: NaiveDate) -> Self {
		Self {
			from_date: Some(today),
		}
	}

	#[must_use]
	pub fn matches(&self, event: &Event) -> bool {
		self.from_date.map_or(true, |from| event.date >= from)
	}
}
