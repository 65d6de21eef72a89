use tg_scan_types::{EventId, OutcomeKind, ScanAttempt};

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// What the caller gets back for one settled scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
	pub attempt: ScanAttempt,
	/// The attempt went to the local queue instead of the authoritative store.
	pub stored_offline: bool,
	/// The outcome was decided by the authoritative store and its side effects were applied.
	pub authoritative: bool,
}

impl ScanReport {
	#[must_use]
	pub fn display_message(&self) -> String {
		let message = self.attempt.outcome.message();
		if self.stored_offline {
			format!("{message} (stored offline for later sync)")
		} else {
			message.to_string()
		}
	}
}

/// Bounded list of recent reports, most recent first.
#[derive(Debug, Clone)]
pub struct ScanHistory {
	entries: VecDeque<ScanReport>,
	limit: usize,
}

impl ScanHistory {
	#[must_use]
	pub fn new(limit: usize) -> Self {
		Self {
			entries: VecDeque::with_capacity(limit),
			limit,
		}
	}

	pub fn push(&mut self, report: ScanReport) {
		if self.limit == 0 {
			return;
		}

		if self.entries.len() == self.limit {
			self.entries.pop_back();
		}

		self.entries.push_front(report);
	}

	pub fn iter(&self) -> impl Iterator<Item = &ScanReport> {
		self.entries.iter()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[must_use]
	pub fn to_vec(&self) -> Vec<ScanReport> {
		self.entries.iter().cloned().collect()
	}

	/// Reports matching `query`, most recent first.
	#[must_use]
	pub fn filter(&self, query: &ScanQuery) -> Vec<ScanReport> {
		self.entries
			.iter()
			.filter(|report| query.matches(&report.attempt))
			.cloned()
			.collect()
	}
}

/// Narrows a list of scans; every criterion left empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanQuery {
	pub kind: Option<OutcomeKind>,
	pub event_id: Option<EventId>,
	/// Case-insensitive substring of the scanned code.
	pub code_contains: Option<String>,
}

impl ScanQuery {
	#[must_use]
	pub fn matches(&self, attempt: &ScanAttempt) -> bool {
		self.kind.map_or(true, |kind| attempt.outcome.kind() == kind)
			&& self
				.event_id
				.as_ref()
				.map_or(true, |event_id| &attempt.event_id == event_id)
			&& self.code_contains.as_deref().map_or(true, |needle| {
				attempt
					.code
					.to_lowercase()
					.contains(&needle.to_lowercase())
			})
	}
}

/// Counters over every attempt settled by one orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
	pub total: u64,
	pub stored_offline: u64,
	pub by_kind: HashMap<OutcomeKind, u64>,
}

impl ScanStats {
	pub fn record(&mut self, report: &ScanReport) {
		self.total += 1;
		if report.stored_offline {
			self.stored_offline += 1;
		}
		*self.by_kind.entry(report.attempt.outcome.kind()).or_default() += 1;
	}

	#[must_use]
	pub fn count(&self, kind: OutcomeKind) -> u64 {
		self.by_kind.get(&kind).copied().unwrap_or_default()
	}

	/// Every kind with its count, zeroes included, in declaration order.
	pub fn breakdown(&self) -> impl Iterator<Item = (OutcomeKind, u64)> + '_ {
		OutcomeKind::iter().map(|kind| (kind, self.count(kind)))
	}
}
