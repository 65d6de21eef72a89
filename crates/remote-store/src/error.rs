use tg_scan_types::TicketStatus;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum Error {
	#[error("remote store unreachable: {0}")]
	Unavailable(String),
	#[error("remote store request timed out")]
	Timeout,
	#[error("conditional update rejected <code='{code}'>: ticket is already {current}")]
	Conflict { code: String, current: TicketStatus },
	#[error("ticket not found <code='{0}'>")]
	TicketNotFound(String),
}

impl Error {
	/// Whether the store could not be reached at all, as opposed to answering with a refusal.
	#[must_use]
	pub const fn is_unavailable(&self) -> bool {
		matches!(self, Self::Unavailable(_) | Self::Timeout)
	}
}
