use tg_scan_types::ScanAttempt;

use strum::{AsRefStr, Display};
use thiserror::Error;

use super::db;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Storage(#[from] db::Error),
	/// Enqueue failed twice; the attempt is kept in memory and handed back to the caller.
	#[error("scan attempt could not be stored locally <id='{}'>: {source}", attempt.id)]
	StorageEscalated {
		attempt: Box<ScanAttempt>,
		#[source]
		source: db::Error,
	},
	#[error(transparent)]
	Remote(#[from] tg_remote_store::Error),
	#[error("no event selected for scanning")]
	NoEventSelected,
}

/// Coarse classification used by callers to pick a recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
	StorageFailure,
	RemoteUnavailable,
	RemoteConflict,
	RemoteNotFound,
	ValidationAmbiguous,
	NoEventSelected,
}

impl Error {
	#[must_use]
	pub const fn kind(&self) -> ErrorKind {
		match self {
			Self::Storage(_) | Self::StorageEscalated { .. } => ErrorKind::StorageFailure,
			Self::Remote(e) => remote_kind(e),
			Self::NoEventSelected => ErrorKind::NoEventSelected,
		}
	}

	/// The attempt that could not be persisted, if this error carries one.
	#[must_use]
	pub fn stranded_attempt(&self) -> Option<&ScanAttempt> {
		match self {
			Self::StorageEscalated { attempt, .. } => Some(attempt),
			_ => None,
		}
	}
}

pub(crate) const fn remote_kind(e: &tg_remote_store::Error) -> ErrorKind {
	use tg_remote_store::Error as Remote;

	match e {
		Remote::Unavailable(_) | Remote::Timeout => ErrorKind::RemoteUnavailable,
		Remote::Conflict { .. } => ErrorKind::RemoteConflict,
		Remote::TicketNotFound(_) => ErrorKind::RemoteNotFound,
	}
}
