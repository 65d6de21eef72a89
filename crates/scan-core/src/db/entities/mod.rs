//! Database entities

pub mod cached_event;
pub mod cached_ticket;
pub mod scan_attempt;

pub use cached_event::Entity as CachedEventEntity;
pub use cached_ticket::Entity as CachedTicketEntity;
pub use scan_attempt::Entity as ScanAttemptEntity;
