//! Tickets downloaded for offline validation

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cached_ticket")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub code: String,

	#[sea_orm(indexed)]
	pub event_id: String,

	pub status: String,
	pub customer_name: Option<String>,
	pub ticket_type: Option<String>,

	/// The ticket was admitted by this device while offline; the store has not confirmed it.
	pub used_locally: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
