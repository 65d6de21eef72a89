//! Events cached for offline use

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cached_event")]
pub struct Model {
	#[sea_orm(primary_key, auto_increment = false)]
	pub id: String,

	pub name: String,

	/// ISO 8601 calendar date.
	pub date: String,

	/// Set once the event's tickets were downloaded, absent when only the event was listed.
	pub catalog_downloaded_at_ms: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
