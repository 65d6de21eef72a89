//! Scan attempts recorded on the device, synced or not

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "scan_attempt")]
pub struct Model {
	/// Insertion order, breaks ties between attempts captured in the same millisecond.
	#[sea_orm(primary_key)]
	pub seq: i32,

	#[sea_orm(unique)]
	pub uuid: String,

	pub code: String,

	#[sea_orm(indexed)]
	pub event_id: String,

	pub ambassador_id: String,
	pub device_info: String,
	pub location: String,

	#[sea_orm(indexed)]
	pub captured_at_ms: i64,

	#[sea_orm(indexed)]
	pub synced: bool,

	pub synced_at_ms: Option<i64>,

	#[sea_orm(indexed)]
	pub outcome_kind: String,

	#[sea_orm(column_type = "Json")]
	pub outcome: Json,

	/// The authoritative store performed the redemption for this attempt.
	pub redeemed: bool,

	pub sync_attempts: i32,
	pub last_sync_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
