//! Database migrations

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
	fn migrations() -> Vec<Box<dyn MigrationTrait>> {
		vec![
			Box::new(m20251019_000001_create_scan_attempt::Migration),
			Box::new(m20251019_000002_create_catalog_cache::Migration),
			Box::new(m20251026_000001_add_scan_attempt_redeemed::Migration),
		]
	}
}

mod m20251019_000001_create_scan_attempt;
mod m20251019_000002_create_catalog_cache;
mod m20251026_000001_add_scan_attempt_redeemed;
