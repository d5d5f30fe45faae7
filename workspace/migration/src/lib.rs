pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_auth_tables;
mod m20250601_000002_seed_roles;
mod m20250610_000001_create_file_uploads;
mod m20250615_000001_create_analytics_tables;
pub mod entity_iden;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_auth_tables::Migration),
            Box::new(m20250601_000002_seed_roles::Migration),
            Box::new(m20250610_000001_create_file_uploads::Migration),
            Box::new(m20250615_000001_create_analytics_tables::Migration),
        ]
    }
}
