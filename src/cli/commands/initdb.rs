use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use sea_orm::DatabaseConnection;
use tracing::{debug, info, trace};

use crate::config::{DatabaseSettings, connect_database};

pub async fn init_database(settings: &DatabaseSettings) -> Result<()> {
    trace!("Entering init_database function");
    info!("Initializing database");

    let db = connect_database(settings).await?;
    run_migrations(&db).await?;

    info!("Database initialization completed successfully!");
    Ok(())
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    info!("Running database migrations");
    Migrator::up(db, None)
        .await
        .context("Failed to run database migrations")?;
    debug!("All pending migrations have been applied");
    Ok(())
}
