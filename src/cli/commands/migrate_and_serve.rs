use anyhow::Result;
use tracing::{debug, info, trace};

use super::initdb::run_migrations;
use super::serve::run_server;
use crate::config::{Settings, build_app_state, connect_database};

pub async fn migrate_and_serve(settings: Settings) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");
    debug!("Database URL: {}", settings.database.url);
    debug!("Bind address: {}", settings.server.bind_address);

    let db = connect_database(&settings.database).await?;
    run_migrations(&db).await?;

    let state = build_app_state(db, settings)?;
    debug!("Application state initialized successfully");
    run_server(state).await
}
