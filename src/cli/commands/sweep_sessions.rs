use anyhow::Result;
use tracing::{info, trace};

use crate::config::{Settings, connect_database};
use crate::services::sessions::SessionManager;

/// One-off sweep for deployments that run it from cron instead of the
/// server's background task.
pub async fn sweep_sessions(settings: &Settings) -> Result<()> {
    trace!("Entering sweep_sessions function");
    let db = connect_database(&settings.database).await?;
    let sessions = SessionManager::new(db, settings.session.timeout_minutes);

    let closed = sessions.sweep_expired().await?;
    info!("Closed {} expired session(s)", closed);
    Ok(())
}
