use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::sessions::SessionManager;

/// Periodically closes expired sessions, independent of user activity.
/// A failed sweep is logged and retried on the next tick.
pub fn spawn_session_sweeper(sessions: SessionManager, every: Duration) -> JoinHandle<()> {
    info!("Session sweeper runs every {:?}", every);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = sessions.sweep_expired().await {
                error!("Session sweep failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_user, setup_test_db};
    use chrono::Duration as ChronoDuration;
    use model::entities::{role, session};
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    #[tokio::test]
    async fn test_sweeper_closes_sessions_without_reads() {
        let db = setup_test_db().await;
        let user_id = insert_user(&db, "idle@example.com", "secret-pass", role::USER, false).await;
        let started = crate::services::sessions::now() - ChronoDuration::minutes(120);
        session::ActiveModel {
            session_uuid: Set("idle-token".to_string()),
            user_id: Set(user_id),
            start_time: Set(started),
            end_time: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let handle = spawn_session_sweeper(SessionManager::new(db.clone(), 60), Duration::from_millis(10));

        let mut closed = None;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let row = session::Entity::find().one(&db).await.unwrap().unwrap();
            if row.end_time.is_some() {
                closed = row.end_time;
                break;
            }
        }
        handle.abort();

        assert_eq!(closed, Some(started + ChronoDuration::minutes(60)));
    }
}
