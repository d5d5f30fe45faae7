use chrono::{Duration, NaiveDateTime, Utc};
use model::entities::session;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, Set, sea_query::Expr,
};
use tracing::{debug, info, instrument, trace};

use super::password::new_token;
use crate::errors::{AppError, AppResult};

/// Issues, validates and ends the session tokens carried in the session cookie.
#[derive(Debug, Clone)]
pub struct SessionManager {
    db: DatabaseConnection,
    timeout: Duration,
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl SessionManager {
    pub fn new(db: DatabaseConnection, timeout_minutes: i64) -> Self {
        Self {
            db,
            timeout: Duration::minutes(timeout_minutes),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn create_session(&self, user_id: i32) -> AppResult<String> {
        self.create_session_at(user_id, now()).await
    }

    #[instrument(skip(self))]
    pub async fn create_session_at(&self, user_id: i32, now: NaiveDateTime) -> AppResult<String> {
        let token = new_token();
        session::ActiveModel {
            session_uuid: Set(token.clone()),
            user_id: Set(user_id),
            start_time: Set(now),
            end_time: Set(None),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Session started for user {}", user_id);
        Ok(token)
    }

    pub async fn validate(&self, token: &str) -> AppResult<session::Model> {
        self.validate_at(token, now()).await
    }

    /// Resolves an active session. A session past the timeout is ended as a
    /// side effect and reported as expired.
    #[instrument(skip_all)]
    pub async fn validate_at(&self, token: &str, now: NaiveDateTime) -> AppResult<session::Model> {
        trace!("Validating session token");
        let found = session::Entity::find()
            .filter(session::Column::SessionUuid.eq(token))
            .filter(session::Column::EndTime.is_null())
            .one(&self.db)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if found.is_expired_at(now, self.timeout) {
            info!("Session {} of user {} expired", found.id, found.user_id);
            let mut active = found.into_active_model();
            active.end_time = Set(Some(now));
            active.update(&self.db).await?;
            return Err(AppError::SessionExpired);
        }

        Ok(found)
    }

    pub async fn end(&self, token: &str) -> AppResult<bool> {
        self.end_at(token, now()).await
    }

    /// Ends the active session with this token. Returns whether one was found.
    #[instrument(skip_all)]
    pub async fn end_at(&self, token: &str, now: NaiveDateTime) -> AppResult<bool> {
        let result = session::Entity::update_many()
            .col_expr(session::Column::EndTime, Expr::value(now))
            .filter(session::Column::SessionUuid.eq(token))
            .filter(session::Column::EndTime.is_null())
            .exec(&self.db)
            .await?;

        debug!("Ended {} session(s) by token", result.rows_affected);
        Ok(result.rows_affected > 0)
    }

    pub async fn end_all_for_user(&self, user_id: i32) -> AppResult<u64> {
        Ok(Self::end_all_for_user_in(&self.db, user_id, now()).await?)
    }

    /// Ends every active session of a user on `conn`, which may be a
    /// transaction.
    #[instrument(skip(conn))]
    pub async fn end_all_for_user_in<C: ConnectionTrait>(
        conn: &C,
        user_id: i32,
        now: NaiveDateTime,
    ) -> Result<u64, sea_orm::DbErr> {
        let result = session::Entity::update_many()
            .col_expr(session::Column::EndTime, Expr::value(now))
            .filter(session::Column::UserId.eq(user_id))
            .filter(session::Column::EndTime.is_null())
            .exec(conn)
            .await?;

        if result.rows_affected > 0 {
            info!("Ended {} active session(s) of user {}", result.rows_affected, user_id);
        }
        Ok(result.rows_affected)
    }

    pub async fn sweep_expired(&self) -> AppResult<u64> {
        self.sweep_expired_at(now()).await
    }

    /// Closes active sessions older than the timeout with
    /// `end_time = start_time + timeout`. Returns the number closed.
    #[instrument(skip(self))]
    pub async fn sweep_expired_at(&self, now: NaiveDateTime) -> AppResult<u64> {
        let cutoff = now - self.timeout;
        let stale = session::Entity::find()
            .filter(session::Column::EndTime.is_null())
            .filter(session::Column::StartTime.lt(cutoff))
            .all(&self.db)
            .await?;

        let mut closed = 0;
        for row in stale {
            let end_time = row.start_time + self.timeout;
            let mut active = row.into_active_model();
            active.end_time = Set(Some(end_time));
            active.update(&self.db).await?;
            closed += 1;
        }

        if closed > 0 {
            info!("Session sweep closed {} expired session(s)", closed);
        } else {
            debug!("Session sweep found nothing to close");
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_user, setup_test_db};
    use model::entities::role;

    fn start() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    async fn manager() -> (SessionManager, i32) {
        let db = setup_test_db().await;
        let user_id = insert_user(&db, "sam@example.com", "secret-pass", role::USER, false).await;
        (SessionManager::new(db, 60), user_id)
    }

    #[tokio::test]
    async fn test_created_session_validates_to_same_user() {
        let (sessions, user_id) = manager().await;
        let token = sessions.create_session_at(user_id, start()).await.unwrap();

        let session = sessions
            .validate_at(&token, start() + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert!(session.is_active());
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthenticated() {
        let (sessions, _) = manager().await;
        let err = sessions.validate_at("nope", start()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_expired_session_is_ended_on_validation() {
        let (sessions, user_id) = manager().await;
        let token = sessions.create_session_at(user_id, start()).await.unwrap();
        let later = start() + Duration::minutes(61);

        let err = sessions.validate_at(&token, later).await.unwrap_err();
        assert!(matches!(err, AppError::SessionExpired));

        let row = session::Entity::find()
            .filter(session::Column::SessionUuid.eq(&token))
            .one(&sessions.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.end_time, Some(later));

        // Once ended the token no longer resolves at all.
        let err = sessions.validate_at(&token, later).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
    }

    #[tokio::test]
    async fn test_end_and_end_all() {
        let (sessions, user_id) = manager().await;
        let first = sessions.create_session_at(user_id, start()).await.unwrap();
        let second = sessions.create_session_at(user_id, start()).await.unwrap();
        let third = sessions.create_session_at(user_id, start()).await.unwrap();

        assert!(sessions.end_at(&first, start()).await.unwrap());
        assert!(!sessions.end_at(&first, start()).await.unwrap());

        let ended = SessionManager::end_all_for_user_in(&sessions.db, user_id, start())
            .await
            .unwrap();
        assert_eq!(ended, 2);
        for token in [second, third] {
            assert!(sessions.validate_at(&token, start()).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_sweep_closes_stale_sessions_at_timeout() {
        let (sessions, user_id) = manager().await;
        let stale = sessions.create_session_at(user_id, start()).await.unwrap();
        let fresh = sessions
            .create_session_at(user_id, start() + Duration::minutes(50))
            .await
            .unwrap();

        let now = start() + Duration::minutes(90);
        assert_eq!(sessions.sweep_expired_at(now).await.unwrap(), 1);

        let swept = session::Entity::find()
            .filter(session::Column::SessionUuid.eq(&stale))
            .one(&sessions.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(swept.end_time, Some(start() + Duration::minutes(60)));

        assert!(sessions.validate_at(&fresh, now).await.is_ok());
        assert_eq!(sessions.sweep_expired_at(now).await.unwrap(), 0);
    }
}
