use chrono::{Duration, NaiveDateTime};
use common::{ChangePasswordRequest, LoginResponse, ResetPasswordRequest};
use model::entities::{password_reset_token, user, user_detail};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use super::password::new_token;
use super::sessions::{SessionManager, now};
use super::templates;
use super::users::find_view;
use crate::errors::{AppError, AppResult};
use crate::schemas::AppState;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Successful login: the new session token and the body returned to the client.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub response: LoginResponse,
}

fn check_new_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        )));
    }
    Ok(())
}

/// Verifies credentials and opens a session.
///
/// Unknown users and wrong passwords are indistinguishable. Inactive accounts
/// are refused only after the password checks out.
#[instrument(skip(state, password))]
pub async fn login(state: &AppState, username: &str, password: &str) -> AppResult<LoginOutcome> {
    let username = username.trim().to_lowercase();
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(&username))
        .one(&state.db)
        .await?;

    let Some(found) = found else {
        debug!("Login for unknown username");
        return Err(AppError::InvalidCredentials);
    };
    if !state.passwords.verify_blocking(password, &found.password_hash).await {
        debug!("Password mismatch for user {}", found.id);
        return Err(AppError::InvalidCredentials);
    }
    if !found.status {
        warn!("Inactive user {} tried to log in", found.id);
        return Err(AppError::Forbidden("User account is inactive".to_string()));
    }

    let token = state.sessions.create_session(found.id).await?;

    let response = if found.is_temp_password {
        LoginResponse {
            msg: "Login successful, please change your password.".to_string(),
            redirect_to_change_password: true,
            user: None,
        }
    } else {
        LoginResponse {
            msg: "Login successful".to_string(),
            redirect_to_change_password: false,
            user: find_view(&state.db, found.id).await?,
        }
    };

    info!("User {} logged in", found.id);
    Ok(LoginOutcome { token, response })
}

/// Replaces the password of a signed-in user and ends all of their sessions,
/// the current one included.
#[instrument(skip(state, request))]
pub async fn change_password(
    state: &AppState,
    user_id: i32,
    request: &ChangePasswordRequest,
) -> AppResult<()> {
    if request.new_password != request.confirm_password {
        return Err(AppError::BadRequest(
            "New password and confirmation do not match".to_string(),
        ));
    }
    check_new_password(&request.new_password)?;

    let found = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with ID {user_id} not found")))?;
    if !state.passwords.verify_blocking(&request.old_password, &found.password_hash).await {
        return Err(AppError::BadRequest("Old password is incorrect".to_string()));
    }

    let new_hash = state.passwords.hash_blocking(&request.new_password).await?;
    let changed_at = now();

    let txn = state.db.begin().await?;
    let mut active = found.into_active_model();
    active.password_hash = Set(new_hash);
    active.is_temp_password = Set(false);
    active.modified_by = Set(Some(user_id));
    active.modified_date = Set(Some(changed_at));
    active.update(&txn).await?;
    SessionManager::end_all_for_user_in(&txn, user_id, changed_at).await?;
    txn.commit().await?;

    info!("User {} changed their password", user_id);
    Ok(())
}

/// Issues a reset token for the account with this email and mails the link.
///
/// Unknown emails are reported as not found unless
/// `reset.reveal_unknown_email` is off, in which case they succeed silently.
#[instrument(skip(state))]
pub async fn request_password_reset(state: &AppState, email: &str) -> AppResult<()> {
    let email = email.trim().to_lowercase();
    let detail = user_detail::Entity::find()
        .filter(user_detail::Column::Email.eq(&email))
        .one(&state.db)
        .await?;

    let Some(detail) = detail else {
        if state.settings.reset.reveal_unknown_email {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        debug!("Reset requested for unknown email, ignoring");
        return Ok(());
    };

    let token = new_token();
    let expiration = now() + Duration::minutes(state.settings.reset.token_ttl_minutes);
    password_reset_token::ActiveModel {
        user_id: Set(detail.user_id),
        token: Set(token.clone()),
        expiration: Set(expiration),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    let reset_url = format!(
        "{}/reset-password?token={}",
        state.settings.reset.frontend_base_url.trim_end_matches('/'),
        token
    );
    state
        .notifications
        .dispatch(templates::password_reset(&detail.email, &reset_url));

    info!("Password reset token issued for user {}", detail.user_id);
    Ok(())
}

pub async fn reset_password(state: &AppState, request: &ResetPasswordRequest) -> AppResult<()> {
    reset_password_at(state, request, now()).await
}

/// Consumes a reset token: sets the new password, clears the temporary flag
/// and ends every session of the user. Tokens are single use; an expired
/// token is deleted and rejected.
#[instrument(skip_all)]
pub async fn reset_password_at(
    state: &AppState,
    request: &ResetPasswordRequest,
    now: NaiveDateTime,
) -> AppResult<()> {
    let found = password_reset_token::Entity::find()
        .filter(password_reset_token::Column::Token.eq(&request.token))
        .one(&state.db)
        .await?
        .ok_or(AppError::InvalidToken)?;

    if found.is_expired_at(now) {
        info!("Expired reset token of user {} discarded", found.user_id);
        found.delete(&state.db).await?;
        return Err(AppError::TokenExpired);
    }
    check_new_password(&request.new_password)?;

    let new_hash = state.passwords.hash_blocking(&request.new_password).await?;
    let user_id = found.user_id;

    let txn = state.db.begin().await?;
    // Claiming the row inside the transaction is what makes the token single
    // use: a concurrent reset that lost the race deletes nothing.
    let claimed = password_reset_token::Entity::delete_many()
        .filter(password_reset_token::Column::Token.eq(&request.token))
        .exec(&txn)
        .await?;
    if claimed.rows_affected != 1 {
        warn!("Reset token of user {} was already consumed", user_id);
        return Err(AppError::InvalidToken);
    }

    let account = user::Entity::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::InvalidToken)?;
    let mut active = account.into_active_model();
    active.password_hash = Set(new_hash);
    active.is_temp_password = Set(false);
    active.modified_date = Set(Some(now));
    active.update(&txn).await?;

    SessionManager::end_all_for_user_in(&txn, user_id, now).await?;
    txn.commit().await?;

    info!("Password reset completed for user {}", user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{insert_user, setup_test_app_state};
    use model::entities::role;
    use sea_orm::PaginatorTrait;

    #[tokio::test]
    async fn test_login_with_temp_password_requests_change() {
        let (state, _) = setup_test_app_state().await;
        insert_user(&state.db, "temp@example.com", "temp-pass-1", role::USER, true).await;

        let outcome = login(&state, "Temp@Example.com", "temp-pass-1").await.unwrap();
        assert!(outcome.response.redirect_to_change_password);
        assert!(outcome.response.user.is_none());
        assert!(state.sessions.validate(&outcome.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_login_returns_user_view() {
        let (state, _) = setup_test_app_state().await;
        let id = insert_user(&state.db, "ok@example.com", "good-password", role::ADMIN, false).await;

        let outcome = login(&state, "ok@example.com", "good-password").await.unwrap();
        assert_eq!(outcome.response.msg, "Login successful");
        let view = outcome.response.user.unwrap();
        assert_eq!(view.id, id);
        assert_eq!(view.role, "admin");
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (state, _) = setup_test_app_state().await;
        let id = insert_user(&state.db, "off@example.com", "good-password", role::USER, false).await;
        user::ActiveModel {
            id: Set(id),
            status: Set(false),
            ..Default::default()
        }
        .update(&state.db)
        .await
        .unwrap();

        assert!(matches!(
            login(&state, "nobody@example.com", "good-password").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            login(&state, "off@example.com", "wrong-password").await,
            Err(AppError::InvalidCredentials)
        ));
        assert!(matches!(
            login(&state, "off@example.com", "good-password").await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password_rules() {
        let (state, _) = setup_test_app_state().await;
        let id = insert_user(&state.db, "c@example.com", "old-password", role::USER, true).await;
        let change = |old: &str, new: &str, confirm: &str| ChangePasswordRequest {
            old_password: old.to_string(),
            new_password: new.to_string(),
            confirm_password: confirm.to_string(),
        };

        for bad in [
            change("old-password", "new-password", "other-password"),
            change("old-password", "short", "short"),
            change("wrong-password", "new-password", "new-password"),
        ] {
            assert!(matches!(
                change_password(&state, id, &bad).await,
                Err(AppError::BadRequest(_))
            ));
        }

        let token = state.sessions.create_session(id).await.unwrap();
        change_password(&state, id, &change("old-password", "new-password", "new-password"))
            .await
            .unwrap();

        assert!(state.sessions.validate(&token).await.is_err());
        let outcome = login(&state, "c@example.com", "new-password").await.unwrap();
        assert!(!outcome.response.redirect_to_change_password);
        assert!(login(&state, "c@example.com", "old-password").await.is_err());
    }

    #[tokio::test]
    async fn test_forgot_password_unknown_email() {
        let (mut state, mailer) = setup_test_app_state().await;
        assert!(matches!(
            request_password_reset(&state, "ghost@example.com").await,
            Err(AppError::NotFound(_))
        ));

        std::sync::Arc::make_mut(&mut state.settings).reset.reveal_unknown_email = false;
        request_password_reset(&state, "ghost@example.com").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reset_flow_is_single_use() {
        let (state, mailer) = setup_test_app_state().await;
        let id = insert_user(&state.db, "f@example.com", "old-password", role::USER, true).await;
        let session = state.sessions.create_session(id).await.unwrap();

        request_password_reset(&state, "f@example.com").await.unwrap();
        let sent = mailer.wait_for(1).await;
        let token = sent[0]
            .body
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap()
            .to_string();

        let request = ResetPasswordRequest {
            token: token.clone(),
            new_password: "brand-new-pass".to_string(),
        };
        reset_password(&state, &request).await.unwrap();

        assert!(state.sessions.validate(&session).await.is_err());
        let outcome = login(&state, "f@example.com", "brand-new-pass").await.unwrap();
        assert!(!outcome.response.redirect_to_change_password);

        assert!(matches!(
            reset_password(&state, &request).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_resets_consume_token_once() {
        let (state, _) = setup_test_app_state().await;
        let id = insert_user(&state.db, "race@example.com", "old-password", role::USER, false).await;
        password_reset_token::ActiveModel {
            user_id: Set(id),
            token: Set("shared".to_string()),
            expiration: Set(now() + Duration::minutes(60)),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();

        let first = ResetPasswordRequest {
            token: "shared".to_string(),
            new_password: "first-password".to_string(),
        };
        let second = ResetPasswordRequest {
            token: "shared".to_string(),
            new_password: "second-password".to_string(),
        };
        let (a, b) = tokio::join!(reset_password(&state, &first), reset_password(&state, &second));

        let (winner, loser, lost) = match (a, b) {
            (Ok(()), Err(e)) => ("first-password", "second-password", e),
            (Err(e), Ok(())) => ("second-password", "first-password", e),
            (a, b) => panic!("exactly one reset should succeed, got {a:?} and {b:?}"),
        };
        assert!(matches!(lost, AppError::InvalidToken));

        assert!(login(&state, "race@example.com", winner).await.is_ok());
        assert!(matches!(
            login(&state, "race@example.com", loser).await,
            Err(AppError::InvalidCredentials)
        ));
        assert_eq!(password_reset_token::Entity::find().count(&state.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_is_deleted() {
        let (state, _) = setup_test_app_state().await;
        let id = insert_user(&state.db, "e@example.com", "old-password", role::USER, false).await;
        let issued = now();
        password_reset_token::ActiveModel {
            user_id: Set(id),
            token: Set("stale".to_string()),
            expiration: Set(issued + Duration::minutes(60)),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap();

        let request = ResetPasswordRequest {
            token: "stale".to_string(),
            new_password: "brand-new-pass".to_string(),
        };
        let err = reset_password_at(&state, &request, issued + Duration::minutes(61))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::TokenExpired));
        assert_eq!(password_reset_token::Entity::find().count(&state.db).await.unwrap(), 0);
        assert!(login(&state, "e@example.com", "old-password").await.is_ok());
    }
}
