//! Session cookie handling and the extractors that gate routes.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
};
use common::UserView;
use tracing::{debug, trace};

use crate::config::SessionSettings;
use crate::errors::{AppError, AppResult};
use crate::schemas::AppState;
use crate::services::users::find_view;

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(settings: &SessionSettings, token: &str) -> AppResult<HeaderValue> {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        settings.cookie_name, token
    );
    if settings.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(format!("Invalid session cookie: {e}")))
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_session_cookie(settings: &SessionSettings) -> AppResult<HeaderValue> {
    let mut cookie = format!(
        "{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0",
        settings.cookie_name
    );
    if settings.cookie_secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::Internal(format!("Invalid session cookie: {e}")))
}

pub fn with_cookie(mut headers: HeaderMap, cookie: HeaderValue) -> HeaderMap {
    headers.append(SET_COOKIE, cookie);
    headers
}

/// Value of the cookie named `name`, if the request carries one.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// The signed-in, active user behind the session cookie.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: UserView,
    pub token: String,
}

/// A `CurrentUser` holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

/// Resolves the session cookie to an active user.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> AppResult<CurrentUser> {
    let token = read_cookie(headers, &state.settings.session.cookie_name)
        .ok_or(AppError::Unauthenticated)?;
    let session = state.sessions.validate(&token).await?;

    let user = find_view(&state.db, session.user_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    if !user.status {
        debug!("Session {} belongs to inactive user {}", session.id, user.id);
        return Err(AppError::Unauthenticated);
    }

    trace!("Authenticated user {}", user.id);
    Ok(CurrentUser { user, token })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        authenticate(&state, &parts.headers).await
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if !current.user.role.eq_ignore_ascii_case(model::entities::role::ADMIN) {
            debug!("User {} with role '{}' denied admin access", current.user.id, current.user.role);
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(AdminUser(current))
    }
}
