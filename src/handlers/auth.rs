use axum::{
    extract::State,
    http::HeaderMap,
    response::Json,
};
use axum_valid::Valid;
use common::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    ResetPasswordRequest, UserView,
};
use tracing::{debug, info, instrument, trace};

use crate::auth::{clear_session_cookie, read_cookie, session_cookie, with_cookie, CurrentUser};
use crate::errors::AppResult;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use crate::services::credentials;

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in, session cookie set", body = crate::schemas::LoginApiResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 403, description = "Account is inactive", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<LoginRequest>>,
) -> AppResult<(HeaderMap, Json<ApiResponse<LoginResponse>>)> {
    trace!("Entering login function");
    let outcome = credentials::login(&state, &request.username, &request.password).await?;
    let cookie = session_cookie(&state.settings.session, &outcome.token)?;

    Ok((
        with_cookie(HeaderMap::new(), cookie),
        Json(ApiResponse::ok(outcome.response, "Login successful")),
    ))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out, session cookie cleared", body = crate::schemas::MessageApiResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<(HeaderMap, Json<ApiResponse<MessageResponse>>)> {
    trace!("Entering logout function");
    if let Some(token) = read_cookie(&headers, &state.settings.session.cookie_name) {
        let ended = state.sessions.end(&token).await?;
        debug!("Logout ended an active session: {}", ended);
    }

    let cookie = clear_session_cookie(&state.settings.session)?;
    Ok((
        with_cookie(HeaderMap::new(), cookie),
        Json(ApiResponse::ok(MessageResponse::new("Logged out"), "Logged out")),
    ))
}

/// Change the password of the signed-in user
///
/// Every session of the user ends, the current one included.
#[utoipa::path(
    post,
    path = "/api/v1/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed, session cookie cleared", body = crate::schemas::MessageApiResponse),
        (status = 400, description = "Wrong old password or invalid new password", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(user_id = current.user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<(HeaderMap, Json<ApiResponse<MessageResponse>>)> {
    trace!("Entering change_password function");
    credentials::change_password(&state, current.user.id, &request).await?;

    let cookie = clear_session_cookie(&state.settings.session)?;
    Ok((
        with_cookie(HeaderMap::new(), cookie),
        Json(ApiResponse::ok(
            MessageResponse::new("Password changed successfully, please log in again"),
            "Password changed",
        )),
    ))
}

/// Request a password reset link by email
#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent", body = crate::schemas::MessageApiResponse),
        (status = 400, description = "Invalid email", body = ErrorResponse),
        (status = 404, description = "No user with this email", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn forgot_password(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<ForgotPasswordRequest>>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    trace!("Entering forgot_password function");
    credentials::request_password_reset(&state, &request.email).await?;

    Ok(Json(ApiResponse::ok(
        MessageResponse::new("Password reset link has been sent to your email"),
        "Reset requested",
    )))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = crate::schemas::MessageApiResponse),
        (status = 400, description = "Invalid, used or expired token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    trace!("Entering reset_password function");
    credentials::reset_password(&state, &request).await?;
    info!("Password reset through token");

    Ok(Json(ApiResponse::ok(
        MessageResponse::new("Password has been reset successfully"),
        "Password reset",
    )))
}

/// The signed-in user
#[utoipa::path(
    get,
    path = "/api/v1/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = crate::schemas::UserViewResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn me(current: CurrentUser) -> Json<ApiResponse<UserView>> {
    Json(ApiResponse::ok(current.user, "User retrieved successfully"))
}
