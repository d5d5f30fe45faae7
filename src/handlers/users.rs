use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use common::{AddUserRequest, MessageResponse, UserView};
use tracing::{debug, info, instrument, trace};

use crate::auth::AdminUser;
use crate::errors::AppResult;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use crate::services::users;

/// Create a new user
///
/// The user receives a temporary password by email.
#[utoipa::path(
    post,
    path = "/api/v1/admin/users",
    tag = "users",
    request_body = AddUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = crate::schemas::UserViewResponse),
        (status = 400, description = "Invalid request or unknown role", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all, fields(email = %request.email))]
pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Valid(Json(request)): Valid<Json<AddUserRequest>>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserView>>)> {
    trace!("Entering create_user function");
    let view = users::create_user(&state, &request, Some(admin.user.id)).await?;
    info!("Admin {} created user {}", admin.user.id, view.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(view, "User created successfully")),
    ))
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "users",
    responses(
        (status = 200, description = "Users retrieved successfully", body = crate::schemas::UserListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn get_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ApiResponse<Vec<UserView>>>> {
    trace!("Entering get_users function");
    let views = users::list_views(&state.db).await?;
    debug!("Returning {} users", views.len());

    Ok(Json(ApiResponse::ok(views, "Users retrieved successfully")))
}

/// Replace the editable fields of a user
#[utoipa::path(
    put,
    path = "/api/v1/admin/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = AddUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = crate::schemas::UserViewResponse),
        (status = 400, description = "Invalid request or unknown role", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 409, description = "Email used by another user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, admin, request))]
pub async fn update_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Valid(Json(request)): Valid<Json<AddUserRequest>>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    trace!("Entering update_user function for user_id: {}", user_id);
    let view = users::update_user(&state, user_id, &request, admin.user.id).await?;

    Ok(Json(ApiResponse::ok(view, "User updated successfully")))
}

/// Delete a user with their sessions and reset tokens
#[utoipa::path(
    delete,
    path = "/api/v1/admin/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User deleted successfully", body = crate::schemas::MessageApiResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, admin))]
pub async fn delete_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    trace!("Entering delete_user function for user_id: {}", user_id);
    users::delete_user(&state.db, user_id).await?;
    info!("Admin {} deleted user {}", admin.user.id, user_id);

    Ok(Json(ApiResponse::ok(
        MessageResponse::new("User deleted successfully"),
        "User deleted successfully",
    )))
}

/// Issue a new temporary password for a user
#[utoipa::path(
    post,
    path = "/api/v1/admin/users/{user_id}/reset-password",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "Temporary password sent", body = crate::schemas::MessageApiResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, admin))]
pub async fn reset_user_password(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    trace!("Entering reset_user_password function for user_id: {}", user_id);
    users::reset_temp_password(&state, user_id, admin.user.id).await?;

    Ok(Json(ApiResponse::ok(
        MessageResponse::new("Temporary password has been sent to the user"),
        "Password reset",
    )))
}
