use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::Utc;
use common::{
    ActiveUsersSnapshot, AverageSessionLength, DocumentGapCount, Granularity, ReferencedFile,
    SearchesPerUser, TopQueryGroup,
};
use serde::Deserialize;
use tracing::{debug, instrument, trace};
use utoipa::IntoParams;

use crate::auth::CurrentUser;
use crate::errors::AppResult;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Query parameters of the active-users endpoint
#[derive(Debug, Deserialize, IntoParams)]
pub struct ActiveUsersQuery {
    /// `daily` (default), `weekly` or `monthly`
    #[serde(default)]
    pub granularity: Granularity,
}

/// Average session length this month vs. last month
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/average-session-length",
    tag = "dashboard",
    responses(
        (status = 200, description = "Average session length", body = crate::schemas::SessionLengthResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn get_average_session_length(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<ApiResponse<AverageSessionLength>>> {
    trace!("Entering get_average_session_length function");
    let data = analytics::average_session_length(&state.db, Utc::now().naive_utc()).await?;
    debug!("Average session length: {}", data.formatted);

    Ok(Json(ApiResponse::ok(data, "Average session length retrieved successfully")))
}

/// Distinct active users per time bucket
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/active-users",
    tag = "dashboard",
    params(ActiveUsersQuery),
    responses(
        (status = 200, description = "Active users per bucket", body = crate::schemas::ActiveUsersResponse),
        (status = 400, description = "Unknown granularity", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _user))]
pub async fn get_active_users(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ActiveUsersQuery>,
) -> AppResult<Json<ApiResponse<ActiveUsersSnapshot>>> {
    trace!("Entering get_active_users function");
    let tz = state.dashboard.time_zone();
    let data = analytics::active_users(&state.db, query.granularity, Utc::now(), tz).await?;

    Ok(Json(ApiResponse::ok(
        ActiveUsersSnapshot {
            granularity: query.granularity,
            data,
        },
        "Active users retrieved successfully",
    )))
}

/// Most frequent queries grouped by topic
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/top-queries",
    tag = "dashboard",
    responses(
        (status = 200, description = "Top queries by topic", body = crate::schemas::TopQueriesResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn get_top_queries(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<TopQueryGroup>>>> {
    trace!("Entering get_top_queries function");
    let data = analytics::top_queries(&state.db).await?;
    Ok(Json(ApiResponse::ok(data, "Top queries retrieved successfully")))
}

/// Questions the documents could not answer, per main topic
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/gap-in-queries",
    tag = "dashboard",
    responses(
        (status = 200, description = "Document gaps per topic", body = crate::schemas::DocumentGapsResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn get_gap_in_queries(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<DocumentGapCount>>>> {
    trace!("Entering get_gap_in_queries function");
    let data = analytics::gap_in_queries(&state.db).await?;
    Ok(Json(ApiResponse::ok(data, "Gaps in queries retrieved successfully")))
}

/// Source documents ranked by how often answers cited them
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/most-referenced-files",
    tag = "dashboard",
    responses(
        (status = 200, description = "Most referenced files", body = crate::schemas::ReferencedFilesResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn get_most_referenced_files(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<ReferencedFile>>>> {
    trace!("Entering get_most_referenced_files function");
    let data = analytics::most_referenced_files(&state.db).await?;
    Ok(Json(ApiResponse::ok(data, "Most referenced files retrieved successfully")))
}

/// Average number of searches per user
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/searches-per-user",
    tag = "dashboard",
    responses(
        (status = 200, description = "Searches per user", body = crate::schemas::SearchesPerUserResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn get_searches_per_user(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<ApiResponse<SearchesPerUser>>> {
    trace!("Entering get_searches_per_user function");
    let data = analytics::searches_per_user(&state.db).await?;
    Ok(Json(ApiResponse::ok(data, "Searches per user retrieved successfully")))
}
