use crate::handlers::{
    auth::{change_password, forgot_password, login, logout, me, reset_password},
    dashboard::{
        get_active_users, get_average_session_length, get_gap_in_queries,
        get_most_referenced_files, get_searches_per_user, get_top_queries,
    },
    files::{delete_file, get_files, upload_file},
    health::health_check,
    users::{create_user, delete_user, get_users, reset_user_password, update_user},
    ws::dashboard_socket,
};
use crate::config::CorsSettings;
use crate::schemas::{ApiDoc, AppState};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{debug, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Credentialed CORS for the configured origins; same-origin only when none are set.
fn cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    if origins.is_empty() {
        debug!("No CORS origins configured");
        return CorsLayer::new();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
}

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let settings = state.settings.clone();
    let upload_limit = settings.storage.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Authentication
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/change-password", post(change_password))
        .route("/api/v1/auth/forgot-password", post(forgot_password))
        .route("/api/v1/auth/reset-password", post(reset_password))
        .route("/api/v1/me", get(me))
        // User administration
        .route("/api/v1/admin/users", post(create_user))
        .route("/api/v1/admin/users", get(get_users))
        .route("/api/v1/admin/users/:user_id", put(update_user))
        .route("/api/v1/admin/users/:user_id", delete(delete_user))
        .route(
            "/api/v1/admin/users/:user_id/reset-password",
            post(reset_user_password),
        )
        // Documents
        .route(
            "/api/v1/files",
            post(upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/v1/files", get(get_files))
        .route("/api/v1/files/:file_id", delete(delete_file))
        // Dashboard
        .route(
            "/api/v1/dashboard/average-session-length",
            get(get_average_session_length),
        )
        .route("/api/v1/dashboard/active-users", get(get_active_users))
        .route("/api/v1/dashboard/top-queries", get(get_top_queries))
        .route("/api/v1/dashboard/gap-in-queries", get(get_gap_in_queries))
        .route(
            "/api/v1/dashboard/most-referenced-files",
            get(get_most_referenced_files),
        )
        .route(
            "/api/v1/dashboard/searches-per-user",
            get(get_searches_per_user),
        )
        .route("/api/v1/ws/dashboard/:topic", get(dashboard_socket))
        // Stored documents
        .nest_service("/storage", ServeDir::new(&settings.storage.root_dir))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    settings.server.request_timeout_secs,
                )))
                .layer(cors_layer(&settings.cors)),
        )
        .with_state(state)
}
