use std::sync::Arc;

use common::{
    ActiveUsersPoint, ActiveUsersSnapshot, AddUserRequest, AverageSessionLength,
    ChangePasswordRequest, DocumentGapCount, FileUploadDto, ForgotPasswordRequest, Granularity,
    LoginRequest, LoginResponse, MessageResponse, ReferencedFile, ResetPasswordRequest,
    SearchesPerUser, TopQueryGroup, TopQueryItem, UploadResult, UserView,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::config::Settings;
use crate::services::{
    dashboard::DashboardHub, mailer::Notifications, notifier::DownstreamNotifier,
    password::PasswordService, sessions::SessionManager, storage::ObjectStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    pub settings: Arc<Settings>,
    pub passwords: PasswordService,
    pub sessions: SessionManager,
    /// Background email delivery
    pub notifications: Notifications,
    pub storage: Arc<dyn ObjectStore>,
    /// Callbacks to the AI backend and search index
    pub notifier: DownstreamNotifier,
    pub dashboard: DashboardHub,
}

/// API response wrapper
#[derive(Serialize, ToSchema)]
#[aliases(
    UserViewResponse = ApiResponse<UserView>,
    UserListResponse = ApiResponse<Vec<UserView>>,
    LoginApiResponse = ApiResponse<LoginResponse>,
    MessageApiResponse = ApiResponse<MessageResponse>,
    FileListResponse = ApiResponse<Vec<FileUploadDto>>,
    UploadApiResponse = ApiResponse<UploadResult>,
    SessionLengthResponse = ApiResponse<AverageSessionLength>,
    ActiveUsersResponse = ApiResponse<ActiveUsersSnapshot>,
    TopQueriesResponse = ApiResponse<Vec<TopQueryGroup>>,
    DocumentGapsResponse = ApiResponse<Vec<DocumentGapCount>>,
    ReferencedFilesResponse = ApiResponse<Vec<ReferencedFile>>,
    SearchesPerUserResponse = ApiResponse<SearchesPerUser>,
)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// Multipart body of the upload endpoint.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The PDF document.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::logout,
        crate::handlers::auth::change_password,
        crate::handlers::auth::forgot_password,
        crate::handlers::auth::reset_password,
        crate::handlers::auth::me,
        crate::handlers::users::get_users,
        crate::handlers::users::create_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::reset_user_password,
        crate::handlers::files::upload_file,
        crate::handlers::files::get_files,
        crate::handlers::files::delete_file,
        crate::handlers::dashboard::get_average_session_length,
        crate::handlers::dashboard::get_active_users,
        crate::handlers::dashboard::get_top_queries,
        crate::handlers::dashboard::get_gap_in_queries,
        crate::handlers::dashboard::get_most_referenced_files,
        crate::handlers::dashboard::get_searches_per_user,
        crate::handlers::ws::dashboard_socket,
    ),
    components(
        schemas(
            UserViewResponse,
            UserListResponse,
            LoginApiResponse,
            MessageApiResponse,
            FileListResponse,
            UploadApiResponse,
            SessionLengthResponse,
            ActiveUsersResponse,
            TopQueriesResponse,
            DocumentGapsResponse,
            ReferencedFilesResponse,
            SearchesPerUserResponse,
            ErrorResponse,
            HealthResponse,
            UploadForm,
            LoginRequest,
            LoginResponse,
            ChangePasswordRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            MessageResponse,
            AddUserRequest,
            UserView,
            FileUploadDto,
            UploadResult,
            AverageSessionLength,
            Granularity,
            ActiveUsersPoint,
            ActiveUsersSnapshot,
            TopQueryGroup,
            TopQueryItem,
            DocumentGapCount,
            ReferencedFile,
            SearchesPerUser,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Login, logout and password management"),
        (name = "users", description = "User administration"),
        (name = "files", description = "Document uploads"),
        (name = "dashboard", description = "Usage analytics"),
    ),
    info(
        title = "Polit API",
        description = "Admin backend of the Polit document assistant: accounts, sessions, document uploads and usage analytics",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;
