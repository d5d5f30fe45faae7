//! Transport-layer types shared by the HTTP handlers, the analytics crate
//! and the integration tests. Field names are the wire format.

mod auth;
mod dashboard;
mod files;
mod format;
mod users;

pub use auth::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse,
    ResetPasswordRequest,
};
pub use dashboard::{
    ActiveUsersPoint, ActiveUsersSnapshot, AverageSessionLength, DocumentGapCount, Granularity,
    ReferencedFile, SearchesPerUser, TopQueryGroup, TopQueryItem,
};
pub use files::{FileUploadDto, UploadResult};
pub use format::format_size;
pub use users::{AddUserRequest, UserView};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic API response wrapper.
/// The backend serializes its own `ApiResponse` with the same field names;
/// this copy lets clients and tests deserialize without the server crate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub code: String,
    pub success: bool,
}
