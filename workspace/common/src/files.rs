use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Metadata of an uploaded document as listed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct FileUploadDto {
    pub id: i32,
    pub file_name: String,
    pub file_url: String,
    pub file_type: String,
    /// Human-readable size, e.g. `1.50 MB`.
    pub file_size: String,
    pub file_size_bytes: i64,
    pub uploaded_at: NaiveDateTime,
}

/// Result of an upload. `notified` is false when the AI backend could not be
/// told about the new document; the upload itself is kept.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct UploadResult {
    pub file: FileUploadDto,
    pub notified: bool,
}
