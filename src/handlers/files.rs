use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use common::{FileUploadDto, MessageResponse, UploadResult};
use tracing::{debug, instrument, trace};

use crate::auth::{AdminUser, CurrentUser};
use crate::errors::{AppError, AppResult};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};
use crate::services::uploads::{self, IncomingFile};

/// Reads the `file` field of the form. Other fields are ignored.
async fn read_file_field(mut multipart: Multipart) -> AppResult<IncomingFile> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation("Uploaded file has no name".to_string()))?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read uploaded file: {e}")))?;

        return Ok(IncomingFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
    Err(AppError::Validation("Missing 'file' field".to_string()))
}

/// Upload a PDF document
#[utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "files",
    request_body(content = crate::schemas::UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document stored", body = crate::schemas::UploadApiResponse),
        (status = 400, description = "Not a PDF, empty or too large", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 500, description = "Storage or database failure", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn upload_file(
    State(state): State<AppState>,
    _admin: AdminUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<UploadResult>>)> {
    trace!("Entering upload_file function");
    let file = read_file_field(multipart).await?;
    let result = uploads::upload_document(&state, file).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(result, "File uploaded successfully")),
    ))
}

/// List uploaded documents, newest first
#[utoipa::path(
    get,
    path = "/api/v1/files",
    tag = "files",
    responses(
        (status = 200, description = "Documents retrieved successfully", body = crate::schemas::FileListResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip_all)]
pub async fn get_files(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<FileUploadDto>>>> {
    trace!("Entering get_files function");
    let files = uploads::list_documents(&state.db).await?;
    Ok(Json(ApiResponse::ok(files, "Files retrieved successfully")))
}

/// Delete an uploaded document
#[utoipa::path(
    delete,
    path = "/api/v1/files/{file_id}",
    tag = "files",
    params(
        ("file_id" = i32, Path, description = "File ID"),
    ),
    responses(
        (status = 200, description = "Document deleted", body = crate::schemas::MessageApiResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 403, description = "Admin access required", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Storage or database failure", body = ErrorResponse)
    )
)]
#[instrument(skip(state, _admin))]
pub async fn delete_file(
    Path(file_id): Path<i32>,
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<ApiResponse<MessageResponse>>> {
    trace!("Entering delete_file function for file_id: {}", file_id);
    uploads::delete_document(&state, file_id).await?;

    Ok(Json(ApiResponse::ok(
        MessageResponse::new("File deleted successfully"),
        "File deleted successfully",
    )))
}
