use common::{FileUploadDto, UploadResult, format_size};
use model::entities::file_upload;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryOrder, Set};
use tracing::{debug, error, info, instrument, warn};

use super::notifier::NotifyError;
use super::sessions::now;
use super::storage::document_key;
use crate::errors::{AppError, AppResult};
use crate::schemas::AppState;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A file received from a multipart form.
#[derive(Debug)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn to_dto(model: file_upload::Model) -> FileUploadDto {
    FileUploadDto {
        id: model.id,
        file_name: model.file_name,
        file_url: model.file_url,
        file_type: model.file_type,
        file_size: format_size(model.file_size),
        file_size_bytes: model.file_size,
        uploaded_at: model.uploaded_at,
    }
}

/// Accepts non-empty PDFs up to `max_bytes`, judged by extension and
/// declared content type.
pub fn validate_pdf(file: &IncomingFile, max_bytes: usize) -> AppResult<()> {
    let is_pdf_name = file.file_name.to_lowercase().ends_with(".pdf");
    let is_pdf_type = file
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.eq_ignore_ascii_case(PDF_CONTENT_TYPE));

    if !is_pdf_name || !is_pdf_type {
        return Err(AppError::Validation(
            "Only PDF files are allowed".to_string(),
        ));
    }
    if file.bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }
    if file.bytes.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File exceeds the maximum size of {}",
            format_size(max_bytes as i64)
        )));
    }
    Ok(())
}

/// Stores a PDF, records its metadata and tells the AI backend about it.
/// A failed callback leaves the upload in place with `notified = false`.
#[instrument(skip(state, file), fields(file_name = %file.file_name, size = file.bytes.len()))]
pub async fn upload_document(state: &AppState, file: IncomingFile) -> AppResult<UploadResult> {
    let storage = &state.settings.storage;
    validate_pdf(&file, storage.max_upload_bytes)?;

    let key = document_key(&storage.folder, &file.file_name);
    let file_url = state
        .storage
        .put(&key, &file.bytes, PDF_CONTENT_TYPE)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;
    debug!("Stored object {}", key);

    let record = file_upload::ActiveModel {
        file_name: Set(file.file_name.clone()),
        storage_key: Set(key.clone()),
        file_url: Set(file_url.clone()),
        file_type: Set(PDF_CONTENT_TYPE.to_string()),
        file_size: Set(file.bytes.len() as i64),
        uploaded_at: Set(now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await;

    let record = match record {
        Ok(record) => record,
        Err(e) => {
            if let Err(cleanup) = state.storage.delete(&key).await {
                error!("Failed to remove orphaned object {}: {}", key, cleanup);
            }
            return Err(e.into());
        }
    };

    let notified = match state.notifier.document_uploaded(&file_url).await {
        Ok(()) => true,
        Err(NotifyError::NotConfigured) => false,
        Err(e) => {
            warn!("AI backend was not notified about {}: {}", file_url, e);
            false
        }
    };

    info!("Uploaded document {} as {}", record.id, key);
    Ok(UploadResult {
        file: to_dto(record),
        notified,
    })
}

/// All uploads, newest first.
#[instrument(skip(db))]
pub async fn list_documents(db: &DatabaseConnection) -> AppResult<Vec<FileUploadDto>> {
    let rows = file_upload::Entity::find()
        .order_by_desc(file_upload::Column::UploadedAt)
        .order_by_desc(file_upload::Column::Id)
        .all(db)
        .await?;
    debug!("Retrieved {} uploads", rows.len());
    Ok(rows.into_iter().map(to_dto).collect())
}

/// Removes the stored object, then the metadata row, then asks the index to
/// forget the document. Storage failures abort before anything is deleted.
#[instrument(skip(state))]
pub async fn delete_document(state: &AppState, id: i32) -> AppResult<()> {
    let record = file_upload::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File with ID {id} not found")))?;

    state
        .storage
        .delete(&record.storage_key)
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let file_url = record.file_url.clone();
    record.delete(&state.db).await?;

    match state.notifier.document_deleted(&file_url).await {
        Ok(()) | Err(NotifyError::NotConfigured) => {}
        Err(e) => warn!("Search index was not told to purge {}: {}", file_url, e),
    }

    info!("Deleted document {}", id);
    Ok(())
}
