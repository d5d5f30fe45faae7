use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::StorageSettings;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object key '{0}'")]
    InvalidKey(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Object store addressed by key. Objects are publicly readable at
/// the URL returned by `put`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError>;

    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(&settings.root_dir, &settings.public_base_url)
    }

    /// Keys are relative paths made of normal components only.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !well_formed {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String, StorageError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;

        info!("Stored object {} ({})", key, content_type);
        Ok(self.url_for(key))
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted object {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Object {} was already gone", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Builds `{folder}/{stem}_{8 hex chars}.pdf` from the client's file name.
/// The stem keeps ASCII letters, digits, `-` and `_`; anything else becomes `_`.
pub fn document_key(folder: &str, file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let mut sanitized: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.trim_matches('_').is_empty() {
        sanitized = "document".to_string();
    }

    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    let key = format!("{}/{}_{}.pdf", folder.trim_matches('/'), sanitized, suffix);
    debug!("Object key for '{}': {}", file_name, key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_key_shape() {
        let key = document_key("documents", "Annual Report 2024.PDF");
        let (prefix, rest) = key.split_once('/').unwrap();
        assert_eq!(prefix, "documents");
        assert!(rest.starts_with("Annual_Report_2024_"));
        assert!(rest.ends_with(".pdf"));

        let suffix = rest
            .trim_start_matches("Annual_Report_2024_")
            .trim_end_matches(".pdf");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_document_key_neutralizes_paths() {
        let key = document_key("documents/", "../../etc/passwd.pdf");
        assert!(key.starts_with("documents/passwd_"));
        assert!(!key.contains(".."));

        let key = document_key("documents", "???.pdf");
        assert!(key.starts_with("documents/document_"));
    }

    #[tokio::test]
    async fn test_fs_store_put_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "http://files.local/");

        let url = store
            .put("documents/a.pdf", b"%PDF-1.7", "application/pdf")
            .await
            .unwrap();
        assert_eq!(url, "http://files.local/documents/a.pdf");
        let stored = tokio::fs::read(dir.path().join("documents/a.pdf")).await.unwrap();
        assert_eq!(stored, b"%PDF-1.7");

        store.delete("documents/a.pdf").await.unwrap();
        assert!(!dir.path().join("documents/a.pdf").exists());
        // Idempotent
        store.delete("documents/a.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_fs_store_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path(), "http://files.local");

        for key in ["../outside.pdf", "/abs.pdf", ""] {
            assert!(matches!(
                store.put(key, b"x", "application/pdf").await,
                Err(StorageError::InvalidKey(_))
            ));
        }
    }
}
