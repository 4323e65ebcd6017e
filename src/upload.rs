//! File upload storage for multipart payloads.

use crate::error::ApiError;
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

pub const UPLOAD_DIR_ENV: &str = "UPLOAD_DIR";
pub const UPLOAD_URL_PREFIX_ENV: &str = "UPLOAD_URL_PREFIX";

/// One file part of a multipart payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file was sent under; also the record attribute it fills.
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Extension of the client file name, lowercased, if it looks sane.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let ext = Path::new(name).extension()?.to_str()?;
        if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Persists uploaded files and returns the value stored in the record field (a URL or path).
#[async_trait]
pub trait UploadStore: Send + Sync {
    async fn store(&self, dir: &str, file: &UploadedFile) -> Result<String, ApiError>;
}

/// Writes files under `root/<dir>/<uuid>.<ext>`; the stored value is `url_prefix/<dir>/<name>`.
#[derive(Clone, Debug)]
pub struct LocalUploadStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalUploadStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        LocalUploadStore {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// `UPLOAD_DIR` (default `uploads`) and `UPLOAD_URL_PREFIX` (default `/uploads`).
    pub fn from_env() -> Self {
        let root = std::env::var(UPLOAD_DIR_ENV).unwrap_or_else(|_| "uploads".into());
        let prefix = std::env::var(UPLOAD_URL_PREFIX_ENV).unwrap_or_else(|_| "/uploads".into());
        Self::new(root, prefix)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn relative_dir(dir: &str) -> Result<PathBuf, String> {
    let path = Path::new(dir.trim_matches('/'));
    if path
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        Ok(path.to_path_buf())
    } else {
        Err(format!("invalid upload directory: {}", dir))
    }
}

#[async_trait]
impl UploadStore for LocalUploadStore {
    async fn store(&self, dir: &str, file: &UploadedFile) -> Result<String, ApiError> {
        let rel = relative_dir(dir).map_err(|reason| ApiError::UploadRejected {
            field: file.field.clone(),
            reason,
        })?;
        let name = match file.extension() {
            Some(ext) => format!("{}.{}", uuid::Uuid::new_v4(), ext),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let target_dir = self.root.join(&rel);
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(|e| ApiError::Storage(format!("upload dir {}: {}", target_dir.display(), e)))?;
        let target = target_dir.join(&name);
        tokio::fs::write(&target, &file.bytes)
            .await
            .map_err(|e| ApiError::Storage(format!("upload {}: {}", target.display(), e)))?;
        tracing::debug!(field = %file.field, path = %target.display(), bytes = file.bytes.len(), "upload stored");

        let rel = rel.to_string_lossy().replace('\\', "/");
        Ok(if rel.is_empty() {
            format!("{}/{}", self.url_prefix, name)
        } else {
            format!("{}/{}/{}", self.url_prefix, rel, name)
        })
    }
}
