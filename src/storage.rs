//! Local file store for user documents (resumes), addressed by slash-separated keys
//! such as `resumes/{user_id}/cv.pdf` and served back under `/storage/{key}`.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};

pub const RESUME_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
    base_url: String,
    max_upload_bytes: usize,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str, max_upload_bytes: usize) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_upload_bytes,
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Key under which a user's resume is stored.
    pub fn resume_key(user_id: &str, file_name: &str) -> Result<String> {
        Ok(format!("resumes/{}/{}", user_id, sanitize_file_name(file_name)?))
    }

    /// Write `bytes` under `key`, replacing any existing object. Returns the public URL.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        if bytes.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "File exceeds the {} byte limit",
                self.max_upload_bytes
            )));
        }
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::info!(key, size = bytes.len(), "stored object");
        Ok(self.public_url(key))
    }

    /// Read an object. `Ok(None)` when nothing is stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/storage/{}", self.base_url, encoded.join("/"))
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            if segment.is_empty()
                || segment == "."
                || segment == ".."
                || segment.contains('\\')
                || Path::new(segment).is_absolute()
            {
                return Err(AppError::BadRequest("Invalid storage key".into()));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

/// Reduce an uploaded file name to a safe single path segment.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(AppError::BadRequest("Invalid file name".into()));
    }
    Ok(cleaned)
}

/// Content type to serve a stored object with, by extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
