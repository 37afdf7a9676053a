use crate::error::{AppError, AppResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

/// Writes attachments to local disk and hands back the public URL they are
/// served from under `/media`.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    base_url: String,
    max_bytes: usize,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Store `bytes` under `folder` with a fresh name keeping the original
    /// extension; returns the public URL.
    pub async fn store_bytes(
        &self,
        folder: &str,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> AppResult<String> {
        if bytes.len() > self.max_bytes {
            return Err(AppError::UploadTooLarge {
                max_bytes: self.max_bytes,
            });
        }
        if bytes.is_empty() {
            return Err(AppError::BadRequest("uploaded file is empty".into()));
        }
        let folder = sanitize_folder(folder)?;

        let file_name = format!("{}{}", Uuid::new_v4(), extension_of(original_name));
        let dir = self.root.join(folder);
        fs::create_dir_all(&dir).await?;
        fs::write(dir.join(&file_name), bytes).await?;

        let url = format!("{}/media/{folder}/{file_name}", self.base_url);
        tracing::info!(%url, size = bytes.len(), "file uploaded");
        Ok(url)
    }
}

fn sanitize_folder(folder: &str) -> AppResult<&str> {
    let valid = !folder.is_empty()
        && folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(folder)
    } else {
        Err(AppError::BadRequest(format!("invalid upload folder '{folder}'")))
    }
}

/// `".png"` for `"scan.PNG"`; empty when there is no usable extension.
fn extension_of(name: Option<&str>) -> String {
    name.and_then(|n| Path::new(n).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}
