//! Artifact bodies written as plain files
//!
//! Each artifact lands in `<dir>/<name><ext>`, where `name` is the first 50
//! hex digits of the SHA-256 of its canonical URL and `ext` is derived from
//! the Content-Type.

use crate::storage::traits::{ArtifactSink, StorageError, StorageResult};
use crate::storage::Artifact;
use crate::url::ResourceId;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const NAME_LEN: usize = 50;

/// Persistence sink writing raw artifact bodies into a directory
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Creates the directory if needed and returns a sink writing into it
    pub async fn create(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path an artifact would be written to
    pub fn path_for(&self, artifact: &Artifact) -> PathBuf {
        self.dir
            .join(file_name_for(&artifact.id, artifact.content_type.as_deref()))
    }
}

#[async_trait]
impl ArtifactSink for FileSink {
    async fn store(&self, artifact: Artifact) -> StorageResult<()> {
        let path = self.path_for(&artifact);

        tokio::fs::write(&path, &artifact.content)
            .await
            .map_err(|e| StorageError::Write {
                url: artifact.id.to_string(),
                message: format!("{}: {}", path.display(), e),
            })?;

        tracing::debug!("Saved {} to {}", artifact.id, path.display());
        Ok(())
    }
}

/// File name for an artifact: truncated SHA-256 of the canonical URL plus extension
pub fn file_name_for(id: &ResourceId, content_type: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_str().as_bytes());
    let mut name = hex::encode(hasher.finalize());
    name.truncate(NAME_LEN);
    name.push_str(extension_for(content_type));
    name
}

/// Maps a Content-Type header to a file extension
///
/// A missing header is treated as HTML. Unknown types get no extension.
pub fn extension_for(content_type: Option<&str>) -> &'static str {
    let essence = content_type
        .unwrap_or("text/html")
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "text/html" | "application/xhtml+xml" => ".html",
        "text/plain" => ".txt",
        "text/css" => ".css",
        "text/csv" => ".csv",
        "text/xml" | "application/xml" => ".xml",
        "application/json" => ".json",
        "application/javascript" | "text/javascript" => ".js",
        "application/pdf" => ".pdf",
        "application/zip" => ".zip",
        "application/rss+xml" => ".rss",
        "application/atom+xml" => ".atom",
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/svg+xml" => ".svg",
        _ => "",
    }
}
