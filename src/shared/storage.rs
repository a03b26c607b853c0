use crate::errors::RestoreServiceError;
use crate::shared::ids::new_upload_id;
use crate::shared::paths::absolute_dir;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Inbound upload body, chunk by chunk
pub type ByteStream<'a> = BoxStream<'a, io::Result<Bytes>>;

/// A dump persisted under the storage directory
#[derive(Debug, Clone, Serialize)]
pub struct UploadedFile {
    pub generated_id: String,
    pub original_name: String,
    pub stored_path: PathBuf,
    pub size_bytes: u64,
    pub received_at: DateTime<Utc>,
}

/// Storage capability for uploaded dumps
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Directory every stored file lives in
    fn root(&self) -> &Path;

    /// Persist the whole stream before returning
    async fn store<'a>(
        &self,
        original_name: &str,
        body: ByteStream<'a>,
    ) -> Result<UploadedFile, RestoreServiceError>;
}

/// Stores uploads as `{dir}/{id}_{original_name}` on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalUploadStore {
    dir: PathBuf,
}

impl LocalUploadStore {
    /// Create the storage directory if needed. The root is kept absolute and
    /// normalized so stored paths can be compared against it.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, RestoreServiceError> {
        let dir = absolute_dir(&dir.into())?;
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn destination(&self, id: &str, original_name: &str) -> Result<PathBuf, RestoreServiceError> {
        validate_original_name(original_name)?;
        let path = self.dir.join(format!("{}_{}", id, original_name));
        if path.parent() != Some(self.dir.as_path()) {
            return Err(RestoreServiceError::invalid(format!(
                "upload name {:?} resolves outside the upload directory",
                original_name
            )));
        }
        Ok(path)
    }

    async fn write_stream(path: &Path, mut body: ByteStream<'_>) -> io::Result<u64> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;

        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

#[async_trait]
impl UploadStore for LocalUploadStore {
    fn root(&self) -> &Path {
        &self.dir
    }

    async fn store<'a>(
        &self,
        original_name: &str,
        body: ByteStream<'a>,
    ) -> Result<UploadedFile, RestoreServiceError> {
        let generated_id = new_upload_id();
        let stored_path = self.destination(&generated_id, original_name)?;

        match Self::write_stream(&stored_path, body).await {
            Ok(size_bytes) => {
                info!(stored_path = %stored_path.display(), size_bytes = %size_bytes, "Upload stored");
                Ok(UploadedFile {
                    generated_id,
                    original_name: original_name.to_string(),
                    stored_path,
                    size_bytes,
                    received_at: Utc::now(),
                })
            }
            Err(e) => {
                warn!(stored_path = %stored_path.display(), error = %e, "Upload write failed");
                if let Err(cleanup) = fs::remove_file(&stored_path).await {
                    if cleanup.kind() != io::ErrorKind::NotFound {
                        warn!(error = %cleanup, "Could not remove partial upload");
                    }
                }
                Err(RestoreServiceError::StorageWriteFailed(e))
            }
        }
    }
}

/// Original names become part of a path: no separators, no dot segments
pub fn validate_original_name(name: &str) -> Result<(), RestoreServiceError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(RestoreServiceError::invalid("upload needs a file name"));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(RestoreServiceError::invalid(format!(
            "upload name {:?} must not contain path separators",
            name
        )));
    }
    Ok(())
}
