use std::path::PathBuf;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::future::try_join_all;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to store {file_name}: {source}")]
    Io {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
}

/// A file received from a client, waiting to be stored.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// Object storage for product and blog media. Returns the public URL of the stored object.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload(&self, folder: &str, upload: MediaUpload) -> Result<String, MediaError>;

    /// Deletes an object previously returned by `upload`. Unknown URLs are ignored.
    async fn remove(&self, url: &str) -> Result<(), MediaError>;
}

/// Upload every file concurrently. URLs come back in input order.
pub async fn upload_all(
    store: &dyn MediaStore,
    folder: &str,
    uploads: Vec<MediaUpload>,
) -> Result<Vec<String>, MediaError> {
    if uploads.is_empty() {
        return Ok(Vec::new());
    }
    let count = uploads.len();
    let urls = try_join_all(uploads.into_iter().map(|upload| store.upload(folder, upload))).await?;
    tracing::debug!(folder, count, "media uploaded");
    Ok(urls)
}

/// Passes `result` through, deleting `urls` first when it is an error so a
/// failed write leaves no orphaned media behind. Removal is best effort.
pub async fn discard_on_error<T, E>(
    store: &dyn MediaStore,
    urls: &[String],
    result: Result<T, E>,
) -> Result<T, E> {
    if result.is_err() {
        for url in urls {
            if let Err(err) = store.remove(url).await {
                tracing::warn!(%url, error = %err, "failed to discard media");
            }
        }
        if !urls.is_empty() {
            tracing::debug!(count = urls.len(), "discarded media after failed write");
        }
    }
    result
}

/// Stores media on the local filesystem; the directory is served under `base_url`.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, folder: &str, upload: MediaUpload) -> Result<String, MediaError> {
        let folder = folder.trim_matches('/');
        let key = format!(
            "{}.{}",
            Uuid::new_v4().simple(),
            file_extension(&upload.file_name, &upload.content_type)
        );
        let dir = self.root.join(folder);
        let io_err = |source| MediaError::Io {
            file_name: upload.file_name.clone(),
            source,
        };

        fs::create_dir_all(&dir).await.map_err(io_err)?;
        fs::write(dir.join(&key), &upload.bytes)
            .await
            .map_err(io_err)?;

        Ok(format!("{}/{}/{}", self.base_url, folder, key))
    }

    async fn remove(&self, url: &str) -> Result<(), MediaError> {
        let Some(relative) = url
            .strip_prefix(&self.base_url)
            .map(|rest| rest.trim_start_matches('/'))
        else {
            return Ok(());
        };
        if relative.is_empty() || relative.split('/').any(|part| part.is_empty() || part == "..") {
            return Ok(());
        }

        match fs::remove_file(self.root.join(relative)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(MediaError::Io {
                file_name: relative.to_string(),
                source: err,
            }),
            _ => Ok(()),
        }
    }
}

fn file_extension(file_name: &str, content_type: &str) -> String {
    let from_name = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }
    content_type
        .split_once('/')
        .map(|(_, subtype)| subtype.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}
