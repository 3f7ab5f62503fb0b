//! File sinks: where delivered bytes end up.

use crate::config::{DownloadConfig, FileCollisionAction};
use crate::error::{DownloadError, Error, Result, ServiceErrorBody};
use crate::utils::get_unique_path;
use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Handle to a staged blob, valid until revoked
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectUrl {
    /// Opaque client-local URL (e.g. `blob:ab12cd34`)
    pub url: String,
    /// Local file backing the blob, for sinks that stage on disk
    pub local_path: Option<PathBuf>,
}

/// Trait for the file-save primitives the executor drives
///
/// Mirrors what a browser offers: turn a blob into an object URL, save it under a
/// name, revoke it, or save a remote URL directly without going through a blob.
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Stage `bytes` and return a handle to them
    async fn create_object_url(&self, bytes: &[u8]) -> Result<ObjectUrl>;

    /// Save a staged blob as `file_name`, returning where it ended up
    async fn save(&self, object: &ObjectUrl, file_name: &str) -> Result<PathBuf>;

    /// Release a staged blob; revoking an already-consumed handle is not an error
    async fn revoke(&self, object: ObjectUrl) -> Result<()>;

    /// Save `source_url` as `file_name` without proxying or staging
    async fn save_direct(&self, source_url: &str, file_name: &str) -> Result<PathBuf>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Sink that writes into a download directory
///
/// Blobs are staged in `temp_dir` and moved into `download_dir` on save. Direct
/// saves fetch the raw URL with a plain GET.
#[derive(Clone, Debug)]
pub struct DiskSink {
    client: reqwest::Client,
    download_dir: PathBuf,
    temp_dir: PathBuf,
    file_collision: FileCollisionAction,
    transfer_timeout: Option<Duration>,
}

impl DiskSink {
    /// Create a sink from the delivery configuration
    pub fn new(client: reqwest::Client, config: &DownloadConfig) -> Self {
        Self {
            client,
            download_dir: config.download_dir.clone(),
            temp_dir: config.temp_dir.clone(),
            file_collision: config.file_collision,
            transfer_timeout: config.proxy_timeout,
        }
    }

    /// Directory saved files are placed in
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    async fn destination(&self, file_name: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.download_dir).await?;
        get_unique_path(&self.download_dir.join(file_name), self.file_collision)
    }
}

fn staging_name() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("blob-{}", suffix)
}

/// Move a file, copying when a rename is not possible (e.g. across filesystems)
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

#[async_trait]
impl FileSink for DiskSink {
    async fn create_object_url(&self, bytes: &[u8]) -> Result<ObjectUrl> {
        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let name = staging_name();
        let path = self.temp_dir.join(&name);
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            // a partial write may have created the file
            tokio::fs::remove_file(&path).await.ok();
            return Err(e.into());
        }

        Ok(ObjectUrl {
            url: format!("blob:{}", name),
            local_path: Some(path),
        })
    }

    async fn save(&self, object: &ObjectUrl, file_name: &str) -> Result<PathBuf> {
        let staged = object.local_path.as_deref().ok_or_else(|| {
            Error::Download(DownloadError::Save(format!(
                "{} has no staged file",
                object.url
            )))
        })?;

        let dest = self.destination(file_name).await?;
        move_file(staged, &dest).await?;
        Ok(dest)
    }

    async fn revoke(&self, object: ObjectUrl) -> Result<()> {
        let Some(path) = object.local_path else {
            return Ok(());
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_direct(&self, source_url: &str, file_name: &str) -> Result<PathBuf> {
        let direct_err = |reason: String| {
            Error::Download(DownloadError::DirectLink {
                url: source_url.to_string(),
                reason,
            })
        };

        let mut request = self.client.get(source_url);
        if let Some(timeout) = self.transfer_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| direct_err(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| direct_err(e.to_string()))?;

        if !status.is_success() {
            let detail = ServiceErrorBody::parse(&bytes).detail_or("request failed");
            return Err(direct_err(format!("status {}: {}", status.as_u16(), detail)));
        }

        let dest = self.destination(file_name).await?;
        tokio::fs::write(&dest, &bytes).await?;
        Ok(dest)
    }

    fn name(&self) -> &str {
        "disk"
    }
}
