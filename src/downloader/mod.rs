//! Download executor: delivering a chosen rendition as a file.
//!
//! The primary path fetches the rendition through the download proxy, stages the
//! body as a blob and saves it. When that fails, video renditions get one more try
//! by saving the raw source URL directly; audio renditions do not, since audio is
//! only produced by the proxy's conversion. Every failed attempt ends in exactly one
//! [`Notification`]; a successful save emits none.
//!
//! - [`sink`] - file-save primitives ([`FileSink`], [`DiskSink`])

mod sink;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use sink::{DiskSink, FileSink, ObjectUrl};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Error, Result, ServiceErrorBody};
use crate::types::{DownloadOption, Event, Notification, NotificationKind};
use crate::utils::download_file_name;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Message used when the proxy fails without a `detail`
const DEFAULT_PROXY_ERROR: &str = "Download failed";

/// Mutual-exclusion latch allowing one download in flight
///
/// Not a queue: a second acquisition while held simply fails.
#[derive(Clone, Debug, Default)]
pub struct DownloadLatch {
    in_flight: Arc<AtomicBool>,
}

impl DownloadLatch {
    /// Take the latch, or `None` if a download is already in flight
    pub fn try_acquire(&self) -> Option<LatchGuard> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| LatchGuard {
                in_flight: self.in_flight.clone(),
            })
    }

    /// Whether a download is in flight
    pub fn is_held(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Releases the latch when dropped
#[derive(Debug)]
pub struct LatchGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// A staged blob that is revoked in the background if dropped before [`StagedBlob::revoke`]
struct StagedBlob {
    sink: Arc<dyn FileSink>,
    object: ObjectUrl,
    revoked: bool,
}

impl StagedBlob {
    fn new(sink: Arc<dyn FileSink>, object: ObjectUrl) -> Self {
        Self {
            sink,
            object,
            revoked: false,
        }
    }

    async fn revoke(mut self) -> Result<()> {
        let result = self.sink.revoke(self.object.clone()).await;
        self.revoked = true;
        result
    }
}

impl Drop for StagedBlob {
    fn drop(&mut self) {
        if self.revoked {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(url = %self.object.url, "staged blob dropped outside a runtime, not revoked");
            return;
        };

        tracing::debug!(url = %self.object.url, "download abandoned, revoking staged blob");
        let sink = self.sink.clone();
        let object = self.object.clone();
        handle.spawn(async move {
            if let Err(e) = sink.revoke(object).await {
                tracing::warn!(sink = sink.name(), error = %e, "failed to revoke staged blob");
            }
        });
    }
}

/// How a download attempt ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Fetched through the proxy and saved
    Saved {
        /// Where the file ended up
        path: PathBuf,
    },
    /// The proxy failed; the raw source URL was saved directly
    DirectLink {
        /// The unmodified source URL
        url: String,
        /// Where the file ended up
        path: PathBuf,
    },
    /// Nothing was delivered; the notification has been emitted
    Failed(Notification),
    /// Another download was in flight; nothing was attempted
    Busy,
}

/// Executes downloads for one result card
///
/// Clones share the same latch, so every clone belongs to the same card.
#[derive(Clone)]
pub struct DownloadExecutor {
    client: reqwest::Client,
    api_base_url: String,
    proxy_timeout: Option<Duration>,
    sink: Arc<dyn FileSink>,
    event_tx: broadcast::Sender<Event>,
    latch: DownloadLatch,
}

impl DownloadExecutor {
    /// Create an executor with a fresh latch
    ///
    /// `api_base_url` is the already-resolved service base (see [`Config::api_base_url`](crate::Config::api_base_url)).
    pub fn new(
        client: reqwest::Client,
        api_base_url: impl Into<String>,
        config: &DownloadConfig,
        sink: Arc<dyn FileSink>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            client,
            api_base_url: api_base_url.into(),
            proxy_timeout: config.proxy_timeout,
            sink,
            event_tx,
            latch: DownloadLatch::default(),
        }
    }

    /// Proxy URL for a source URL: `{base}/api/download?url=<percent-encoded>`
    pub fn proxy_url(&self, source_url: &str) -> String {
        format!(
            "{}/api/download?url={}",
            self.api_base_url,
            urlencoding::encode(source_url)
        )
    }

    /// Whether a download is in flight (all option buttons should be disabled)
    pub fn is_busy(&self) -> bool {
        self.latch.is_held()
    }

    /// Deliver `option`, naming the file after `title_hint`
    ///
    /// Never returns an error: failures are reported through a [`Notification`]
    /// event and [`DownloadOutcome::Failed`]. The latch is released whatever happens.
    pub async fn download(&self, option: &DownloadOption, title_hint: &str) -> DownloadOutcome {
        let Some(_guard) = self.latch.try_acquire() else {
            tracing::debug!(option_id = %option.id, "download already in flight, rejecting");
            return DownloadOutcome::Busy;
        };

        let Some(source_url) = option.usable_source_url() else {
            tracing::warn!(option_id = %option.id, quality = %option.quality, "option has no source URL");
            return self.fail(NotificationKind::MissingUrl, option);
        };

        self.event_tx
            .send(Event::DownloadStarted {
                option_id: option.id.clone(),
                quality: option.quality.clone(),
            })
            .ok();

        let file_name = download_file_name(title_hint, &option.quality, option.media_kind);

        let proxy_error = match self.deliver_via_proxy(source_url, &file_name).await {
            Ok(path) => {
                tracing::info!(
                    option_id = %option.id,
                    path = %path.display(),
                    "saved download"
                );
                self.event_tx
                    .send(Event::DownloadSaved {
                        option_id: option.id.clone(),
                        path: path.clone(),
                    })
                    .ok();
                return DownloadOutcome::Saved { path };
            }
            Err(e) => e,
        };

        tracing::warn!(
            option_id = %option.id,
            kind = %option.media_kind,
            error = %proxy_error,
            "proxied download failed"
        );

        if option.media_kind.is_audio() {
            return self.fail(NotificationKind::ConversionFailed, option);
        }

        match self.sink.save_direct(source_url, &file_name).await {
            Ok(path) => {
                tracing::info!(
                    option_id = %option.id,
                    url = %source_url,
                    path = %path.display(),
                    "saved download via direct link"
                );
                self.event_tx
                    .send(Event::DirectLinkOpened {
                        option_id: option.id.clone(),
                        url: source_url.to_string(),
                    })
                    .ok();
                DownloadOutcome::DirectLink {
                    url: source_url.to_string(),
                    path,
                }
            }
            Err(e) => {
                tracing::error!(
                    option_id = %option.id,
                    url = %source_url,
                    error = %e,
                    "direct link fallback failed"
                );
                self.fail(NotificationKind::DownloadFailed, option)
            }
        }
    }

    fn fail(&self, kind: NotificationKind, option: &DownloadOption) -> DownloadOutcome {
        let notification = Notification::new(kind, option);
        self.event_tx
            .send(Event::Notification(notification.clone()))
            .ok();
        DownloadOutcome::Failed(notification)
    }

    /// Fetch through the proxy, stage, save, then revoke the staged blob
    async fn deliver_via_proxy(&self, source_url: &str, file_name: &str) -> Result<PathBuf> {
        let bytes = self.fetch_via_proxy(source_url).await?;
        let staged = StagedBlob::new(self.sink.clone(), self.sink.create_object_url(&bytes).await?);
        let saved = self.sink.save(&staged.object, file_name).await;

        if let Err(e) = staged.revoke().await {
            tracing::warn!(sink = self.sink.name(), error = %e, "failed to revoke staged blob");
        }

        saved
    }

    async fn fetch_via_proxy(&self, source_url: &str) -> Result<Vec<u8>> {
        let proxy_url = self.proxy_url(source_url);
        let mut request = self.client.get(&proxy_url);
        if let Some(timeout) = self.proxy_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                format!("proxy did not respond in time: {}", e)
            } else {
                format!("failed to reach proxy: {}", e)
            };
            Error::Download(DownloadError::Transfer(reason))
        })?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(|e| {
            Error::Download(DownloadError::Transfer(format!(
                "failed to read proxy response: {}",
                e
            )))
        })?;

        if !status.is_success() {
            let detail = ServiceErrorBody::parse(&bytes).detail_or(DEFAULT_PROXY_ERROR);
            return Err(Error::Download(DownloadError::Proxy {
                status: status.as_u16(),
                detail,
            }));
        }

        Ok(bytes.to_vec())
    }
}
