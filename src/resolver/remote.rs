//! Resolution through the remote metadata service.

use super::MetadataResolver;
use crate::config::Config;
use crate::error::{ResolutionError, ServiceErrorBody};
use crate::types::{AspectRatio, DownloadOption, MediaKind, MediaMetadata, default_label};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Message used when the service fails without a `detail`
const DEFAULT_SERVER_ERROR: &str = "Failed to fetch video from server";

/// Author shown when the service does not name one
const DEFAULT_AUTHOR: &str = "Twitter User";

/// Title used when the service does not provide one
const DEFAULT_TITLE: &str = "Untitled video";

/// Body of `POST /api/video`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRequest {
    /// The submitted link
    pub url: String,
    /// Ask for an audio-only rendition as well
    pub include_mp3: bool,
}

/// Resolver backed by the metadata service
///
/// The whole exchange (connect, send, read, decode) is bounded by `timeout`; when it
/// expires the in-flight request is dropped and reported as unreachable.
#[derive(Clone, Debug)]
pub struct RemoteResolver {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    include_mp3: bool,
}

impl RemoteResolver {
    /// Create a resolver talking to `{base_url}/api/video`
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: Duration::from_secs(15),
            include_mp3: true,
        }
    }

    /// Create a resolver from the session configuration
    pub fn from_config(client: reqwest::Client, config: &Config) -> Self {
        Self::new(client, config.api_base_url())
            .with_timeout(config.resolver.timeout)
            .with_include_mp3(config.resolver.include_mp3)
    }

    /// Bound on the whole exchange
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether to request an audio-only rendition
    pub fn with_include_mp3(mut self, include_mp3: bool) -> Self {
        self.include_mp3 = include_mp3;
        self
    }

    /// The metadata endpoint
    pub fn endpoint(&self) -> String {
        format!("{}/api/video", self.base_url)
    }

    async fn exchange(&self, url: &str) -> Result<MediaMetadata, ResolutionError> {
        let endpoint = self.endpoint();
        let body = ResolveRequest {
            url: url.to_string(),
            include_mp3: self.include_mp3,
        };

        let response = self
            .client
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_connect() {
                    format!("connection to metadata service failed: {}", e)
                } else {
                    format!("failed to reach metadata service: {}", e)
                };
                ResolutionError::Unreachable { reason }
            })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResolutionError::Unreachable {
                reason: format!("failed to read metadata response: {}", e),
            })?;

        if !status.is_success() {
            let detail = ServiceErrorBody::parse(&bytes).detail_or(DEFAULT_SERVER_ERROR);
            return Err(ResolutionError::ServerError {
                status: Some(status.as_u16()),
                detail,
            });
        }

        let wire: WireMetadata =
            serde_json::from_slice(&bytes).map_err(|e| ResolutionError::ServerError {
                status: Some(status.as_u16()),
                detail: format!("invalid metadata response: {}", e),
            })?;

        Ok(wire.into_metadata(url))
    }
}

#[async_trait]
impl MetadataResolver for RemoteResolver {
    async fn resolve(&self, url: &str) -> Result<MediaMetadata, ResolutionError> {
        tracing::debug!(url = %url, endpoint = %self.endpoint(), "resolving via metadata service");

        match tokio::time::timeout(self.timeout, self.exchange(url)).await {
            Ok(result) => result,
            Err(_) => Err(ResolutionError::Unreachable {
                reason: format!(
                    "metadata service did not respond within {} seconds",
                    self.timeout.as_secs_f64()
                ),
            }),
        }
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Metadata as the service sends it; everything but the options list is optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetadata {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, alias = "original_url")]
    original_url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "thumbnail_url")]
    thumbnail_url: Option<String>,
    #[serde(default, alias = "preview_url")]
    preview_url: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default, alias = "avatar_url")]
    avatar_url: Option<String>,
    #[serde(default, alias = "aspect_ratio")]
    aspect_ratio: Option<String>,
    #[serde(default)]
    options: Vec<WireOption>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireOption {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, alias = "media_kind")]
    media_kind: Option<MediaKind>,
    #[serde(default)]
    extension: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default, alias = "is_best")]
    is_best: Option<bool>,
    #[serde(default, alias = "sourceUrl", alias = "source_url")]
    url: Option<String>,
}

impl WireOption {
    fn into_option(self) -> DownloadOption {
        let media_kind = self.media_kind.unwrap_or_else(|| {
            MediaKind::derive(self.url.as_deref(), self.extension.as_deref())
        });
        let quality = self.quality.unwrap_or_default();
        DownloadOption {
            id: self.id.unwrap_or_default(),
            label: self
                .label
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| default_label(media_kind, &quality)),
            media_kind,
            quality,
            size: self.size.filter(|s| !s.trim().is_empty()),
            is_best: self.is_best.unwrap_or(false),
            source_url: self.url,
        }
    }
}

fn parse_aspect_ratio(value: Option<&str>) -> AspectRatio {
    match value.map(str::trim) {
        Some("9:16") => AspectRatio::Portrait,
        Some("1:1") => AspectRatio::Square,
        _ => AspectRatio::Landscape,
    }
}

impl WireMetadata {
    fn into_metadata(self, submitted_url: &str) -> MediaMetadata {
        let mut metadata = MediaMetadata {
            id: self.id.unwrap_or_default(),
            original_url: self
                .original_url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| submitted_url.to_string()),
            title: self
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            thumbnail_url: self.thumbnail_url.unwrap_or_default(),
            preview_url: self.preview_url.unwrap_or_default(),
            duration: self.duration.unwrap_or_default(),
            author: self
                .author
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            avatar_url: self.avatar_url.unwrap_or_default(),
            aspect_ratio: parse_aspect_ratio(self.aspect_ratio.as_deref()),
            options: self.options.into_iter().map(WireOption::into_option).collect(),
        };
        metadata.normalize_options();
        metadata
    }
}
