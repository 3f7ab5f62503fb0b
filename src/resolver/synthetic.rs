//! Synthetic metadata generator used when the metadata service is unavailable.

use super::MetadataResolver;
use crate::error::ResolutionError;
use crate::types::{AspectRatio, DownloadOption, MediaKind, MediaMetadata};
use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::time::Duration;

/// Hosts the generator accepts (subdomains included)
const SUPPORTED_HOSTS: &[&str] = &["x.com", "twitter.com"];

const LANDSCAPE_THUMBNAIL: &str = "https://picsum.photos/seed/tweet1/1280/720";
const PORTRAIT_THUMBNAIL: &str = "https://picsum.photos/seed/tweet2/720/1280";

/// Public-domain clip the generated video renditions point at
const SAMPLE_VIDEO: &str =
    "https://storage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4";

const SAMPLE_TITLE: &str =
    "Amazing footage from the event! You won't believe what happened next. #viral #video";

/// Whether `url` points at a supported post host
///
/// A missing scheme is tolerated (`x.com/user/status/1`).
///
/// # Examples
///
/// ```
/// use xstream_dl::resolver::is_supported_link;
///
/// assert!(is_supported_link("https://x.com/user/status/123"));
/// assert!(is_supported_link("mobile.twitter.com/user/status/123"));
/// assert!(!is_supported_link("https://example.com/video"));
/// ```
pub fn is_supported_link(url: &str) -> bool {
    let trimmed = url.trim();
    let parsed = if trimmed.contains("://") {
        url::Url::parse(trimmed)
    } else {
        url::Url::parse(&format!("https://{}", trimmed))
    };

    let Ok(parsed) = parsed else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    parsed.host_str().is_some_and(|host| {
        let host = host.to_ascii_lowercase();
        SUPPORTED_HOSTS
            .iter()
            .any(|supported| host == *supported || host.ends_with(&format!(".{}", supported)))
    })
}

/// Generator of plausible metadata for supported links
///
/// Rejects unsupported links with `invalid_url`; otherwise waits `delay` and returns
/// three video renditions (1080p best, 720p, 480p) and one audio rendition.
#[derive(Clone, Debug)]
pub struct SyntheticResolver {
    delay: Duration,
}

impl Default for SyntheticResolver {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

impl SyntheticResolver {
    /// Create a generator with the given simulated latency
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Simulated latency
    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn generate(url: &str) -> MediaMetadata {
        let mut rng = rand::thread_rng();
        let portrait = rng.gen_bool(0.5);
        let id: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(7)
            .map(char::from)
            .collect::<String>()
            .to_ascii_lowercase();
        let avatar_seed: u32 = rng.gen_range(0..u32::MAX);

        let mut metadata = MediaMetadata {
            id,
            original_url: url.to_string(),
            title: SAMPLE_TITLE.to_string(),
            thumbnail_url: if portrait {
                PORTRAIT_THUMBNAIL
            } else {
                LANDSCAPE_THUMBNAIL
            }
            .to_string(),
            preview_url: SAMPLE_VIDEO.to_string(),
            duration: "0:45".to_string(),
            author: "@CreativeUser".to_string(),
            avatar_url: format!(
                "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
                avatar_seed
            ),
            aspect_ratio: if portrait {
                AspectRatio::Portrait
            } else {
                AspectRatio::Landscape
            },
            options: vec![
                DownloadOption::new("1", MediaKind::Video, "1080p")
                    .with_label("High Definition")
                    .with_size("24.5 MB")
                    .with_source_url(SAMPLE_VIDEO)
                    .best(),
                DownloadOption::new("2", MediaKind::Video, "720p")
                    .with_label("Standard Definition")
                    .with_size("12.1 MB")
                    .with_source_url(SAMPLE_VIDEO),
                DownloadOption::new("3", MediaKind::Video, "480p")
                    .with_label("Mobile Optimized")
                    .with_size("5.4 MB")
                    .with_source_url(SAMPLE_VIDEO),
                // Audio extraction needs the real service, so no source URL here.
                DownloadOption::new("4", MediaKind::Audio, "320kbps")
                    .with_label("Audio Only")
                    .with_size("3.2 MB"),
            ],
        };
        metadata.normalize_options();
        metadata
    }
}

#[async_trait]
impl MetadataResolver for SyntheticResolver {
    async fn resolve(&self, url: &str) -> Result<MediaMetadata, ResolutionError> {
        tokio::time::sleep(self.delay).await;

        if !is_supported_link(url) {
            tracing::debug!(url = %url, "synthetic generator rejected link");
            return Err(ResolutionError::invalid_url());
        }

        let metadata = Self::generate(url);
        tracing::info!(
            url = %url,
            id = %metadata.id,
            options = metadata.options.len(),
            "generated synthetic metadata"
        );
        Ok(metadata)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
