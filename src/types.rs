//! Core types for xstream-dl
//!
//! The option model shared by the resolver, the download executor and the
//! request state machine, plus the events a session broadcasts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

/// Prefix the metadata service puts on a source URL to request audio extraction
///
/// Only consulted once, while deriving [`MediaKind`] at ingestion. The URL itself is
/// kept verbatim because the proxy service relies on the prefix.
pub const AUDIO_URL_MARKER: &str = "mp3:";

/// Kind of media a rendition delivers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video with audio
    #[default]
    Video,
    /// Audio only
    Audio,
}

impl MediaKind {
    /// Derive the kind of a rendition that does not state it explicitly
    ///
    /// The audio marker on the source URL is checked before the extension hint.
    pub fn derive(source_url: Option<&str>, extension: Option<&str>) -> Self {
        if source_url.is_some_and(|url| url.starts_with(AUDIO_URL_MARKER)) {
            return MediaKind::Audio;
        }
        match extension.map(|e| e.trim().to_ascii_lowercase()) {
            Some(ext) if matches!(ext.as_str(), "mp3" | "m4a" | "aac" | "opus") => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }

    /// File extension used when saving this kind
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }

    /// Whether this is an audio-only rendition
    pub fn is_audio(&self) -> bool {
        matches!(self, MediaKind::Audio)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Display aspect ratio of a media item
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Landscape
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// Portrait
    #[serde(rename = "9:16")]
    Portrait,
    /// Square
    #[serde(rename = "1:1")]
    Square,
}

/// One retrievable rendition of a resolved media item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOption {
    /// Unique among the options of one result
    pub id: String,
    /// Human-readable description
    pub label: String,
    /// Video or audio
    pub media_kind: MediaKind,
    /// Display quality (e.g. "1080p", "320kbps"), never parsed
    pub quality: String,
    /// Display size, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Preferred rendition hint
    #[serde(default)]
    pub is_best: bool,
    /// Where the executor fetches from; absent means the option cannot be downloaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl DownloadOption {
    /// Create a rendition; the label is derived from kind and quality
    pub fn new(id: impl Into<String>, media_kind: MediaKind, quality: impl Into<String>) -> Self {
        let quality = quality.into();
        Self {
            id: id.into(),
            label: default_label(media_kind, &quality),
            media_kind,
            quality,
            size: None,
            is_best: false,
            source_url: None,
        }
    }

    /// Set the source URL
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Set the human-readable label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the display size
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Flag this option as the preferred rendition
    pub fn best(mut self) -> Self {
        self.is_best = true;
        self
    }

    /// Source URL, if present and not blank
    pub fn usable_source_url(&self) -> Option<&str> {
        self.source_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

pub(crate) fn default_label(kind: MediaKind, quality: &str) -> String {
    match kind {
        MediaKind::Video => format!("Video {}", quality),
        MediaKind::Audio => format!("Audio {}", quality),
    }
}

/// One resolved media item
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    /// Identifier assigned by the resolver
    pub id: String,
    /// The link the user submitted
    pub original_url: String,
    /// Title, basis of saved file names
    pub title: String,
    /// Thumbnail image
    #[serde(default)]
    pub thumbnail_url: String,
    /// Playable preview clip
    #[serde(default)]
    pub preview_url: String,
    /// Display duration (e.g. "0:45")
    #[serde(default)]
    pub duration: String,
    /// Author handle
    #[serde(default)]
    pub author: String,
    /// Author avatar image
    #[serde(default)]
    pub avatar_url: String,
    /// Display aspect ratio
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Renditions in resolution order
    #[serde(default)]
    pub options: Vec<DownloadOption>,
}

impl MediaMetadata {
    /// Enforce the option-list invariants
    ///
    /// Missing or repeated ids are replaced by positional ids (`"1"`, `"2"`, ...), and when no
    /// option is flagged best the first video option is. Order is never changed.
    pub fn normalize_options(&mut self) {
        let mut seen = HashSet::new();
        for (index, option) in self.options.iter_mut().enumerate() {
            if option.id.trim().is_empty() || !seen.insert(option.id.clone()) {
                let mut candidate = (index + 1).to_string();
                while seen.contains(&candidate) {
                    candidate = format!("{}-{}", candidate, index + 1);
                }
                seen.insert(candidate.clone());
                option.id = candidate;
            }
            if option.label.trim().is_empty() {
                option.label = default_label(option.media_kind, &option.quality);
            }
        }

        if !self.options.iter().any(|o| o.is_best)
            && let Some(first_video) = self.options.iter_mut().find(|o| !o.media_kind.is_audio())
        {
            first_video.is_best = true;
        }
    }

    /// Whether there is anything to download
    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// Look up an option by id
    pub fn option(&self, id: &str) -> Option<&DownloadOption> {
        self.options.iter().find(|o| o.id == id)
    }

    /// The preferred rendition: the flagged one, else the first non-audio option
    pub fn best_option(&self) -> Option<&DownloadOption> {
        self.options
            .iter()
            .find(|o| o.is_best)
            .or_else(|| self.options.iter().find(|o| !o.media_kind.is_audio()))
    }

    /// URL to play as a preview: the first video rendition, else `preview_url`
    pub fn preview_source(&self) -> Option<&str> {
        self.options
            .iter()
            .filter(|o| !o.media_kind.is_audio())
            .find_map(|o| o.usable_source_url())
            .or_else(|| Some(self.preview_url.as_str()).filter(|u| !u.is_empty()))
    }
}

/// Lifecycle of a metadata request
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    /// Nothing submitted yet, or reset
    #[default]
    Idle,
    /// Resolution in flight
    Loading,
    /// A result is being shown
    Success,
    /// The last resolution failed
    Error,
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestState::Idle => write!(f, "idle"),
            RequestState::Loading => write!(f, "loading"),
            RequestState::Success => write!(f, "success"),
            RequestState::Error => write!(f, "error"),
        }
    }
}

/// Why a notification was raised
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The chosen option has no source URL
    MissingUrl,
    /// Audio extraction through the proxy failed
    ConversionFailed,
    /// Every delivery path for a video failed
    DownloadFailed,
}

/// A user-facing message about a failed download attempt
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Category of the failure
    pub kind: NotificationKind,
    /// Text to show
    pub message: String,
    /// Option the attempt was for
    pub option_id: String,
    /// When it was raised
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Build the notification for `kind`
    pub fn new(kind: NotificationKind, option: &DownloadOption) -> Self {
        let message = match kind {
            NotificationKind::MissingUrl => {
                format!("No download URL available for {}", option.quality)
            }
            NotificationKind::ConversionFailed => {
                "MP3 conversion failed. This may take a moment. Please try again.".to_string()
            }
            NotificationKind::DownloadFailed => "Download failed. Please try right-clicking on \
                 the video and selecting \"Save video as...\""
                .to_string(),
        };
        Self {
            kind,
            message,
            option_id: option.id.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Event emitted by a session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The request state machine moved
    StateChanged {
        /// New state
        state: RequestState,
    },
    /// A resolution produced a result
    Resolved {
        /// Metadata id
        id: String,
        /// Number of renditions
        options: usize,
    },
    /// A download attempt began
    DownloadStarted {
        /// Option id
        option_id: String,
        /// Option quality
        quality: String,
    },
    /// The proxied file was saved
    DownloadSaved {
        /// Option id
        option_id: String,
        /// Where the file ended up
        path: PathBuf,
    },
    /// The direct-link fallback delivered the file
    DirectLinkOpened {
        /// Option id
        option_id: String,
        /// The raw source URL
        url: String,
    },
    /// A download attempt failed
    Notification(Notification),
}
