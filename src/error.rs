//! Error types for xstream-dl
//!
//! This module provides the error handling for the library, including:
//! - The resolution taxonomy surfaced to the request state machine
//! - Download failures recovered by the executor before they reach a notification
//! - Machine-readable error codes for each variant

use crate::types::RequestState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for xstream-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xstream-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Metadata resolution failed
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// Download-related error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// The request state machine does not accept this event in its current state
    #[error("cannot {event} while {from}")]
    InvalidTransition {
        /// State the machine was in
        from: RequestState,
        /// The rejected event (e.g., "submit", "reset")
        event: &'static str,
    },

    /// Option or resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Machine-readable error code
    pub fn code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Resolution(e) => e.code(),
            Error::Download(e) => e.code(),
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::NotFound(_) => "not_found",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

/// Default message shown when a failure carries no detail of its own
pub const DEFAULT_RESOLUTION_MESSAGE: &str = "Failed to fetch video";

/// Message used when the synthetic generator rejects a link
pub const INVALID_URL_MESSAGE: &str = "Invalid URL. Please paste a valid X (Twitter) link.";

/// Errors a metadata resolver may return
///
/// The display text of each variant is what the request state machine stores as
/// its error message, so it is written for end users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// Input does not look like a supported source link
    #[error("{message}")]
    InvalidUrl {
        /// User-facing explanation
        message: String,
    },

    /// The service could not be reached (network error, timeout)
    #[error("{reason}")]
    Unreachable {
        /// What went wrong while contacting the service
        reason: String,
    },

    /// The service was reached but reported a failure
    #[error("{detail}")]
    ServerError {
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// The `detail` field of the failure body, or a generic default
        detail: String,
    },
}

impl ResolutionError {
    /// Create an `invalid_url` error with the standard message
    pub fn invalid_url() -> Self {
        Self::InvalidUrl {
            message: INVALID_URL_MESSAGE.to_string(),
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ResolutionError::InvalidUrl { .. } => "invalid_url",
            ResolutionError::Unreachable { .. } => "unreachable",
            ResolutionError::ServerError { .. } => "server_error",
        }
    }

    /// Message suitable for inline display
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            DEFAULT_RESOLUTION_MESSAGE.to_string()
        } else {
            message
        }
    }
}

/// Download-related errors
///
/// These never reach the caller of [`DownloadCard::download`](crate::session::DownloadCard::download)
/// directly; the executor turns them into notifications.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The option has no source URL to fetch from
    #[error("no download URL available for {quality}")]
    NoSourceUrl {
        /// Quality label of the option
        quality: String,
    },

    /// The proxy service answered with a non-success status
    #[error("proxy returned status {status}: {detail}")]
    Proxy {
        /// HTTP status code
        status: u16,
        /// The `detail` field of the failure body, or a generic default
        detail: String,
    },

    /// The transfer itself failed (connect, timeout, body read)
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// The file could not be written by the sink
    #[error("save failed: {0}")]
    Save(String),

    /// The direct-link fallback failed
    #[error("direct link failed for {url}: {reason}")]
    DirectLink {
        /// The raw source URL that was attempted
        url: String,
        /// The reason the attempt failed
        reason: String,
    },
}

impl DownloadError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            DownloadError::NoSourceUrl { .. } => "no_url_for_option",
            DownloadError::Proxy { .. } => "remote_failure",
            DownloadError::Transfer(_) => "network_error",
            DownloadError::Save(_) => "save_failed",
            DownloadError::DirectLink { .. } => "direct_link_failed",
        }
    }
}

/// Failure body returned by both remote services
///
/// ```json
/// { "detail": "Extraction failed: unsupported URL" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceErrorBody {
    /// Human-readable failure description
    #[serde(default)]
    pub detail: Option<String>,
}

impl ServiceErrorBody {
    /// Parse a failure body, tolerating empty or non-JSON payloads
    pub fn parse(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// The detail text, or `fallback` when absent or blank
    pub fn detail_or(self, fallback: &str) -> String {
        self.detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}
