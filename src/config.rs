//! Configuration types for xstream-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable that overrides [`ApiConfig::base_url`]
pub const ENV_API_BASE_URL: &str = "XSTREAM_API_BASE_URL";

/// Environment variable that sets [`ApiConfig::origin`]
pub const ENV_ORIGIN: &str = "XSTREAM_ORIGIN";

/// Endpoint used when neither an override nor a non-local origin is configured
pub const LOCAL_API_BASE_URL: &str = "http://localhost:8000";

/// Where the metadata and proxy services live
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Explicit base URL; takes precedence over everything else
    #[serde(default)]
    pub base_url: Option<String>,

    /// Origin the client is served from (e.g. "https://xstream.example")
    #[serde(default)]
    pub origin: Option<String>,
}

impl ApiConfig {
    /// Resolve the API base URL
    ///
    /// 1. A non-blank `base_url` override, trailing `/` stripped
    /// 2. `{origin}/api` when the origin is not a local development host
    /// 3. [`LOCAL_API_BASE_URL`]
    pub fn api_base_url(&self) -> String {
        if let Some(base) = non_blank(self.base_url.as_deref()) {
            return normalize(base).to_string();
        }

        match self.hosting_origin() {
            Some(origin) => format!("{}/api", normalize(origin)),
            None => LOCAL_API_BASE_URL.to_string(),
        }
    }

    /// The non-local origin the API is assumed to live under, when no override is set
    pub fn hosting_origin(&self) -> Option<&str> {
        if non_blank(self.base_url.as_deref()).is_some() {
            return None;
        }
        non_blank(self.origin.as_deref()).filter(|origin| !is_local_origin(origin))
    }

    /// Apply overrides from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = Some(base.trim().to_string());
        }
        if let Some(origin) = lookup(ENV_ORIGIN).filter(|v| !v.trim().is_empty()) {
            self.origin = Some(origin.trim().to_string());
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn normalize(url: &str) -> &str {
    url.strip_suffix('/').unwrap_or(url)
}

fn is_local_origin(origin: &str) -> bool {
    match url::Url::parse(origin) {
        Ok(parsed) => matches!(
            parsed.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]")
        ),
        Err(_) => origin.contains("localhost") || origin.contains("127.0.0.1"),
    }
}

/// Metadata resolution behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Bound on the remote metadata request (default: 15 seconds)
    #[serde(default = "default_resolve_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Ask the service to add an audio-only rendition (default: true)
    #[serde(default = "default_true")]
    pub include_mp3: bool,

    /// Fall back to the synthetic generator when the service is unreachable (default: true)
    #[serde(default = "default_true")]
    pub synthetic_fallback: bool,

    /// Simulated latency of the synthetic generator (default: 1500 ms)
    #[serde(default = "default_synthetic_delay", with = "duration_millis_serde")]
    pub synthetic_delay: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            timeout: default_resolve_timeout(),
            include_mp3: true,
            synthetic_fallback: true,
            synthetic_delay: default_synthetic_delay(),
        }
    }
}

/// File collision handling in the download directory
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCollisionAction {
    /// Append (1), (2), etc. to the filename (default)
    #[default]
    Rename,
    /// Overwrite the existing file
    Overwrite,
    /// Refuse to save
    Skip,
}

/// Delivery behavior (directories, collisions, proxy timeout)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Where saved files end up (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Where fetched blobs are staged before saving (default: "./temp")
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,

    /// Bound on a proxied or direct transfer (default: 300 seconds, None = unbounded)
    #[serde(
        default = "default_proxy_timeout",
        with = "optional_duration_serde"
    )]
    pub proxy_timeout: Option<Duration>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            temp_dir: default_temp_dir(),
            file_collision: FileCollisionAction::default(),
            proxy_timeout: default_proxy_timeout(),
        }
    }
}

/// Main configuration for a [`Session`](crate::Session)
///
/// - [`api`](ApiConfig) - service endpoint resolution
/// - [`resolver`](ResolverConfig) - timeout and fallback policy
/// - [`download`](DownloadConfig) - directories and transfer bounds
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service endpoints
    #[serde(default)]
    pub api: ApiConfig,

    /// Metadata resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Delivery settings
    #[serde(default)]
    pub download: DownloadConfig,
}

impl Config {
    /// Apply [`ENV_API_BASE_URL`] and [`ENV_ORIGIN`] from the process environment
    pub fn with_env_overrides(mut self) -> Self {
        self.api.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    /// Resolved API base URL
    pub fn api_base_url(&self) -> String {
        self.api.api_base_url()
    }

    /// Check the configuration for values that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.resolver.timeout.is_zero() {
            return Err(Error::Config {
                message: "resolver timeout must be greater than zero".to_string(),
                key: Some("resolver.timeout".to_string()),
            });
        }

        if self.download.proxy_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::Config {
                message: "proxy timeout must be greater than zero".to_string(),
                key: Some("download.proxy_timeout".to_string()),
            });
        }

        let base = self.api_base_url();
        url::Url::parse(&base).map_err(|e| Error::Config {
            message: format!("invalid API base URL '{}': {}", base, e),
            key: Some("api.base_url".to_string()),
        })?;

        Ok(())
    }
}

// Default value functions
fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_true() -> bool {
    true
}

fn default_resolve_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_synthetic_delay() -> Duration {
    Duration::from_millis(1500)
}

fn default_proxy_timeout() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Millisecond Duration serialization helper
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
