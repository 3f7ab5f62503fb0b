//! Test configuration helpers for building sessions against a mock service

use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;
use xstream_dl::config::{ApiConfig, DownloadConfig, ResolverConfig};
use xstream_dl::{Config, Session};

/// Base URL nothing listens on (discard port)
pub const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:9";

/// Config with downloads and staging inside `temp_dir`
pub fn config_with_base(base_url: &str, temp_dir: &TempDir) -> Config {
    Config {
        api: ApiConfig {
            base_url: Some(base_url.to_string()),
            origin: None,
        },
        resolver: ResolverConfig {
            timeout: Duration::from_secs(5),
            synthetic_delay: Duration::from_millis(20),
            ..Default::default()
        },
        download: DownloadConfig {
            download_dir: temp_dir.path().join("downloads"),
            temp_dir: temp_dir.path().join("temp"),
            proxy_timeout: Some(Duration::from_secs(5)),
            ..Default::default()
        },
    }
}

/// Create a session talking to `server`
///
/// Returns the session and temp directory (keep temp_dir alive for test duration)
pub fn create_mock_session(server: &MockServer) -> (Session, TempDir) {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_with_base(&server.uri(), &temp_dir);
    let session = Session::new(config).expect("failed to create session");
    (session, temp_dir)
}

/// Create a session whose service cannot be reached
pub fn create_offline_session() -> (Session, TempDir) {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = config_with_base(UNREACHABLE_BASE_URL, &temp_dir);
    let session = Session::new(config).expect("failed to create session");
    (session, temp_dir)
}
