use super::*;
use crate::config::Config;
use crate::types::MediaKind;
use async_trait::async_trait;
use std::sync::Mutex;
use tempfile::{TempDir, tempdir};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sink that records every call and can be told to fail direct saves or hang on save
#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<String>>,
    fail_direct: bool,
    stall_save: bool,
}

impl RecordingSink {
    fn failing_direct() -> Self {
        Self {
            fail_direct: true,
            ..Default::default()
        }
    }

    fn stalling_save() -> Self {
        Self {
            stall_save: true,
            ..Default::default()
        }
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSink for RecordingSink {
    async fn create_object_url(&self, bytes: &[u8]) -> Result<ObjectUrl> {
        self.record(format!("create:{}", bytes.len()));
        Ok(ObjectUrl {
            url: "blob:test".into(),
            local_path: None,
        })
    }

    async fn save(&self, object: &ObjectUrl, file_name: &str) -> Result<PathBuf> {
        self.record(format!("save:{}:{}", object.url, file_name));
        if self.stall_save {
            std::future::pending::<()>().await;
        }
        Ok(PathBuf::from(file_name))
    }

    async fn revoke(&self, object: ObjectUrl) -> Result<()> {
        self.record(format!("revoke:{}", object.url));
        Ok(())
    }

    async fn save_direct(&self, source_url: &str, file_name: &str) -> Result<PathBuf> {
        self.record(format!("direct:{}:{}", source_url, file_name));
        if self.fail_direct {
            return Err(Error::Download(DownloadError::DirectLink {
                url: source_url.into(),
                reason: "blocked".into(),
            }));
        }
        Ok(PathBuf::from(file_name))
    }

    fn name(&self) -> &str {
        "recording"
    }
}

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.api.base_url = Some(server.uri());
    config
}

fn executor_with(
    config: &Config,
    sink: Arc<dyn FileSink>,
) -> (DownloadExecutor, broadcast::Receiver<Event>) {
    let (event_tx, event_rx) = broadcast::channel(64);
    let executor = DownloadExecutor::new(
        reqwest::Client::new(),
        config.api_base_url(),
        &config.download,
        sink,
        event_tx,
    );
    (executor, event_rx)
}

fn video(url: &str) -> DownloadOption {
    DownloadOption::new("1", MediaKind::Video, "720p").with_source_url(url)
}

fn audio(url: &str) -> DownloadOption {
    DownloadOption::new("2", MediaKind::Audio, "320kbps").with_source_url(url)
}

fn notifications(rx: &mut broadcast::Receiver<Event>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let Event::Notification(n) = event {
            out.push(n);
        }
    }
    out
}

#[test]
fn test_latch_is_exclusive() {
    let latch = DownloadLatch::default();
    let guard = latch.try_acquire().expect("first acquire");
    assert!(latch.is_held());
    assert!(latch.try_acquire().is_none());

    drop(guard);
    assert!(!latch.is_held());
    assert!(latch.try_acquire().is_some());
}

#[test]
fn test_proxy_url_is_percent_encoded() {
    let mut config = Config::default();
    config.api.base_url = Some("https://api.example.com".into());
    let (executor, _rx) = executor_with(&config, Arc::new(RecordingSink::default()));

    assert_eq!(
        executor.proxy_url("https://cdn.example/a.mp4?tag=12"),
        "https://api.example.com/api/download?url=https%3A%2F%2Fcdn.example%2Fa.mp4%3Ftag%3D12"
    );
}

#[tokio::test]
async fn test_proxy_success_saves_named_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .and(query_param("url", "https://cdn.example/a.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let (executor, mut rx) = executor_with(&config_for(&server), sink.clone());

    let outcome = executor
        .download(&video("https://cdn.example/a.mp4"), "Wow!! Check THIS out #1")
        .await;

    assert_eq!(
        outcome,
        DownloadOutcome::Saved {
            path: PathBuf::from("wow_check_this_out_1_720p.mp4")
        }
    );
    assert_eq!(
        sink.calls(),
        vec![
            "create:11".to_string(),
            "save:blob:test:wow_check_this_out_1_720p.mp4".to_string(),
            "revoke:blob:test".to_string(),
        ]
    );
    assert!(notifications(&mut rx).is_empty(), "success shows no notification");
    assert!(!executor.is_busy());
}

#[tokio::test]
async fn test_missing_url_notifies_without_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let (executor, mut rx) = executor_with(&config_for(&server), sink.clone());

    let option = DownloadOption::new("4", MediaKind::Audio, "320kbps");
    let outcome = executor.download(&option, "clip").await;

    let DownloadOutcome::Failed(notification) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert_eq!(notification.kind, NotificationKind::MissingUrl);
    assert!(sink.calls().is_empty());
    assert_eq!(notifications(&mut rx).len(), 1);
    assert!(!executor.is_busy());
}

#[tokio::test]
async fn test_video_proxy_failure_falls_back_to_direct_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "detail": "Failed to download video"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let (executor, mut rx) = executor_with(&config_for(&server), sink.clone());

    let source = "https://cdn.example/a.mp4?tag=12&x=1";
    let outcome = executor.download(&video(source), "clip").await;

    assert_eq!(
        outcome,
        DownloadOutcome::DirectLink {
            url: source.to_string(),
            path: PathBuf::from("clip_720p.mp4"),
        }
    );
    assert_eq!(
        sink.calls(),
        vec![format!("direct:{}:clip_720p.mp4", source)],
        "direct attempt uses the unmodified source URL"
    );
    assert!(notifications(&mut rx).is_empty());
}

#[tokio::test]
async fn test_audio_proxy_failure_reports_conversion_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .and(query_param("url", "mp3:https://x.com/user/status/1"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let (executor, mut rx) = executor_with(&config_for(&server), sink.clone());

    let outcome = executor
        .download(&audio("mp3:https://x.com/user/status/1"), "clip")
        .await;

    let DownloadOutcome::Failed(notification) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert_eq!(notification.kind, NotificationKind::ConversionFailed);
    assert!(
        !sink.calls().iter().any(|c| c.starts_with("direct:")),
        "audio never tries a direct link"
    );

    let sent = notifications(&mut rx);
    assert_eq!(sent.len(), 1);
    assert!(sent[0].message.starts_with("MP3 conversion failed"));
}

#[tokio::test]
async fn test_total_failure_sends_one_notification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::failing_direct());
    let (executor, mut rx) = executor_with(&config_for(&server), sink.clone());

    let outcome = executor
        .download(&video("https://cdn.example/a.mp4"), "clip")
        .await;

    let DownloadOutcome::Failed(notification) = outcome else {
        panic!("expected failure, got {:?}", outcome);
    };
    assert_eq!(notification.kind, NotificationKind::DownloadFailed);
    assert!(notification.message.contains("Save video as"));
    assert_eq!(notifications(&mut rx).len(), 1);
    assert!(!executor.is_busy(), "latch released after total failure");
}

#[tokio::test]
async fn test_second_download_rejected_while_in_flight() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"slow".to_vec())
                .set_delay(std::time::Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let (executor, _rx) = executor_with(&config_for(&server), sink.clone());

    let first = {
        let executor = executor.clone();
        tokio::spawn(async move {
            executor
                .download(&video("https://cdn.example/a.mp4"), "clip")
                .await
        })
    };

    while !executor.is_busy() {
        tokio::task::yield_now().await;
    }

    let second = executor
        .download(&video("https://cdn.example/b.mp4"), "clip")
        .await;
    assert_eq!(second, DownloadOutcome::Busy);

    let first = first.await.unwrap();
    assert!(matches!(first, DownloadOutcome::Saved { .. }));
    assert!(!executor.is_busy());
}

#[tokio::test]
async fn test_proxy_timeout_releases_latch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"stalled".to_vec())
                .set_delay(std::time::Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.download.proxy_timeout = Some(std::time::Duration::from_millis(100));
    let sink = Arc::new(RecordingSink::failing_direct());
    let (executor, _rx) = executor_with(&config, sink);

    let outcome = executor
        .download(&video("https://cdn.example/a.mp4"), "clip")
        .await;

    assert!(matches!(outcome, DownloadOutcome::Failed(_)));
    assert!(!executor.is_busy());
}

#[tokio::test]
async fn test_abandoned_download_revokes_staged_blob() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"frames".to_vec()))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::stalling_save());
    let (executor, _rx) = executor_with(&config_for(&server), sink.clone());

    let abandoned = tokio::time::timeout(
        std::time::Duration::from_millis(200),
        executor.download(&video("https://cdn.example/a.mp4"), "clip"),
    )
    .await;
    assert!(abandoned.is_err(), "save should still be pending");
    assert!(!executor.is_busy());

    let revoked = tokio::time::timeout(std::time::Duration::from_secs(1), async {
        while !sink.calls().contains(&"revoke:blob:test".to_string()) {
            tokio::task::yield_now().await;
        }
    })
    .await;
    assert!(revoked.is_ok(), "calls: {:?}", sink.calls());
}

// --- DiskSink ---

fn disk_sink(dir: &TempDir) -> DiskSink {
    let mut config = Config::default();
    config.download.download_dir = dir.path().join("downloads");
    config.download.temp_dir = dir.path().join("temp");
    DiskSink::new(reqwest::Client::new(), &config.download)
}

#[tokio::test]
async fn test_disk_sink_stage_save_revoke() {
    let dir = tempdir().unwrap();
    let sink = disk_sink(&dir);

    let object = sink.create_object_url(b"payload").await.unwrap();
    assert!(object.url.starts_with("blob:"));
    let staged = object.local_path.clone().unwrap();
    assert!(staged.exists());

    let saved = sink.save(&object, "clip_720p.mp4").await.unwrap();
    assert_eq!(saved, dir.path().join("downloads").join("clip_720p.mp4"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"payload");

    sink.revoke(object).await.unwrap();
    assert!(!staged.exists());
}

#[tokio::test]
async fn test_disk_sink_revoke_unsaved_blob() {
    let dir = tempdir().unwrap();
    let sink = disk_sink(&dir);

    let object = sink.create_object_url(b"payload").await.unwrap();
    let staged = object.local_path.clone().unwrap();

    sink.revoke(object).await.unwrap();
    assert!(!staged.exists());
}

#[tokio::test]
async fn test_disk_sink_renames_on_collision() {
    let dir = tempdir().unwrap();
    let sink = disk_sink(&dir);

    let first = sink.create_object_url(b"one").await.unwrap();
    let first_path = sink.save(&first, "clip.mp4").await.unwrap();
    let second = sink.create_object_url(b"two").await.unwrap();
    let second_path = sink.save(&second, "clip.mp4").await.unwrap();

    assert_ne!(first_path, second_path);
    assert_eq!(second_path.file_name().unwrap(), "clip (1).mp4");
}

#[tokio::test]
async fn test_disk_sink_direct_save() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/a.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"direct".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let sink = disk_sink(&dir);

    let saved = sink
        .save_direct(&format!("{}/media/a.mp4", server.uri()), "clip_720p.mp4")
        .await
        .unwrap();
    assert_eq!(std::fs::read(saved).unwrap(), b"direct");

    let err = sink
        .save_direct(&format!("{}/media/gone.mp4", server.uri()), "gone.mp4")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "direct_link_failed");
}
