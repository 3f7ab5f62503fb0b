//! Custom test assertions for integration tests

use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;
use xstream_dl::{Event, RequestState};

/// Collect events until `stop` matches one, or the timeout elapses
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    stop: F,
) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut collected = Vec::new();
    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let done = stop(&event);
            collected.push(event);
            if done {
                break;
            }
        }
    })
    .await;
    collected
}

/// State transitions in the order they were emitted
pub fn state_sequence(events: &[Event]) -> Vec<RequestState> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::StateChanged { state } => Some(*state),
            _ => None,
        })
        .collect()
}

/// Assert that a file exists and holds exactly `expected`
pub fn assert_file_contents(path: &Path, expected: &[u8]) {
    let actual = std::fs::read(path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e));
    assert_eq!(
        actual.len(),
        expected.len(),
        "size mismatch for {}",
        path.display()
    );
    assert!(actual == expected, "content mismatch for {}", path.display());
}

/// Assert that a directory holds no files
pub fn assert_dir_empty(path: &Path) {
    if !path.exists() {
        return;
    }
    let entries: Vec<_> = std::fs::read_dir(path)
        .unwrap_or_else(|e| panic!("failed to list {}: {}", path.display(), e))
        .collect();
    assert!(entries.is_empty(), "{} is not empty", path.display());
}
