//! Fetch a post and download its best rendition
//!
//! This example demonstrates the core functionality of xstream-dl:
//! - Building a configuration (with environment overrides)
//! - Creating a session
//! - Subscribing to events
//! - Resolving a link and downloading the preferred rendition
//!
//! ```bash
//! cargo run --example fetch_post -- https://x.com/someone/status/1234567890
//! ```

use xstream_dl::config::DownloadConfig;
use xstream_dl::session::NO_DOWNLOADS_MESSAGE;
use xstream_dl::{Config, DownloadOutcome, Event, Session, View};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let link = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "https://x.com/someone/status/1234567890".to_string());

    // Build configuration; XSTREAM_API_BASE_URL / XSTREAM_ORIGIN take precedence
    let config = Config {
        download: DownloadConfig {
            download_dir: "downloads".into(),
            temp_dir: "temp".into(),
            ..Default::default()
        },
        ..Default::default()
    }
    .with_env_overrides();

    println!("Using API base URL {}", config.api_base_url());

    let session = Session::new(config)?;

    // Subscribe to events
    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::StateChanged { state } => println!("• state: {}", state),
                Event::Resolved { id, options } => {
                    println!("✓ Resolved post {} with {} option(s)", id, options)
                }
                Event::DownloadStarted { quality, .. } => println!("⬇ Downloading {}", quality),
                Event::DownloadSaved { path, .. } => println!("✓ Saved {}", path.display()),
                Event::DirectLinkOpened { url, .. } => println!("↪ Saved from {}", url),
                Event::Notification(n) => println!("✗ {}", n.message),
            }
        }
    });

    session.submit(&link).await?;

    match session.view().await {
        View::Ready { card } => {
            let meta = card.metadata();
            println!("{} by {} ({})", meta.title, meta.author, meta.duration);
            for option in card.options() {
                let marker = if option.is_best { "*" } else { " " };
                println!(
                    " {} [{}] {} {} {}",
                    marker,
                    option.id,
                    option.label,
                    option.media_kind,
                    option.size.as_deref().unwrap_or("")
                );
            }

            if let Some(best) = card.best_option() {
                let id = best.id.clone();
                match card.download(&id).await? {
                    DownloadOutcome::Saved { path } | DownloadOutcome::DirectLink { path, .. } => {
                        println!("Done: {}", path.display())
                    }
                    DownloadOutcome::Failed(n) => println!("Failed: {}", n.message),
                    DownloadOutcome::Busy => println!("Another download is in progress"),
                }
            }
        }
        View::NoDownloads { .. } => println!("{}", NO_DOWNLOADS_MESSAGE),
        View::Failed { message } => println!("Error: {}", message),
        View::Idle | View::Loading => {}
    }

    // Give the event printer a moment to drain
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    Ok(())
}
