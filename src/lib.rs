//! # xstream-dl
//!
//! Resolve X (Twitter) post links into downloadable media renditions and deliver
//! the chosen rendition as a file.
//!
//! ## Design Philosophy
//!
//! xstream-dl is designed to be:
//! - **Service-first with a fallback** - Metadata comes from a remote service; when
//!   that fails, a synthetic generator keeps the flow usable
//! - **Explicit context** - Each [`Session`] owns its state; there are no globals
//! - **Event-driven** - Consumers subscribe to events, no polling required
//! - **Pluggable at the edges** - Resolvers and file sinks are traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use xstream_dl::{Config, DownloadOutcome, Session, View};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(Config::default().with_env_overrides())?;
//!
//!     // Subscribe to events
//!     let mut events = session.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     session.submit("https://x.com/someone/status/1234567890").await?;
//!
//!     if let View::Ready { card } = session.view().await {
//!         if let Some(best) = card.best_option() {
//!             let id = best.id.clone();
//!             if let DownloadOutcome::Saved { path } = card.download(&id).await? {
//!                 println!("saved to {}", path.display());
//!             }
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download executor and file sinks
pub mod downloader;
/// Error types
pub mod error;
/// Metadata resolvers
pub mod resolver;
/// Request sessions and result cards
pub mod session;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{ApiConfig, Config, DownloadConfig, FileCollisionAction, ResolverConfig};
pub use downloader::{DiskSink, DownloadExecutor, DownloadOutcome, FileSink, ObjectUrl};
pub use error::{DownloadError, Error, ResolutionError, Result};
pub use resolver::{
    FallbackResolver, MetadataResolver, RemoteResolver, SyntheticResolver, is_supported_link,
};
pub use session::{DownloadCard, RequestMachine, Session, View};
pub use types::{
    AspectRatio, DownloadOption, Event, MediaKind, MediaMetadata, Notification, NotificationKind,
    RequestState,
};
