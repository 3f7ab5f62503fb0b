//! Sessions: the request state machine wired to a resolver and a download executor.
//!
//! A [`Session`] is an explicit context object. It owns one [`RequestMachine`],
//! the active result and the [`DownloadCard`] built for it. Sessions are cheap to
//! clone (all fields are shared) and independent of each other, so several can run
//! side by side.
//!
//! - [`machine`] - the pure lifecycle (`idle → loading → success | error`)

mod machine;


pub use machine::RequestMachine;

use crate::config::Config;
use crate::downloader::{DiskSink, DownloadExecutor, DownloadOutcome, FileSink};
use crate::error::{Error, Result};
use crate::resolver::{FallbackResolver, MetadataResolver, RemoteResolver, SyntheticResolver};
use crate::types::{DownloadOption, Event, MediaMetadata, RequestState};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

/// Message shown for a result without renditions
pub const NO_DOWNLOADS_MESSAGE: &str = "No download links available";

/// Capacity of the event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A resolved result together with the executor that delivers its options
///
/// Clones share one latch: at most one download runs per card.
#[derive(Clone)]
pub struct DownloadCard {
    metadata: Arc<MediaMetadata>,
    executor: DownloadExecutor,
}

impl DownloadCard {
    /// Build a card for `metadata`
    pub fn new(metadata: Arc<MediaMetadata>, executor: DownloadExecutor) -> Self {
        Self { metadata, executor }
    }

    /// The result shown on this card
    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    /// Renditions in display order
    pub fn options(&self) -> &[DownloadOption] {
        &self.metadata.options
    }

    /// Whether there is anything to download
    pub fn has_options(&self) -> bool {
        self.metadata.has_options()
    }

    /// The preferred rendition
    pub fn best_option(&self) -> Option<&DownloadOption> {
        self.metadata.best_option()
    }

    /// Whether a download is in flight; option buttons should be disabled while true
    pub fn is_busy(&self) -> bool {
        self.executor.is_busy()
    }

    /// Download the option with `option_id`
    ///
    /// # Errors
    ///
    /// Only [`Error::NotFound`] when no option has that id; delivery failures are
    /// reported through [`DownloadOutcome::Failed`] and a notification event.
    pub async fn download(&self, option_id: &str) -> Result<DownloadOutcome> {
        let option = self
            .metadata
            .option(option_id)
            .ok_or_else(|| Error::NotFound(format!("option {}", option_id)))?;
        Ok(self.executor.download(option, &self.metadata.title).await)
    }
}

impl std::fmt::Debug for DownloadCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCard")
            .field("metadata_id", &self.metadata.id)
            .field("options", &self.metadata.options.len())
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// What the client should render
#[derive(Debug)]
pub enum View {
    /// Waiting for input
    Idle,
    /// Resolution in flight
    Loading,
    /// The last resolution failed
    Failed {
        /// Error text to show inline
        message: String,
    },
    /// Resolved, but nothing can be downloaded
    NoDownloads {
        /// The empty result
        card: DownloadCard,
    },
    /// Resolved with renditions
    Ready {
        /// The result and its executor
        card: DownloadCard,
    },
}

struct SessionState {
    machine: RequestMachine,
    card: Option<DownloadCard>,
}

/// One user's request context
#[derive(Clone)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
    resolver: Arc<dyn MetadataResolver>,
    sink: Arc<dyn FileSink>,
    client: reqwest::Client,
    config: Arc<Config>,
    api_base_url: Arc<str>,
    event_tx: broadcast::Sender<Event>,
}

impl Session {
    /// Create a session with the standard components
    ///
    /// Resolution goes to the metadata service and, unless disabled, falls back to the
    /// synthetic generator. Files are written by a [`DiskSink`].
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let api_base_url = resolve_api_base_url(&config);
        let client = reqwest::Client::builder().build()?;
        let remote = RemoteResolver::new(client.clone(), &*api_base_url)
            .with_timeout(config.resolver.timeout)
            .with_include_mp3(config.resolver.include_mp3);
        let resolver: Arc<dyn MetadataResolver> = if config.resolver.synthetic_fallback {
            Arc::new(FallbackResolver::new(
                remote,
                SyntheticResolver::new(config.resolver.synthetic_delay),
            ))
        } else {
            Arc::new(remote)
        };
        let sink = Arc::new(DiskSink::new(client.clone(), &config.download));

        Ok(Self::assemble(config, api_base_url, client, resolver, sink))
    }

    /// Create a session from explicit parts
    pub fn with_components(
        config: Config,
        client: reqwest::Client,
        resolver: Arc<dyn MetadataResolver>,
        sink: Arc<dyn FileSink>,
    ) -> Self {
        let api_base_url = resolve_api_base_url(&config);
        Self::assemble(config, api_base_url, client, resolver, sink)
    }

    fn assemble(
        config: Config,
        api_base_url: Arc<str>,
        client: reqwest::Client,
        resolver: Arc<dyn MetadataResolver>,
        sink: Arc<dyn FileSink>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(SessionState {
                machine: RequestMachine::new(),
                card: None,
            })),
            resolver,
            sink,
            client,
            config: Arc::new(config),
            api_base_url,
            event_tx,
        }
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Service base URL, resolved once when the session was created
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Current request state
    pub async fn state(&self) -> RequestState {
        self.state.lock().await.machine.state()
    }

    /// The stored error message, if the last resolution failed
    pub async fn error(&self) -> Option<String> {
        self.state.lock().await.machine.error().map(str::to_string)
    }

    /// The active result
    pub async fn metadata(&self) -> Option<Arc<MediaMetadata>> {
        self.state.lock().await.machine.metadata().cloned()
    }

    /// The card for the active result
    pub async fn card(&self) -> Option<DownloadCard> {
        self.state.lock().await.card.clone()
    }

    /// What to render right now
    pub async fn view(&self) -> View {
        let state = self.state.lock().await;
        match (state.machine.state(), &state.card) {
            (RequestState::Idle, _) => View::Idle,
            (RequestState::Loading, _) => View::Loading,
            (RequestState::Error, _) => View::Failed {
                message: state
                    .machine
                    .error()
                    .unwrap_or(crate::error::DEFAULT_RESOLUTION_MESSAGE)
                    .to_string(),
            },
            (RequestState::Success, Some(card)) if card.has_options() => View::Ready {
                card: card.clone(),
            },
            (RequestState::Success, Some(card)) => View::NoDownloads { card: card.clone() },
            (RequestState::Success, None) => View::Idle,
        }
    }

    /// Submit a link and wait for its resolution
    ///
    /// Moves to `loading` before the resolver is called, then to `success` or `error`.
    /// Blank input changes nothing and returns the current state.
    ///
    /// The resolution runs on its own task: dropping the returned future stops the
    /// wait, not the resolution, and the session still settles in `success` or `error`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] when a resolution is in flight or a result
    /// is being shown (reset first). Resolution failures are not errors here; they
    /// land in the `error` state.
    pub async fn submit(&self, raw_url: &str) -> Result<RequestState> {
        let url = {
            let mut state = self.state.lock().await;
            match state.machine.submit(raw_url)? {
                Some(url) => {
                    state.card = None;
                    url
                }
                None => {
                    tracing::debug!("ignoring blank submission");
                    return Ok(state.machine.state());
                }
            }
        };
        self.emit_state(RequestState::Loading);
        tracing::info!(url = %url, resolver = self.resolver.name(), "resolving link");

        let session = self.clone();
        let task = tokio::spawn(async move { session.complete(url).await });
        match task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "resolution task failed");
                self.abandon().await
            }
        }
    }

    /// Run the resolver and record its outcome
    async fn complete(&self, url: String) -> Result<RequestState> {
        let result = self.resolver.resolve(&url).await;

        let next = {
            let mut state = self.state.lock().await;
            match result {
                Ok(metadata) => {
                    let metadata = state.machine.resolve_ok(metadata)?;
                    let executor = DownloadExecutor::new(
                        self.client.clone(),
                        &*self.api_base_url,
                        &self.config.download,
                        self.sink.clone(),
                        self.event_tx.clone(),
                    );
                    state.card = Some(DownloadCard::new(metadata.clone(), executor));

                    tracing::info!(
                        url = %url,
                        id = %metadata.id,
                        options = metadata.options.len(),
                        "link resolved"
                    );
                    self.event_tx
                        .send(Event::Resolved {
                            id: metadata.id.clone(),
                            options: metadata.options.len(),
                        })
                        .ok();
                    RequestState::Success
                }
                Err(e) => {
                    tracing::info!(url = %url, code = e.code(), error = %e, "link could not be resolved");
                    state.machine.resolve_fail(e.user_message())?;
                    RequestState::Error
                }
            }
        };

        self.emit_state(next);
        Ok(next)
    }

    /// Fail a resolution whose task died without recording an outcome
    async fn abandon(&self) -> Result<RequestState> {
        {
            let mut state = self.state.lock().await;
            if state.machine.state() != RequestState::Loading {
                return Ok(state.machine.state());
            }
            state
                .machine
                .resolve_fail(crate::error::DEFAULT_RESOLUTION_MESSAGE)?;
        }
        self.emit_state(RequestState::Error);
        Ok(RequestState::Error)
    }

    /// Clear the result or error and return to `idle`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] while a resolution is in flight.
    pub async fn reset(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            let previous = state.machine.state();
            state.machine.reset()?;
            state.card = None;
            if previous == RequestState::Idle {
                return Ok(());
            }
        }
        tracing::debug!("session reset");
        self.emit_state(RequestState::Idle);
        Ok(())
    }

    fn emit_state(&self, state: RequestState) {
        self.event_tx.send(Event::StateChanged { state }).ok();
    }
}

fn resolve_api_base_url(config: &Config) -> Arc<str> {
    if let Some(origin) = config.api.hosting_origin() {
        tracing::warn!(
            origin = %origin,
            "no API base URL configured, assuming the API lives under the origin"
        );
    }
    Arc::from(config.api_base_url())
}
