//! The request lifecycle as a pure state machine.

use crate::error::{Error, Result};
use crate::types::{MediaMetadata, RequestState};
use std::sync::Arc;

/// Request lifecycle: `idle → loading → success | error`, back to `idle` on reset
///
/// Holds at most one result and one error message. Transitions that the current
/// state does not allow return [`Error::InvalidTransition`] and change nothing.
#[derive(Clone, Debug, Default)]
pub struct RequestMachine {
    state: RequestState,
    metadata: Option<Arc<MediaMetadata>>,
    error: Option<String>,
}

impl RequestMachine {
    /// A machine in the idle state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// The active result, present only in `success`
    pub fn metadata(&self) -> Option<&Arc<MediaMetadata>> {
        self.metadata.as_ref()
    }

    /// The stored error message, present only in `error`
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Submit a link
    ///
    /// Returns the trimmed link when the machine moved to `loading`, or `None` when the
    /// input was empty (a no-op in every state).
    pub fn submit(&mut self, raw_url: &str) -> Result<Option<String>> {
        let url = raw_url.trim();
        if url.is_empty() {
            return Ok(None);
        }

        match self.state {
            RequestState::Idle | RequestState::Error => {
                self.state = RequestState::Loading;
                self.metadata = None;
                self.error = None;
                Ok(Some(url.to_string()))
            }
            from @ (RequestState::Loading | RequestState::Success) => {
                Err(Error::InvalidTransition {
                    from,
                    event: "submit",
                })
            }
        }
    }

    /// Record a successful resolution
    pub fn resolve_ok(&mut self, metadata: MediaMetadata) -> Result<Arc<MediaMetadata>> {
        self.expect_loading("complete resolution")?;
        let metadata = Arc::new(metadata);
        self.state = RequestState::Success;
        self.metadata = Some(metadata.clone());
        self.error = None;
        Ok(metadata)
    }

    /// Record a failed resolution
    pub fn resolve_fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.expect_loading("fail resolution")?;
        self.state = RequestState::Error;
        self.metadata = None;
        self.error = Some(message.into());
        Ok(())
    }

    /// Drop the result or error and return to `idle`
    ///
    /// Resetting an idle machine is a no-op; a pending resolution cannot be reset.
    pub fn reset(&mut self) -> Result<()> {
        match self.state {
            RequestState::Loading => Err(Error::InvalidTransition {
                from: RequestState::Loading,
                event: "reset",
            }),
            _ => {
                self.state = RequestState::Idle;
                self.metadata = None;
                self.error = None;
                Ok(())
            }
        }
    }

    fn expect_loading(&self, event: &'static str) -> Result<()> {
        if self.state == RequestState::Loading {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.state,
                event,
            })
        }
    }
}
