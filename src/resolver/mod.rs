//! Metadata resolution: turning a submitted link into a [`MediaMetadata`].
//!
//! - [`RemoteResolver`] - asks the metadata service, bounded by a timeout
//! - [`SyntheticResolver`] - validates the link and fabricates plausible renditions
//! - [`FallbackResolver`] - tries one resolver and falls back to another
//!
//! A session normally resolves through
//! `FallbackResolver<RemoteResolver, SyntheticResolver>`, so a missing or broken
//! service is never visible to the user; only the synthetic generator's own
//! validation can fail a request.

mod remote;
mod synthetic;


pub use remote::{RemoteResolver, ResolveRequest};
pub use synthetic::{SyntheticResolver, is_supported_link};

use crate::error::ResolutionError;
use crate::types::MediaMetadata;
use async_trait::async_trait;

/// Trait for anything that can resolve a source link into metadata
///
/// Implementations receive the trimmed, non-empty link. Empty input never reaches
/// a resolver; the request state machine swallows it.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolve `url` into a media item and its renditions
    ///
    /// # Errors
    ///
    /// Returns a [`ResolutionError`] describing why no metadata could be produced.
    async fn resolve(&self, url: &str) -> Result<MediaMetadata, ResolutionError>;

    /// Human-readable name for logging
    fn name(&self) -> &str;
}

/// Resolver that tries `primary` and, on any failure, asks `fallback`
///
/// The primary error is logged and dropped; whatever the fallback returns is the result.
pub struct FallbackResolver<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> FallbackResolver<P, F>
where
    P: MetadataResolver,
    F: MetadataResolver,
{
    /// Compose two resolvers
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    /// The resolver tried first
    pub fn primary(&self) -> &P {
        &self.primary
    }

    /// The resolver used after a primary failure
    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

#[async_trait]
impl<P, F> MetadataResolver for FallbackResolver<P, F>
where
    P: MetadataResolver,
    F: MetadataResolver,
{
    async fn resolve(&self, url: &str) -> Result<MediaMetadata, ResolutionError> {
        match self.primary.resolve(url).await {
            Ok(metadata) => Ok(metadata),
            Err(e) => {
                tracing::warn!(
                    url = %url,
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    code = e.code(),
                    error = %e,
                    "primary resolver failed, falling back"
                );
                self.fallback.resolve(url).await
            }
        }
    }

    fn name(&self) -> &str {
        "fallback"
    }
}

#[async_trait]
impl<R> MetadataResolver for std::sync::Arc<R>
where
    R: MetadataResolver + ?Sized,
{
    async fn resolve(&self, url: &str) -> Result<MediaMetadata, ResolutionError> {
        (**self).resolve(url).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
