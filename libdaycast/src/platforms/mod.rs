//! Platform abstraction and implementations
//!
//! A single trait covers credential checks, media upload, and post
//! submission, so the scheduler can run against the real Twitter client or a
//! mock interchangeably.

use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

use crate::error::Result;

pub mod mock;
pub mod twitter;

/// Unified interface to a social platform
#[async_trait]
pub trait Platform: Send + Sync {
    /// Verify the configured credentials against the platform
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` when the platform rejects the
    /// credential set, or `PlatformError::Network` when it cannot be reached.
    async fn verify_credentials(&self) -> Result<()>;

    /// Upload an image and return the platform media identifier
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::MediaUpload` when the platform refuses the
    /// upload, wrapping whatever detail the response carried.
    async fn upload_media(&self, image: &Path) -> Result<String>;

    /// Submit a post, optionally referencing an uploaded media id
    ///
    /// Returns the platform-specific post identifier.
    async fn publish(&self, text: &str, media_id: Option<&str>) -> Result<String>;

    /// Check text against platform requirements before submission
    fn validate_text(&self, text: &str) -> Result<()>;

    /// Lowercase platform identifier (e.g., "twitter")
    fn name(&self) -> &str;

    /// Maximum post length in characters, or `None` when unlimited
    fn character_limit(&self) -> Option<usize>;

    /// Publish with the media path when given, degrading to text-only
    ///
    /// Any failure on the media path (upload or submission) triggers exactly
    /// one text-only attempt with the same text. When that fallback also
    /// fails, its error is the one surfaced.
    async fn publish_with_fallback(&self, text: &str, image: Option<&Path>) -> Result<String> {
        let Some(path) = image else {
            return self.publish(text, None).await;
        };

        match self.upload_media(path).await {
            Ok(media_id) => match self.publish(text, Some(&media_id)).await {
                Ok(post_id) => return Ok(post_id),
                Err(e) => warn!(
                    "Posting with media failed on {}: {}. Falling back to text-only",
                    self.name(),
                    e
                ),
            },
            Err(e) => warn!(
                "Media upload failed on {}: {}. Falling back to text-only",
                self.name(),
                e
            ),
        }

        self.publish(text, None).await
    }
}
