//! Mock platform implementation for testing
//!
//! Configurable per-operation success and failure, with call counters and
//! captured publishes so tests can verify fallback behavior without network
//! access or credentials. Available outside `cfg(test)` to support
//! integration tests.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{PlatformError, Result};
use crate::platforms::Platform;

/// Behavior switches for [`MockPlatform`]
#[derive(Debug, Clone)]
pub struct MockConfig {
    pub name: String,
    pub verify_succeeds: bool,
    pub upload_succeeds: bool,
    /// Whether a publish that references media succeeds
    pub media_publish_succeeds: bool,
    /// Whether a text-only publish succeeds
    pub text_publish_succeeds: bool,
    pub upload_error: String,
    pub publish_error: String,
    pub character_limit: Option<usize>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            verify_succeeds: true,
            upload_succeeds: true,
            media_publish_succeeds: true,
            text_publish_succeeds: true,
            upload_error: "mock upload failed".to_string(),
            publish_error: "mock publish failed".to_string(),
            character_limit: None,
        }
    }
}

/// Mock platform for tests
pub struct MockPlatform {
    config: MockConfig,
    uploads: AtomicUsize,
    publishes: Mutex<Vec<(String, Option<String>)>>,
    counter: AtomicUsize,
}

impl MockPlatform {
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            uploads: AtomicUsize::new(0),
            publishes: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    /// A platform where every operation succeeds
    pub fn success(name: &str) -> Arc<Self> {
        Arc::new(Self::new(MockConfig {
            name: name.to_string(),
            ..Default::default()
        }))
    }

    /// Media uploads fail; everything else succeeds
    pub fn upload_failure(name: &str, error: &str) -> Arc<Self> {
        Arc::new(Self::new(MockConfig {
            name: name.to_string(),
            upload_succeeds: false,
            upload_error: error.to_string(),
            ..Default::default()
        }))
    }

    /// Publishes that reference media fail; text-only publishes succeed
    pub fn media_publish_failure(name: &str, error: &str) -> Arc<Self> {
        Arc::new(Self::new(MockConfig {
            name: name.to_string(),
            media_publish_succeeds: false,
            publish_error: error.to_string(),
            ..Default::default()
        }))
    }

    /// Every publish fails
    pub fn publish_failure(name: &str, error: &str) -> Arc<Self> {
        Arc::new(Self::new(MockConfig {
            name: name.to_string(),
            media_publish_succeeds: false,
            text_publish_succeeds: false,
            publish_error: error.to_string(),
            ..Default::default()
        }))
    }

    /// Upload fails one way, the text-only fallback fails another
    pub fn upload_and_publish_failure(
        name: &str,
        upload_error: &str,
        publish_error: &str,
    ) -> Arc<Self> {
        Arc::new(Self::new(MockConfig {
            name: name.to_string(),
            upload_succeeds: false,
            media_publish_succeeds: false,
            text_publish_succeeds: false,
            upload_error: upload_error.to_string(),
            publish_error: publish_error.to_string(),
            ..Default::default()
        }))
    }

    /// Credential verification fails
    pub fn verify_failure(name: &str) -> Arc<Self> {
        Arc::new(Self::new(MockConfig {
            name: name.to_string(),
            verify_succeeds: false,
            ..Default::default()
        }))
    }

    pub fn with_limit(name: &str, limit: usize) -> Arc<Self> {
        Arc::new(Self::new(MockConfig {
            name: name.to_string(),
            character_limit: Some(limit),
            ..Default::default()
        }))
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn publish_count(&self) -> usize {
        self.publishes.lock().unwrap().len()
    }

    /// Every publish call as `(text, media_id)`, in order
    pub fn publishes(&self) -> Vec<(String, Option<String>)> {
        self.publishes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn verify_credentials(&self) -> Result<()> {
        if self.config.verify_succeeds {
            Ok(())
        } else {
            Err(PlatformError::Authentication("mock credentials rejected".to_string()).into())
        }
    }

    async fn upload_media(&self, _image: &Path) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);

        if self.config.upload_succeeds {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("media-{}", n))
        } else {
            Err(PlatformError::MediaUpload(self.config.upload_error.clone()).into())
        }
    }

    async fn publish(&self, text: &str, media_id: Option<&str>) -> Result<String> {
        self.publishes
            .lock()
            .unwrap()
            .push((text.to_string(), media_id.map(str::to_string)));

        let succeeds = if media_id.is_some() {
            self.config.media_publish_succeeds
        } else {
            self.config.text_publish_succeeds
        };

        if succeeds {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}:post-{}", self.config.name, n))
        } else {
            Err(PlatformError::Posting(self.config.publish_error.clone()).into())
        }
    }

    fn validate_text(&self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(PlatformError::Validation("text cannot be empty".to_string()).into());
        }

        if let Some(limit) = self.config.character_limit {
            let chars = text.chars().count();
            if chars > limit {
                return Err(PlatformError::Validation(format!(
                    "text exceeds {} character limit (current: {})",
                    limit, chars
                ))
                .into());
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn character_limit(&self) -> Option<usize> {
        self.config.character_limit
    }
}
