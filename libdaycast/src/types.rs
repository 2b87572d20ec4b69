//! Core types for Daycast

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// A named prompt used to steer generated content toward a topic
///
/// Templates are built once at startup and read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostTemplate {
    /// Topic tag (e.g., "privacy", "developer")
    pub topic: String,
    /// Prompt sent to the language model
    pub prompt: String,
}

/// Text produced by one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPost {
    /// The generated (and possibly normalized) post text
    pub text: String,
    /// Topic tag of the template that produced it
    pub topic: String,
    /// Identifier of the model that produced it
    pub model: String,
}

/// Result of an interactive post attempt
///
/// Returned to the caller instead of being swallowed, since someone is
/// waiting on the answer.
#[derive(Debug, Clone)]
pub struct PostOutcome {
    pub success: bool,
    pub content: Option<GeneratedPost>,
    pub error: Option<String>,
}

impl PostOutcome {
    pub fn ok(content: GeneratedPost) -> Self {
        Self {
            success: true,
            content: Some(content),
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            success: false,
            content: None,
            error: Some(error),
        }
    }
}

/// Per-capability probe results from `test_components`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComponentReport {
    pub content: bool,
    pub image: bool,
    pub twitter: bool,
}

impl ComponentReport {
    pub fn all_passing(&self) -> bool {
        self.content && self.image && self.twitter
    }

    /// Names of the capabilities that failed their probe
    pub fn failed(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.content {
            failed.push("content");
        }
        if !self.image {
            failed.push("image");
        }
        if !self.twitter {
            failed.push("twitter");
        }
        failed
    }
}

/// The next absolute time a configured posting hour will fire
#[derive(Debug, Clone)]
pub struct FireTime {
    /// Configured posting hour (local time)
    pub hour: u32,
    /// Absolute fire timestamp
    pub at: DateTime<Local>,
    /// Time remaining until the fire timestamp
    pub until: chrono::Duration,
}

/// Supported image file types for the local cache and media uploads
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageMimeType {
    Jpeg,
    Png,
    WebP,
}

impl ImageMimeType {
    /// Detect MIME type from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Get the MIME type string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

impl std::fmt::Display for ImageMimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
