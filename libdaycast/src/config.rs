//! Configuration management for Daycast
//!
//! Tunables live in a TOML file resolved via `DAYCAST_CONFIG` or the XDG
//! config directory; API secrets are read from the environment at startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Environment variables that must be present before the bot can start
pub const REQUIRED_ENV_KEYS: [&str; 5] = [
    "TWITTER_APP_KEY",
    "TWITTER_APP_SECRET",
    "TWITTER_ACCESS_TOKEN",
    "TWITTER_ACCESS_SECRET",
    "LLM_API_KEY",
];

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub twitter: TwitterConfig,
    pub llm: LlmConfig,
    pub content: ContentConfig,
    pub images: ImagesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    /// Accounts in high-limit mode are exempt from the short-form length cap
    pub high_limit: bool,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self { high_limit: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "grok-2-latest".to_string(),
            base_url: "https://api.x.ai/v1".to_string(),
            temperature: 0.85,
            max_tokens: 250,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Handle woven into every prompt exactly once
    pub brand_handle: String,
    /// Standard short-form length cap, in characters
    pub max_post_chars: usize,
    /// Local-time hours at which a post fires each day
    pub posting_hours: Vec<u32>,
    /// Each fire time gets a uniform-random minute in [0, this)
    pub random_delay_minutes: u32,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            brand_handle: "@daycast".to_string(),
            max_post_chars: 280,
            posting_hours: vec![9, 12, 15, 18, 21],
            random_delay_minutes: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    /// Directory holding downloaded images (tilde-expanded)
    pub cache_dir: String,
    /// Cache eviction keeps at most this many files
    pub max_cached: usize,
    /// Downloads smaller than this many bytes are rejected
    pub min_file_size: u64,
    pub width: u32,
    pub height: u32,
    /// Curated direct-URL lists, tried first in order
    pub curated: Vec<CuratedListConfig>,
    /// Randomized-path placeholder image service
    pub placeholder_url: String,
    /// Keyword-query image search service
    pub search_url: String,
    /// Search terms for the keyword-query service
    pub search_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CuratedListConfig {
    pub name: String,
    pub urls: Vec<String>,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            cache_dir: "~/.local/share/daycast/images".to_string(),
            max_cached: 20,
            min_file_size: 5000,
            width: 1200,
            height: 630,
            curated: vec![
                CuratedListConfig {
                    name: "pexels".to_string(),
                    urls: vec![
                        "https://images.pexels.com/photos/1695052/pexels-photo-1695052.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1".to_string(),
                        "https://images.pexels.com/photos/5380642/pexels-photo-5380642.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1".to_string(),
                        "https://images.pexels.com/photos/3184291/pexels-photo-3184291.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1".to_string(),
                        "https://images.pexels.com/photos/844124/pexels-photo-844124.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1".to_string(),
                        "https://images.pexels.com/photos/730564/pexels-photo-730564.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1".to_string(),
                        "https://images.pexels.com/photos/1108571/pexels-photo-1108571.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1".to_string(),
                        "https://images.pexels.com/photos/3861972/pexels-photo-3861972.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=1".to_string(),
                    ],
                },
                CuratedListConfig {
                    name: "pixabay".to_string(),
                    urls: vec![
                        "https://cdn.pixabay.com/photo/2018/05/14/14/39/cyber-security-3400649_1280.jpg".to_string(),
                        "https://cdn.pixabay.com/photo/2017/08/07/15/18/blockchain-2607229_1280.jpg".to_string(),
                        "https://cdn.pixabay.com/photo/2016/11/19/15/40/cryptography-1839751_1280.jpg".to_string(),
                        "https://cdn.pixabay.com/photo/2018/02/04/17/39/blockchain-3130166_1280.jpg".to_string(),
                        "https://cdn.pixabay.com/photo/2018/09/12/12/17/bitcoin-3671287_1280.jpg".to_string(),
                        "https://cdn.pixabay.com/photo/2017/01/25/11/44/cyber-2008269_1280.jpg".to_string(),
                        "https://cdn.pixabay.com/photo/2018/05/08/08/26/blockchain-3383807_1280.jpg".to_string(),
                    ],
                },
            ],
            placeholder_url: "https://picsum.photos".to_string(),
            search_url: "https://source.unsplash.com".to_string(),
            search_terms: vec![
                "blockchain cryptography privacy".to_string(),
                "homomorphic encryption data protection".to_string(),
                "confidential computing cloud security".to_string(),
                "zero knowledge proof cryptography".to_string(),
                "encrypted smart contracts".to_string(),
                "private decentralized finance".to_string(),
                "data encryption cybersecurity".to_string(),
                "secure computation protocols".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to the
    /// built-in defaults when no config file exists
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scheduler or generator cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.content.posting_hours.is_empty() {
            return Err(ConfigError::Invalid("posting_hours must not be empty".to_string()).into());
        }
        if let Some(hour) = self.content.posting_hours.iter().find(|h| **h > 23) {
            return Err(ConfigError::Invalid(format!(
                "posting hour {} is out of range (0-23)",
                hour
            ))
            .into());
        }
        if self.content.random_delay_minutes == 0 || self.content.random_delay_minutes > 60 {
            return Err(ConfigError::Invalid(
                "random_delay_minutes must be between 1 and 60".to_string(),
            )
            .into());
        }
        if self.content.max_post_chars == 0 {
            return Err(ConfigError::Invalid("max_post_chars must be positive".to_string()).into());
        }
        if self.images.max_cached == 0 {
            return Err(ConfigError::Invalid("images.max_cached must be positive".to_string()).into());
        }
        Ok(())
    }
}

/// API credentials read from the environment
///
/// Missing keys are reported all at once so an operator can fix the whole
/// environment in one pass.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub twitter_app_key: String,
    pub twitter_app_secret: String,
    pub twitter_access_token: String,
    pub twitter_access_secret: String,
    pub llm_api_key: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        let missing: Vec<String> = REQUIRED_ENV_KEYS
            .iter()
            .filter(|key| {
                std::env::var(key)
                    .map(|value| value.trim().is_empty())
                    .unwrap_or(true)
            })
            .map(|key| key.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys(missing).into());
        }

        Ok(Self {
            twitter_app_key: std::env::var("TWITTER_APP_KEY").unwrap_or_default(),
            twitter_app_secret: std::env::var("TWITTER_APP_SECRET").unwrap_or_default(),
            twitter_access_token: std::env::var("TWITTER_ACCESS_TOKEN").unwrap_or_default(),
            twitter_access_secret: std::env::var("TWITTER_ACCESS_SECRET").unwrap_or_default(),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or_default(),
        })
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("DAYCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::Invalid("no config directory available".to_string()))?;

    Ok(config_dir.join("daycast").join("config.toml"))
}
