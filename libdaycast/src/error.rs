//! Error types for Daycast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Content generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Unknown content topic: {0}")]
    UnknownTopic(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl BotError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            BotError::InvalidInput(_) | BotError::UnknownTopic(_) => 3,
            BotError::Platform(PlatformError::Authentication(_)) => 2,
            BotError::Platform(_) => 1,
            BotError::Generation(_) => 1,
            BotError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("LLM API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("LLM request failed: {0}")]
    Http(String),

    #[error("LLM API returned an empty completion")]
    EmptyCompletion,
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Media upload failed: {0}")]
    MediaUpload(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = BotError::InvalidInput("Empty content".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_unknown_topic() {
        let error = BotError::UnknownTopic("weather".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let platform_error = PlatformError::Authentication("Bad token".to_string());
        let error = BotError::Platform(platform_error);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_posting_error() {
        let platform_error = PlatformError::Posting("Network timeout".to_string());
        let error = BotError::Platform(platform_error);
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_generation_error() {
        let error = BotError::Generation(GenerationError::EmptyCompletion);
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_config_error() {
        let config_error = ConfigError::MissingKeys(vec!["TWITTER_APP_KEY".to_string()]);
        let error = BotError::Config(config_error);
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_missing_keys_lists_every_key() {
        let error = ConfigError::MissingKeys(vec![
            "TWITTER_APP_KEY".to_string(),
            "LLM_API_KEY".to_string(),
        ]);
        let message = format!("{}", error);
        assert!(message.contains("TWITTER_APP_KEY"));
        assert!(message.contains("LLM_API_KEY"));
        assert!(message.contains("TWITTER_APP_KEY, LLM_API_KEY"));
    }

    #[test]
    fn test_error_message_formatting_generation_api() {
        let error = BotError::Generation(GenerationError::Api {
            status: 429,
            message: "rate limited".to_string(),
        });
        let message = format!("{}", error);
        assert_eq!(
            message,
            "Content generation error: LLM API returned 429: rate limited"
        );
    }

    #[test]
    fn test_error_message_formatting_media_upload() {
        let error = BotError::Platform(PlatformError::MediaUpload("file too large".to_string()));
        let message = format!("{}", error);
        assert_eq!(
            message,
            "Platform error: Media upload failed: file too large"
        );
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let platform_error = PlatformError::Posting("test".to_string());
        let bot_error: BotError = platform_error.into();

        match bot_error {
            BotError::Platform(_) => {}
            _ => panic!("Expected BotError::Platform"),
        }
    }

    #[test]
    fn test_error_conversion_from_generation_error() {
        let generation_error = GenerationError::EmptyCompletion;
        let bot_error: BotError = generation_error.into();

        match bot_error {
            BotError::Generation(_) => {}
            _ => panic!("Expected BotError::Generation"),
        }
    }

    #[test]
    fn test_platform_error_clone() {
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();

        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
