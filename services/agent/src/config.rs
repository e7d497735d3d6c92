use lingobridge_realtime::{Voice, types::DEFAULT_MODEL};
use secrecy::SecretString;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub model: String,
    pub voice: Voice,
    pub meeting_id: String,
    pub agent_name: String,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map(SecretString::from)
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let meeting_id = std::env::var("MEETING_ID")
            .map_err(|_| ConfigError::MissingVar("MEETING_ID".to_string()))?;

        let model = std::env::var("REALTIME_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let voice_str = std::env::var("REALTIME_VOICE").unwrap_or_else(|_| "alloy".to_string());
        let voice = Voice::from_name(&voice_str).ok_or_else(|| {
            ConfigError::InvalidValue(
                "REALTIME_VOICE".to_string(),
                format!("'{}' is not a supported voice", voice_str),
            )
        })?;

        let agent_name =
            std::env::var("AGENT_NAME").unwrap_or_else(|_| "Interpreter".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            openai_api_key,
            model,
            voice,
            meeting_id,
            agent_name,
            log_level,
        })
    }
}
