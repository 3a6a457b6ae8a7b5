use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_TOKEN_URL: &str = "https://vocalbridgeai.com/api/v1/token";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Absent keys are reported per request, not at startup.
    pub vocal_bridge_api_key: Option<String>,
    pub token_url: String,
    pub participant_name: String,
    pub static_dir: PathBuf,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let vocal_bridge_api_key = std::env::var("VOCAL_BRIDGE_API_KEY")
            .ok()
            .filter(|key| !key.is_empty());

        let token_url = std::env::var("VOCAL_BRIDGE_TOKEN_URL")
            .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string());
        if !token_url.starts_with("http://") && !token_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "VOCAL_BRIDGE_TOKEN_URL".to_string(),
                format!("'{}' is not an http(s) URL", token_url),
            ));
        }

        let participant_name =
            std::env::var("PARTICIPANT_NAME").unwrap_or_else(|_| "User".to_string());

        let static_dir = std::env::var("STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./client/dist"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            vocal_bridge_api_key,
            token_url,
            participant_name,
            static_dir,
            log_level,
        })
    }
}
