//! services/desk/src/config.rs
//!
//! Defines the coordinator's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the document repository, without a trailing slash.
    pub api_base_url: String,
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub token_path: PathBuf,
    pub download_dir: PathBuf,
    /// `None` means requests never time out on our side.
    pub request_timeout: Option<Duration>,
    pub ui_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // --- Repository and Server Settings ---
        let api_base_url = lookup("DESK_API_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080/api".to_string())
            .trim_end_matches('/')
            .to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "DESK_API_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }

        let bind_address_str =
            lookup("DESK_BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:3030".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("DESK_BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Local Storage ---
        let token_path = lookup("DESK_TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./.docdesk/token"));
        let download_dir = lookup("DESK_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./downloads"));

        let request_timeout = match lookup("DESK_REQUEST_TIMEOUT_SECS") {
            None => None,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "DESK_REQUEST_TIMEOUT_SECS".to_string(),
                        format!("'{}' is not a positive number of seconds", raw),
                    ))
                }
            },
        };

        let ui_origin =
            lookup("DESK_UI_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        Ok(Self {
            api_base_url,
            bind_address,
            log_level,
            token_path,
            download_dir,
            request_timeout,
            ui_origin,
        })
    }
}
