//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Configuration is resolved once at startup and handed to the client
//! constructor; nothing reads it from global state.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server location
#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    /// Base URL of the project API, e.g. `http://host/api/demo/`
    #[serde(default = "default_address")]
    pub address: String,
}

fn default_address() -> String {
    "http://localhost:8080/api/demo/".to_string()
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

/// Request pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Attempts per request, counting retries after a 403
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Token source settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Literal bearer token; takes precedence over the token file
    pub token: Option<String>,

    #[serde(default = "default_token_file")]
    pub token_file: String,

    /// Command printing a fresh token on stdout
    #[serde(default)]
    pub refresh_command: Vec<String>,
}

fn default_token_file() -> String {
    dirs::config_dir()
        .map(|p| p.join("axon-client").join("token").to_string_lossy().to_string())
        .unwrap_or_else(|| "./axon_token".to_string())
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_file: default_token_file(),
            refresh_command: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Token file path with a leading `~/` expanded
    pub fn token_path(&self) -> PathBuf {
        match (self.token_file.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.token_file),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    ///
    /// Unreadable or malformed files are reported through `tracing` and
    /// skipped, so a subscriber must be installed before calling this.
    pub fn load_default() -> Self {
        let config_paths: Vec<PathBuf> = [
            dirs::config_dir().map(|p| p.join("axon-client").join("config.toml")),
            Some(PathBuf::from("/etc/axon-client/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::load_first(&config_paths)
    }

    /// Load the first existing file in `paths` that parses
    fn load_first(paths: &[PathBuf]) -> Self {
        for path in paths {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(address) = var("AXON_HOST") {
            self.host.address = address;
        }

        if let Some(attempts) = var("AXON_MAX_ATTEMPTS") {
            match attempts.parse() {
                Ok(n) => self.client.max_attempts = n,
                Err(_) => tracing::warn!(value = %attempts, "Ignoring invalid AXON_MAX_ATTEMPTS"),
            }
        }

        if let Some(token) = var("AXON_TOKEN") {
            self.auth.token = Some(token);
        }
        if let Some(token_file) = var("AXON_TOKEN_FILE") {
            self.auth.token_file = token_file;
        }

        if let Some(level) = var("AXON_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("AXON_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Axon client configuration
#
# Environment variables override these settings:
# - AXON_HOST
# - AXON_MAX_ATTEMPTS
# - AXON_TOKEN
# - AXON_TOKEN_FILE
# - AXON_LOG_LEVEL
# - AXON_LOG_FORMAT

[host]
# Project API base URL (the eval endpoint is appended to it)
address = "http://localhost:8080/api/demo/"

[client]
# Attempts per request; a 403 refreshes the token and retries
max_attempts = 3

# Request timeout in seconds
request_timeout_secs = 30

[auth]
# File holding the current bearer token
token_file = "~/.config/axon-client/token"

# Command printing a fresh token on stdout, run after a 403
# refresh_command = ["scram-login", "--print-token"]

# Literal token, overrides token_file
# token = ""

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
