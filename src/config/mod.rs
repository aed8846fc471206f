//! Configuration system for Keygate
//!
//! Loads configuration from a TOML file. The result is immutable and shared
//! by every request handler for the life of the process.

mod types;

pub use types::*;

use crate::forward::{PathRewriteRule, PathRewriter};
use axum::http::{header, HeaderName};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use url::Url;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration written by `keygate init`
pub const DEFAULT_CONFIG_TOML: &str = r#"# Keygate configuration

[server]
bind = "127.0.0.1:3000"
mount_path = "/api"

[upstream]
base_url = "http://127.0.0.1:8080"
preserve_host = false
timeout_secs = 60

[[upstream.rewrite]]
pattern = "/api"
replacement = ""

[session]
endpoint = "http://127.0.0.1:3000/api/auth/session"
forward_headers = ["cookie"]
timeout_secs = 10

[logging]
level = "info"
format = "pretty"
redact_credentials = true
"#;

/// Main Keygate configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// Upstream API configuration
    pub upstream: UpstreamConfig,
    /// Session endpoint configuration
    pub session: SessionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Self::from_raw(raw)
    }

    /// Convert from raw TOML config to validated config
    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            server: raw.server.unwrap_or_default().try_into()?,
            upstream: raw.upstream.unwrap_or_default().try_into()?,
            session: raw.session.unwrap_or_default().try_into()?,
            logging: raw.logging.unwrap_or_default().into(),
        })
    }

    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keygate")
            .join("config.toml")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Path prefix under which requests are proxied
    pub mount_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            mount_path: "/api".to_string(),
        }
    }
}

/// Upstream API configuration
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL requests are forwarded to
    pub base_url: Url,
    /// Keep the inbound Host header instead of the target's
    pub preserve_host: bool,
    /// Upstream request timeout, covering the streamed response body
    pub timeout_secs: Option<u64>,
    /// Path rewrite rules, applied in order
    pub rewrite: Vec<PathRewriteRule>,
}

impl UpstreamConfig {
    pub fn rewriter(&self) -> PathRewriter {
        PathRewriter::new(self.rewrite.clone())
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_UPSTREAM_URL).expect("default upstream URL is valid"),
            preserve_host: false,
            timeout_secs: Some(60),
            rewrite: PathRewriter::strip_api_prefix().rules().to_vec(),
        }
    }
}

/// Session endpoint configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// URL answering with the caller's session document
    pub endpoint: Url,
    /// Inbound headers that identify the caller
    pub forward_headers: Vec<HeaderName>,
    /// Session lookup timeout
    pub timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_SESSION_URL).expect("default session URL is valid"),
            forward_headers: vec![header::COOKIE],
            timeout_secs: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Format: "json" or "pretty"
    pub format: LogFormat,
    /// Mask bearer tokens in audit records
    pub redact_credentials: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            redact_credentials: true,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format
    Pretty,
    /// JSON format
    Json,
}
