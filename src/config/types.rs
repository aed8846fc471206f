//! Raw configuration types for TOML parsing

use super::*;
use serde::Deserialize;

pub(crate) const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:8080";
pub(crate) const DEFAULT_SESSION_URL: &str = "http://127.0.0.1:3000/api/auth/session";

/// Raw configuration as parsed from TOML
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub server: Option<RawServerConfig>,
    pub upstream: Option<RawUpstreamConfig>,
    pub session: Option<RawSessionConfig>,
    pub logging: Option<RawLoggingConfig>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawServerConfig {
    pub bind: Option<String>,
    pub mount_path: Option<String>,
}

impl TryFrom<RawServerConfig> for ServerConfig {
    type Error = ConfigError;

    fn try_from(raw: RawServerConfig) -> Result<Self, Self::Error> {
        let defaults = ServerConfig::default();
        let mount_path = raw.mount_path.unwrap_or(defaults.mount_path);

        if !mount_path.starts_with('/') || mount_path.len() < 2 || mount_path.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "server.mount_path must look like \"/api\", got \"{}\"",
                mount_path
            )));
        }

        Ok(Self {
            bind: raw.bind.unwrap_or(defaults.bind),
            mount_path,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawUpstreamConfig {
    pub base_url: Option<String>,
    pub preserve_host: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub rewrite: Option<Vec<PathRewriteRule>>,
}

impl TryFrom<RawUpstreamConfig> for UpstreamConfig {
    type Error = ConfigError;

    fn try_from(raw: RawUpstreamConfig) -> Result<Self, Self::Error> {
        let defaults = UpstreamConfig::default();

        let base_url = match raw.base_url {
            Some(url) => parse_http_url("upstream.base_url", &url)?,
            None => defaults.base_url,
        };

        let rewrite = raw.rewrite.unwrap_or(defaults.rewrite);
        if let Some(rule) = rewrite.iter().find(|r| !r.pattern.starts_with('/')) {
            return Err(ConfigError::Invalid(format!(
                "upstream.rewrite pattern must start with '/', got \"{}\"",
                rule.pattern
            )));
        }

        Ok(Self {
            base_url,
            preserve_host: raw.preserve_host.unwrap_or(defaults.preserve_host),
            // 0 disables the timeout
            timeout_secs: match raw.timeout_secs {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => defaults.timeout_secs,
            },
            rewrite,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawSessionConfig {
    pub endpoint: Option<String>,
    pub forward_headers: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
}

impl TryFrom<RawSessionConfig> for SessionConfig {
    type Error = ConfigError;

    fn try_from(raw: RawSessionConfig) -> Result<Self, Self::Error> {
        let defaults = SessionConfig::default();

        let endpoint = match raw.endpoint {
            Some(url) => parse_http_url("session.endpoint", &url)?,
            None => defaults.endpoint,
        };

        let forward_headers = match raw.forward_headers {
            Some(names) => names
                .iter()
                .map(|name| {
                    HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()).map_err(|e| {
                        ConfigError::Invalid(format!(
                            "session.forward_headers: invalid header \"{}\": {}",
                            name, e
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.forward_headers,
        };

        Ok(Self {
            endpoint,
            forward_headers,
            timeout_secs: raw.timeout_secs.unwrap_or(defaults.timeout_secs),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct RawLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub redact_credentials: Option<bool>,
}

impl From<RawLoggingConfig> for LoggingConfig {
    fn from(raw: RawLoggingConfig) -> Self {
        Self {
            level: raw.level.unwrap_or_else(|| "info".to_string()),
            format: match raw.format.as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
            redact_credentials: raw.redact_credentials.unwrap_or(true),
        }
    }
}

/// Parse a URL and require an http or https scheme
pub fn parse_http_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::Invalid(format!("{}: invalid URL \"{}\": {}", field, value, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ConfigError::Invalid(format!(
            "{}: scheme '{}' not allowed, use http or https",
            field, scheme
        ))),
    }
}
