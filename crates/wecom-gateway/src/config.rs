//! Gateway configuration: TOML file, then environment overrides, then validation.

use std::{net::SocketAddr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wecom_crypto::keys::{validate_encoding_aes_key, validate_token, KeyError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl ToString) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub wework: WeWorkConfig,
    pub ai: AiConfig,
    pub forward: ForwardConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            request_timeout_secs: 10,
            max_body_bytes: 64 * 1024, // 64KB
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// WeCom application credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeWorkConfig {
    pub corp_id: String,
    pub token: String,
    pub encoding_aes_key: String,
    pub agent_id: i64,
}

impl std::fmt::Debug for WeWorkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeWorkConfig")
            .field("corp_id", &self.corp_id)
            .field("token", &"<redacted>")
            .field("encoding_aes_key", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retry: u32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: 30,
            retry: 3,
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Bounds on detached forwarding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardConfig {
    /// Maximum forwards in flight at once.
    pub workers: usize,
    /// Jobs waiting for a worker; further jobs are dropped.
    pub queue_capacity: usize,
    /// Upper bound for one forward including retries.
    pub dispatch_timeout_secs: u64,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            queue_capacity: 256,
            dispatch_timeout_secs: 120,
        }
    }
}

impl ForwardConfig {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl GatewayConfig {
    /// Load from an optional TOML file, apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override fields from `WECOM_*` variables. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("WECOM_BIND_ADDR") {
            self.server.bind_addr = addr
                .parse()
                .map_err(|e| ConfigError::invalid("server.bind_addr", e))?;
        }
        if let Some(corp_id) = lookup("WECOM_CORP_ID") {
            self.wework.corp_id = corp_id;
        }
        if let Some(token) = lookup("WECOM_TOKEN") {
            self.wework.token = token;
        }
        if let Some(key) = lookup("WECOM_ENCODING_AES_KEY") {
            self.wework.encoding_aes_key = key;
        }
        if let Some(agent_id) = lookup("WECOM_AGENT_ID") {
            self.wework.agent_id = agent_id
                .parse()
                .map_err(|e| ConfigError::invalid("wework.agent_id", e))?;
        }
        if let Some(url) = lookup("WECOM_AI_BASE_URL") {
            self.ai.base_url = url;
        }
        if let Some(level) = lookup("WECOM_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(format) = lookup("WECOM_LOG_FORMAT") {
            self.log.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                other => return Err(ConfigError::invalid("log.format", format!("unknown format {other:?}"))),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wework.corp_id.is_empty() {
            return Err(ConfigError::invalid("wework.corp_id", "must not be empty"));
        }

        validate_token(&self.wework.token).map_err(|e| ConfigError::invalid("wework.token", key_reason(e)))?;

        validate_encoding_aes_key(&self.wework.encoding_aes_key)
            .map_err(|e| ConfigError::invalid("wework.encoding_aes_key", key_reason(e)))?;

        validate_base_url(&self.ai.base_url).map_err(|reason| ConfigError::invalid("ai.base_url", reason))?;

        if self.forward.workers == 0 {
            return Err(ConfigError::invalid("forward.workers", "must be > 0"));
        }
        if self.forward.queue_capacity == 0 {
            return Err(ConfigError::invalid("forward.queue_capacity", "must be > 0"));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid("server.max_body_bytes", "must be > 0"));
        }

        Ok(())
    }
}

fn key_reason(e: KeyError) -> String {
    e.to_string()
}

fn validate_base_url(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err("must not be empty".to_string());
    }
    let url = reqwest::Url::parse(raw).map_err(|e| format!("invalid URL: {e}"))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err("must include scheme and host".to_string());
    }
    Ok(())
}
