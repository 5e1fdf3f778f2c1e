//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Push delivery configuration.
    #[serde(default)]
    pub push: PushConfig,
    /// Realtime streaming configuration.
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Push provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
    /// Whether push delivery is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Push provider endpoint URL.
    #[serde(default)]
    pub provider_url: Option<url::Url>,
    /// Maximum number of tokens the provider accepts per batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Timeout for one batch submission, in seconds.
    #[serde(default = "default_batch_timeout_secs")]
    pub batch_timeout_secs: u64,
}

/// Realtime streaming configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Per-connection outbound buffer capacity; further emits to a full
    /// buffer are dropped.
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider_url: None,
            max_batch_size: default_max_batch_size(),
            batch_timeout_secs: default_batch_timeout_secs(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            send_buffer: default_send_buffer(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_batch_size() -> usize {
    100
}

const fn default_batch_timeout_secs() -> u64 {
    10
}

const fn default_send_buffer() -> usize {
    256
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `SCHOOLHUB_ENV`)
    /// 3. Environment variables with `SCHOOLHUB` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("SCHOOLHUB_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("SCHOOLHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("SCHOOLHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
