//! Application configuration structs
//!
//! Loads configuration from environment variables (with optional .env file).

use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: GatewaySettings,
    pub auth: AuthSettings,
    pub reconnect: ReconnectSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_env")]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Gateway endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    /// Gateway host name (e.g. "gateway.example.com")
    pub host: String,
    #[serde(default = "default_api_version")]
    pub api_version: u8,
    /// Request the zlib-stream compressed transport
    #[serde(default = "default_compress")]
    pub compress: bool,
    /// How long to wait for the server Hello before giving up on an attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl GatewaySettings {
    /// Build the full connection URL for this endpoint
    #[must_use]
    pub fn url(&self) -> String {
        let mut url = format!("wss://{}/?v={}&encoding=json", self.host, self.api_version);
        if self.compress {
            url.push_str("&compress=zlib-stream");
        }
        url
    }
}

/// Authentication settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Gateway token
    pub token: String,
    /// Bot mode sends `intents` in Identify; user mode sends `capabilities`
    #[serde(default = "default_bot")]
    pub bot: bool,
    /// Intents bitfield (bot mode only)
    #[serde(default)]
    pub intents: Option<u64>,
    /// Capabilities bitfield (user mode only)
    #[serde(default)]
    pub capabilities: Option<u64>,
}

/// Reconnection policy settings
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectSettings {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Optional cap on consecutive failed attempts; None retries forever
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: None,
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "gateway-client".to_string()
}

fn default_env() -> Environment {
    Environment::Development
}

fn default_api_version() -> u8 {
    9
}

fn default_compress() -> bool {
    true
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_bot() -> bool {
    true
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("APP_ENV")
                    .ok()
                    .and_then(|s| match s.to_lowercase().as_str() {
                        "production" => Some(Environment::Production),
                        "staging" => Some(Environment::Staging),
                        "development" => Some(Environment::Development),
                        _ => None,
                    })
                    .unwrap_or_default(),
            },
            gateway: GatewaySettings {
                host: env::var("GATEWAY_HOST").map_err(|_| ConfigError::MissingVar("GATEWAY_HOST"))?,
                api_version: env::var("GATEWAY_API_VERSION")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_api_version),
                compress: env::var("GATEWAY_COMPRESS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_compress),
                connect_timeout_ms: env::var("GATEWAY_CONNECT_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_connect_timeout_ms),
            },
            auth: AuthSettings {
                token: env::var("GATEWAY_TOKEN").map_err(|_| ConfigError::MissingVar("GATEWAY_TOKEN"))?,
                bot: env::var("GATEWAY_BOT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_bot),
                intents: env::var("GATEWAY_INTENTS").ok().and_then(|s| s.parse().ok()),
                capabilities: env::var("GATEWAY_CAPABILITIES")
                    .ok()
                    .and_then(|s| s.parse().ok()),
            },
            reconnect: ReconnectSettings {
                base_delay_ms: env::var("RECONNECT_BASE_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_base_delay_ms),
                max_delay_ms: env::var("RECONNECT_MAX_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(default_max_delay_ms),
                max_attempts: env::var("RECONNECT_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok()),
            },
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
