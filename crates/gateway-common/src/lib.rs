//! # gateway-common
//!
//! Shared utilities for the gateway client: configuration loading and
//! tracing/telemetry setup.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    AppConfig, AppSettings, AuthSettings, ConfigError, Environment, GatewaySettings,
    ReconnectSettings,
};
pub use telemetry::{init_tracing, try_init_tracing, TracingConfig, TracingError};
