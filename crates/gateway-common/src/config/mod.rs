//! Configuration module

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, AuthSettings, ConfigError, Environment, GatewaySettings,
    ReconnectSettings,
};
