//! Gateway client demo entry point
//!
//! Run with:
//! ```bash
//! cargo run -p gateway-client
//! ```
//!
//! Configuration is loaded from environment variables (GATEWAY_HOST,
//! GATEWAY_TOKEN, ...).

use gateway_client::{Gateway, GatewayConfig, GatewayEvent, StaticToken};
use gateway_common::{try_init_tracing, AppConfig, TracingConfig};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing(&TracingConfig::default()) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Gateway client failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting gateway client...");

    let config = AppConfig::from_env()?;
    info!(
        env = ?config.app.env,
        host = %config.gateway.host,
        compress = config.gateway.compress,
        "Configuration loaded"
    );

    let credentials = Arc::new(StaticToken::new(config.auth.token.clone()));
    let gateway = Gateway::connect(GatewayConfig::from_app_config(&config), credentials);
    let mut events = gateway.subscribe();

    gateway.open()?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(GatewayEvent::Dispatch { event, .. }) => {
                    info!(event = %event, "Dispatch");
                }
                Ok(GatewayEvent::Connectivity { session_open, reachable }) => {
                    info!(session_open, reachable, "Connectivity changed");
                }
                Ok(GatewayEvent::SessionInvalidated { resumable }) => {
                    warn!(resumable, "Session invalidated");
                }
                Ok(GatewayEvent::AuthFailure { reason }) => {
                    error!(reason = %reason, "Authentication failure");
                    break;
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event feed lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    gateway.close()?;
    gateway.shutdown().await;
    Ok(())
}
