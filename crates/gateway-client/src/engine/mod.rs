//! Connection engine
//!
//! The [`Gateway`] handle is the public surface; all connection state lives
//! in a single spawned runner task that owns the socket, the heartbeat
//! schedule and every timer. Commands flow in over an mpsc channel, decoded
//! events flow out over a broadcast channel, so no state is ever touched
//! from two tasks at once.

mod runner;

use crate::backoff::ReconnectPolicy;
use crate::credentials::CredentialProvider;
use crate::events::GatewayEvent;
use crate::protocol::{ConnectionProperties, Intents, OpCode, PresencePayload};
use crate::transport::{Connector, WsConnector};
use gateway_common::AppConfig;
use parking_lot::Mutex;
use runner::Runner;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Buffered events per subscriber before lagging
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connection lifecycle states, owned exclusively by the runner task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket, no pending attempt
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, waiting for the server Hello
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    /// Session established; application payloads may flow
    SessionOpen,
    /// Tearing down on explicit close
    Closing,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::AwaitingHello => "AwaitingHello",
            Self::Identifying => "Identifying",
            Self::Resuming => "Resuming",
            Self::SessionOpen => "SessionOpen",
            Self::Closing => "Closing",
        };
        f.write_str(name)
    }
}

/// How the client authenticates in Identify
#[derive(Debug, Clone, Copy)]
pub enum IdentifyMode {
    /// Bot session declaring event intents
    Bot(Intents),
    /// User session declaring client capabilities
    User { capabilities: u64 },
}

/// Engine configuration, passed explicitly at construction
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Full connection URL (`wss://host/?v=N&encoding=json[&compress=zlib-stream]`)
    pub url: String,
    /// Client properties sent in Identify
    pub properties: ConnectionProperties,
    /// Bot intents or user capabilities
    pub identify_mode: IdentifyMode,
    /// Whether the URL requested the compressed transport
    pub compress: bool,
    /// How long to wait for Hello before abandoning an attempt
    pub connect_timeout: Duration,
    /// Reconnect delay policy
    pub reconnect: ReconnectPolicy,
}

impl GatewayConfig {
    /// Build the engine configuration from the application config
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        let identify_mode = if config.auth.bot {
            let intents = config
                .auth
                .intents
                .map_or(Intents::DEFAULT, Intents::from_bits_truncate);
            IdentifyMode::Bot(intents)
        } else {
            IdentifyMode::User {
                capabilities: config.auth.capabilities.unwrap_or(0),
            }
        };

        Self {
            url: config.gateway.url(),
            properties: ConnectionProperties::library(),
            identify_mode,
            compress: config.gateway.compress,
            connect_timeout: Duration::from_millis(config.gateway.connect_timeout_ms),
            reconnect: ReconnectPolicy::new(
                Duration::from_millis(config.reconnect.base_delay_ms),
                Duration::from_millis(config.reconnect.max_delay_ms),
                config.reconnect.max_attempts,
            ),
        }
    }
}

/// Commands accepted by the runner task
#[derive(Debug)]
pub(crate) enum Command {
    Open,
    Close,
    Send { op: OpCode, data: Value },
    Reachability(bool),
    Shutdown,
}

/// Errors surfaced by the public handle
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("engine task has terminated")]
    EngineGone,

    #[error("invalid outgoing payload: {0}")]
    InvalidPayload(String),
}

/// Handle to a gateway connection engine
///
/// Cheap to clone; all clones drive the same runner task.
#[derive(Clone)]
pub struct Gateway {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<GatewayEvent>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Gateway {
    /// Create an engine with an injected transport and credential provider
    ///
    /// The runner task starts immediately but stays disconnected until
    /// [`Gateway::open`] is called.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let runner = Runner::new(config, connector, credentials, command_rx, events.clone());
        let task = tokio::spawn(runner.run());

        Self {
            commands,
            events,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }

    /// Create an engine over the production WebSocket transport
    #[must_use]
    pub fn connect(config: GatewayConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self::new(config, Arc::new(WsConnector), credentials)
    }

    /// Open the connection; no-op if a socket is already active
    pub fn open(&self) -> Result<(), GatewayError> {
        self.command(Command::Open)
    }

    /// Close the connection and stop reconnecting until `open()` again
    ///
    /// Clears the session identifiers: the next connection will Identify.
    pub fn close(&self) -> Result<(), GatewayError> {
        self.command(Command::Close)
    }

    /// Send an application payload
    ///
    /// The payload is only written to the socket while the session is open;
    /// outside `SessionOpen` the runner drops it with a warning.
    pub fn send(&self, op: OpCode, data: Value) -> Result<(), GatewayError> {
        self.command(Command::Send { op, data })
    }

    /// Update this client's presence status
    pub fn update_presence(&self, status: impl Into<String>) -> Result<(), GatewayError> {
        let payload = PresencePayload { status: status.into() };
        if !payload.is_valid_status() {
            return Err(GatewayError::InvalidPayload(format!(
                "unknown presence status: {}",
                payload.status
            )));
        }
        let data = serde_json::to_value(&payload)
            .map_err(|e| GatewayError::InvalidPayload(e.to_string()))?;
        self.command(Command::Send {
            op: OpCode::PresenceUpdate,
            data,
        })
    }

    /// Report a network reachability change
    ///
    /// Regained reachability cancels any pending backoff delay and attempts
    /// to reconnect immediately, without touching the attempt counter.
    pub fn set_reachable(&self, reachable: bool) -> Result<(), GatewayError> {
        self.command(Command::Reachability(reachable))
    }

    /// Subscribe to the decoded event feed
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Stop the runner task entirely and wait for it to finish
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    fn command(&self, command: Command) -> Result<(), GatewayError> {
        self.commands
            .send(command)
            .map_err(|_| GatewayError::EngineGone)
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}
