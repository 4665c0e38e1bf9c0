//! Test helpers for integration tests
//!
//! Provides a scripted transport that stands in for the WebSocket layer:
//! every `connect()` from the engine hands the test a [`ServerConn`] it can
//! drive like a gateway server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gateway_client::protocol::ConnectionProperties;
use gateway_client::transport::{Connector, Frame, Socket, TransportError};
use gateway_client::{
    Gateway, GatewayConfig, IdentifyMode, Intents, ReconnectPolicy, StaticToken,
};
use serde_json::Value;
use tokio::sync::mpsc;

/// Token every scripted session authenticates with
pub const TEST_TOKEN: &str = "test-token";

/// What the engine wrote to its socket
#[derive(Debug)]
pub enum ClientMessage {
    /// A text envelope
    Text(String),
    /// The engine closed the socket, optionally with a code
    Close(Option<u16>),
}

/// Server side of one scripted connection
///
/// Dropping it ends the stream, which the engine sees as an abnormal drop.
pub struct ServerConn {
    to_client: mpsc::UnboundedSender<Result<Frame, TransportError>>,
    from_client: mpsc::UnboundedReceiver<ClientMessage>,
}

impl ServerConn {
    /// Push one text frame to the engine
    pub fn send_json(&self, payload: &Value) {
        let _ = self.to_client.send(Ok(Frame::Text(payload.to_string())));
    }

    /// Push one binary frame to the engine
    pub fn send_binary(&self, bytes: Vec<u8>) {
        let _ = self.to_client.send(Ok(Frame::Binary(bytes)));
    }

    /// Deliver a close frame with the given code
    pub fn send_close(&self, code: u16) {
        let _ = self.to_client.send(Ok(Frame::Close(Some(code))));
    }

    /// Receive whatever the engine wrote next
    pub async fn recv(&mut self) -> Option<ClientMessage> {
        self.from_client.recv().await
    }

    /// Receive the next text envelope as JSON, panicking on close or stream end
    pub async fn next_envelope(&mut self) -> Value {
        match self.recv().await {
            Some(ClientMessage::Text(text)) => {
                serde_json::from_str(&text).expect("client sent invalid JSON")
            }
            other => panic!("expected text envelope, got {other:?}"),
        }
    }

    /// Receive the next message and assert it is a close
    pub async fn expect_close(&mut self) -> Option<u16> {
        match self.recv().await {
            Some(ClientMessage::Close(code)) => code,
            other => panic!("expected close, got {other:?}"),
        }
    }
}

/// Scripted connector; each `connect()` yields a new [`ServerConn`] on the feed
pub struct MockConnector {
    connections: mpsc::UnboundedSender<ServerConn>,
}

impl MockConnector {
    /// Create the connector and the feed of server-side handles
    pub fn pair() -> (Arc<Self>, ConnectionFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { connections: tx }), ConnectionFeed { rx })
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Socket>, TransportError> {
        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();

        self.connections
            .send(ServerConn {
                to_client,
                from_client,
            })
            .map_err(|_| TransportError::Connect("test harness gone".to_string()))?;

        Ok(Box::new(MockSocket { incoming, outgoing }))
    }
}

/// Hands out the server side of each connection attempt, in order
pub struct ConnectionFeed {
    rx: mpsc::UnboundedReceiver<ServerConn>,
}

impl ConnectionFeed {
    /// Wait for the engine's next connection attempt
    pub async fn next_connection(&mut self) -> ServerConn {
        self.rx.recv().await.expect("engine stopped connecting")
    }

    /// Check for an attempt without waiting
    pub fn try_next_connection(&mut self) -> Option<ServerConn> {
        self.rx.try_recv().ok()
    }
}

struct MockSocket {
    incoming: mpsc::UnboundedReceiver<Result<Frame, TransportError>>,
    outgoing: mpsc::UnboundedSender<ClientMessage>,
}

#[async_trait]
impl Socket for MockSocket {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        self.incoming.recv().await
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.outgoing
            .send(ClientMessage::Text(text))
            .map_err(|_| TransportError::Socket("peer gone".to_string()))
    }

    async fn close(&mut self, code: Option<u16>) -> Result<(), TransportError> {
        let _ = self.outgoing.send(ClientMessage::Close(code));
        self.incoming.close();
        Ok(())
    }
}

/// Engine configuration used by the scripted tests
pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        url: "wss://gateway.test/?v=9&encoding=json".to_string(),
        properties: ConnectionProperties::library(),
        identify_mode: IdentifyMode::Bot(Intents::DEFAULT),
        compress: false,
        connect_timeout: Duration::from_secs(20),
        reconnect: ReconnectPolicy::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
            None,
        ),
    }
}

/// Spawn an engine over the scripted transport
pub fn spawn_gateway() -> (Gateway, ConnectionFeed) {
    spawn_gateway_with_config(test_config())
}

/// Spawn an engine over the scripted transport with a custom config
pub fn spawn_gateway_with_config(config: GatewayConfig) -> (Gateway, ConnectionFeed) {
    let (connector, feed) = MockConnector::pair();
    let credentials = Arc::new(StaticToken::new(TEST_TOKEN));
    (Gateway::new(config, connector, credentials), feed)
}
