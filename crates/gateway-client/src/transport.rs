//! Socket abstraction
//!
//! The engine is written against the [`Connector`]/[`Socket`] traits so one
//! implementation serves every platform and tests can inject a scripted
//! transport. The production implementation rides on tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// One received WebSocket frame, reduced to what the engine consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text message (uncompressed transport)
    Text(String),
    /// Binary message (one chunk of the compressed stream)
    Binary(Vec<u8>),
    /// Close frame with the server's close code, if any
    Close(Option<u16>),
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("socket error: {0}")]
    Socket(String),
}

/// Opens gateway sockets
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to `url`
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError>;
}

/// One live gateway socket
#[async_trait]
pub trait Socket: Send {
    /// Receive the next frame; `None` when the stream has ended
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;

    /// Send one text message
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Close the socket, optionally with a close code
    async fn close(&mut self, code: Option<u16>) -> Result<(), TransportError>;
}

/// Production connector over tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Socket>, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(WsSocket { stream }))
    }
}

struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

#[async_trait]
impl Socket for WsSocket {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(TransportError::Socket(e.to_string()))),
            };

            match message {
                Message::Text(text) => return Some(Ok(Frame::Text(text.to_string()))),
                Message::Binary(bytes) => return Some(Ok(Frame::Binary(bytes.to_vec()))),
                Message::Close(frame) => {
                    return Some(Ok(Frame::Close(frame.map(|f| f.code.into()))));
                }
                // Ping/Pong are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }

    async fn close(&mut self, code: Option<u16>) -> Result<(), TransportError> {
        let frame = code.map(|code| CloseFrame {
            code: WsCloseCode::from(code),
            reason: String::new().into(),
        });
        self.stream
            .close(frame)
            .await
            .map_err(|e| TransportError::Socket(e.to_string()))
    }
}
