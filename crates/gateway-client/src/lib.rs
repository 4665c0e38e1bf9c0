//! # gateway-client
//!
//! Resilient client for a real-time, opcode-tagged WebSocket gateway.
//!
//! The crate maintains a long-lived session against a remote service that can
//! drop connections at any time, transparently resuming or re-identifying,
//! while reassembling a zlib-stream compressed event feed and exposing the
//! decoded events to application code.

pub mod backoff;
pub mod compression;
pub mod credentials;
pub mod engine;
pub mod events;
pub mod heartbeat;
pub mod protocol;
pub mod session;
pub mod transport;

pub use backoff::ReconnectPolicy;
pub use credentials::{CredentialError, CredentialProvider, StaticToken};
pub use engine::{Gateway, GatewayConfig, IdentifyMode};
pub use events::GatewayEvent;
pub use protocol::{CloseCode, Intents, OpCode};
pub use session::SessionTracker;
