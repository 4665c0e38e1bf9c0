//! Payload definitions
//!
//! Structures carried in the `d` field of lifecycle envelopes.

use super::Intents;
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
///
/// Sent by the server immediately after connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
///
/// Establishes a brand-new session. Bot sessions declare `intents`; user
/// sessions declare `capabilities`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,

    /// Client connection properties (OS/client metadata)
    pub properties: ConnectionProperties,

    /// Whether payload compression was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,

    /// Intents bitfield (bot mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intents: Option<Intents>,

    /// Capabilities bitfield (user mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<u64>,
}

/// Client connection properties sent in Identify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system
    pub os: String,

    /// Client/browser name
    pub browser: String,

    /// Device type
    pub device: String,
}

impl ConnectionProperties {
    /// Properties describing this library on the current platform
    #[must_use]
    pub fn library() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "gateway-client".to_string(),
            device: "gateway-client".to_string(),
        }
    }

    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = os.into();
        self
    }

    /// Set client name
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = browser.into();
        self
    }

    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self::library()
    }
}

/// Payload for op 6 (Resume)
///
/// Re-attaches to a prior session, replaying everything past `seq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Authentication token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: i64,
}

/// Payload for op 3 (Presence Update)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePayload {
    /// New status (online, idle, dnd, offline)
    pub status: String,
}

impl PresencePayload {
    /// Valid status values
    pub const VALID_STATUSES: &'static [&'static str] = &["online", "idle", "dnd", "offline"];

    /// Check if the status is valid
    #[must_use]
    pub fn is_valid_status(&self) -> bool {
        Self::VALID_STATUSES.contains(&self.status.as_str())
    }
}

/// Subset of the READY dispatch payload the engine cares about
///
/// The full READY event carries the entire initial state; only the session
/// identity is decoded here, the rest is forwarded verbatim to subscribers.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyPayload {
    /// Session ID used for later Resume attempts
    pub session_id: String,
}
