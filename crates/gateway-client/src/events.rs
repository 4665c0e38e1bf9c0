//! Public event feed
//!
//! Everything the engine reports to application code flows through
//! [`GatewayEvent`] on a broadcast channel. Transient network failures are
//! never surfaced here as errors; they only show up as connectivity changes.

use serde_json::Value;

/// Notification delivered to subscribers
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A named server event (opcode 0) with its payload
    Dispatch { event: String, data: Value },

    /// Connection/session state changed
    Connectivity {
        /// True while a session is open and application payloads may flow
        session_open: bool,
        /// Last known network reachability
        reachable: bool,
    },

    /// The server invalidated the session; informational only
    SessionInvalidated {
        /// Whether the existing session survived for a later Resume
        resumable: bool,
    },

    /// Terminal authentication failure; the engine will not reconnect
    /// until `open()` is called again
    AuthFailure { reason: String },
}

impl GatewayEvent {
    /// The dispatch event name, if this is a Dispatch
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        match self {
            Self::Dispatch { event, .. } => Some(event),
            _ => None,
        }
    }
}
