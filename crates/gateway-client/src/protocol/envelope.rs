//! Gateway envelope codec
//!
//! All traffic is wrapped in `{"op": int, "d": any, "s": int|null, "t": string|null}`.
//! Incoming envelopes are decoded in a single discriminated step into the
//! [`Incoming`] variant for their opcode; outgoing envelopes omit `t`.

use super::{HelloPayload, IdentifyPayload, OpCode, PresencePayload, ResumePayload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw wire envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,

    /// Sequence number (only for op=0 Dispatch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<i64>,

    /// Event type (only for op=0 Dispatch); never serialized on the way out
    #[serde(skip_serializing)]
    #[serde(default)]
    pub t: Option<String>,
}

/// A fully decoded server-to-client envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// op 0 - named event with sequence number
    Dispatch {
        event: String,
        seq: Option<i64>,
        data: Value,
    },
    /// op 1 - server requests an immediate heartbeat
    Heartbeat,
    /// op 7 - server requests a reconnect
    Reconnect,
    /// op 9 - session rejected; `resumable` says whether Resume may be retried
    InvalidSession { resumable: bool },
    /// op 10 - connection greeting with the heartbeat interval
    Hello { heartbeat_interval: u64 },
    /// op 11 - heartbeat acknowledged
    HeartbeatAck,
}

impl Envelope {
    // === Outgoing constructors ===

    /// Create a Heartbeat envelope (op=1) carrying the last seen sequence
    #[must_use]
    pub fn heartbeat(last_sequence: Option<i64>) -> Self {
        Self {
            op: OpCode::Heartbeat,
            d: Some(last_sequence.map_or(Value::Null, |s| Value::Number(s.into()))),
            s: None,
            t: None,
        }
    }

    /// Create an Identify envelope (op=2)
    #[must_use]
    pub fn identify(payload: &IdentifyPayload) -> Self {
        Self {
            op: OpCode::Identify,
            d: serde_json::to_value(payload).ok(),
            s: None,
            t: None,
        }
    }

    /// Create a Resume envelope (op=6)
    #[must_use]
    pub fn resume(payload: &ResumePayload) -> Self {
        Self {
            op: OpCode::Resume,
            d: serde_json::to_value(payload).ok(),
            s: None,
            t: None,
        }
    }

    /// Create a Presence Update envelope (op=3)
    #[must_use]
    pub fn presence(payload: &PresencePayload) -> Self {
        Self {
            op: OpCode::PresenceUpdate,
            d: serde_json::to_value(payload).ok(),
            s: None,
            t: None,
        }
    }

    /// Create an envelope from a raw op and data payload
    #[must_use]
    pub fn raw(op: OpCode, data: Value) -> Self {
        Self {
            op,
            d: Some(data),
            s: None,
            t: None,
        }
    }

    // === Codec ===

    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode one incoming text message into its tagged variant
    pub fn decode(text: &str) -> Result<Incoming, ProtocolError> {
        let envelope: Self = serde_json::from_str(text)?;
        envelope.into_incoming()
    }

    /// Convert a parsed envelope into its [`Incoming`] variant
    pub fn into_incoming(self) -> Result<Incoming, ProtocolError> {
        match self.op {
            OpCode::Dispatch => {
                let event = self.t.ok_or(ProtocolError::MissingEventType)?;
                Ok(Incoming::Dispatch {
                    event,
                    seq: self.s,
                    data: self.d.unwrap_or(Value::Null),
                })
            }
            OpCode::Heartbeat => Ok(Incoming::Heartbeat),
            OpCode::Reconnect => Ok(Incoming::Reconnect),
            OpCode::InvalidSession => {
                // A missing or malformed flag means the session is gone for good
                let resumable = self.d.as_ref().and_then(Value::as_bool).unwrap_or(false);
                Ok(Incoming::InvalidSession { resumable })
            }
            OpCode::Hello => {
                let data = self.d.ok_or(ProtocolError::MissingData(OpCode::Hello))?;
                let hello: HelloPayload = serde_json::from_value(data)
                    .map_err(|source| ProtocolError::InvalidPayload { op: OpCode::Hello, source })?;
                Ok(Incoming::Hello {
                    heartbeat_interval: hello.heartbeat_interval,
                })
            }
            OpCode::HeartbeatAck => Ok(Incoming::HeartbeatAck),
            op => Err(ProtocolError::UnexpectedOp(op)),
        }
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "Envelope(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "Envelope(op={})", self.op)
        }
    }
}

/// Errors raised while decoding a single envelope
///
/// All of these are resilient failures: the envelope is dropped and the
/// stream continues.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to decode envelope: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dispatch envelope is missing its event type")]
    MissingEventType,

    #[error("envelope {0} is missing its data payload")]
    MissingData(OpCode),

    #[error("invalid payload for {op}: {source}")]
    InvalidPayload {
        op: OpCode,
        source: serde_json::Error,
    },

    #[error("server sent client-only op code: {0}")]
    UnexpectedOp(OpCode),
}
