//! Gateway wire protocol
//!
//! Opcodes, close codes, payload structures and the envelope codec.

mod close_codes;
mod envelope;
mod intents;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use envelope::{Envelope, Incoming, ProtocolError};
pub use intents::Intents;
pub use opcodes::OpCode;
pub use payloads::{
    ConnectionProperties, HelloPayload, IdentifyPayload, PresencePayload, ReadyPayload,
    ResumePayload,
};
