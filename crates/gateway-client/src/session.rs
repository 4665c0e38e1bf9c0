//! Session and resume tracking
//!
//! Holds the `session_id` / last-seen sequence pair that outlives individual
//! socket attempts, and decides identify-vs-resume on each new connection.

use crate::protocol::ResumePayload;

/// Session state carried across socket attempts
#[derive(Debug, Clone, Default)]
pub struct SessionTracker {
    session_id: Option<String>,
    sequence: Option<i64>,
    resumable: bool,
}

impl SessionTracker {
    /// Fresh tracker with no session
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current session id, if any
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// The last recorded sequence number
    #[must_use]
    pub fn sequence(&self) -> Option<i64> {
        self.sequence
    }

    /// Whether a resume may be attempted
    #[must_use]
    pub fn resumable(&self) -> bool {
        self.resumable
    }

    /// Record a sequence number from an incoming envelope
    ///
    /// Sequence numbers are monotonically non-decreasing within a session;
    /// a stale number is ignored rather than applied out of order.
    pub fn record_sequence(&mut self, seq: i64) {
        if self.sequence.is_none_or(|current| seq >= current) {
            self.sequence = Some(seq);
        } else {
            tracing::warn!(
                seq,
                current = ?self.sequence,
                "Ignoring out-of-order sequence number"
            );
        }
    }

    /// Record a successful READY: the session is now resumable
    pub fn mark_ready(&mut self, session_id: impl Into<String>) {
        self.session_id = Some(session_id.into());
        self.resumable = true;
    }

    /// A resume succeeded on the existing session
    pub fn mark_resumed(&mut self) {
        self.resumable = true;
    }

    /// Invalidate the session
    ///
    /// With `resumable = false` the identifiers are cleared and the next
    /// connection must Identify; with `true` the session is kept for a
    /// later Resume.
    pub fn invalidate(&mut self, resumable: bool) {
        self.resumable = resumable;
        if !resumable {
            self.session_id = None;
            self.sequence = None;
        }
    }

    /// Build a Resume payload, or `None` if the caller must Identify
    ///
    /// Requires a session id AND a sequence number AND resumability.
    #[must_use]
    pub fn try_resume_payload(&self, token: &str) -> Option<ResumePayload> {
        if !self.resumable {
            return None;
        }
        let session_id = self.session_id.clone()?;
        let seq = self.sequence?;
        Some(ResumePayload {
            token: token.to_string(),
            session_id,
            seq,
        })
    }
}
