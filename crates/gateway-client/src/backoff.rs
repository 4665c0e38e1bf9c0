//! Reconnect delay policy
//!
//! Decides whether and after what delay to attempt a new connection, given
//! the previous close code and the consecutive failure count. Fatal close
//! codes return no delay at all; the engine then surfaces an auth failure
//! and stops.

use crate::protocol::CloseCode;
use rand::Rng;
use std::time::Duration;

/// Capped exponential reconnect policy
///
/// `next_delay` is a pure function of the close code and attempt count; the
/// attempt counter itself lives with the engine and resets on every
/// successful `Hello`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_delay: Duration,
    /// Optional cap on consecutive failed attempts; `None` retries forever
    max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }

    /// Compute the delay before the next attempt
    ///
    /// Returns `None` when the close code is fatal (4004 and 4010-4014), or
    /// when the attempt cap is exhausted. Unknown and standard WebSocket
    /// close codes are retryable. `close_code` is `None` for socket errors
    /// that carried no close frame.
    #[must_use]
    pub fn next_delay(&self, close_code: Option<u16>, attempt: u32) -> Option<Duration> {
        if let Some(code) = close_code {
            if CloseCode::is_fatal_code(code) {
                return None;
            }
        }
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }

        let millis = u64::try_from(self.base_delay.as_millis())
            .unwrap_or(u64::MAX)
            .saturating_mul(2u64.saturating_pow(attempt));
        Some(Duration::from_millis(millis).min(self.max_delay))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: None,
        }
    }
}

/// Delay before re-identifying after an invalid session
///
/// The server mandates a uniform random 1-5 s wait here; this deliberately
/// bypasses [`ReconnectPolicy`] and its attempt counter.
#[must_use]
pub fn invalid_session_delay<R: Rng>(rng: &mut R) -> Duration {
    Duration::from_millis(rng.gen_range(1_000..=5_000))
}
