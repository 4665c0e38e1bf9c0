//! Heartbeat cadence tracking
//!
//! Owns the beat schedule and the single-outstanding-ack invariant. The
//! engine drives this from one timer arm: sleep until [`Heartbeat::next_deadline`],
//! then act on [`Heartbeat::on_deadline`].

use std::time::Duration;
use tokio::time::Instant;

/// Fraction of the interval allowed for an ack to arrive after a beat
const ACK_TOLERANCE: f64 = 0.25;

/// What the engine must do when a heartbeat deadline fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatAction {
    /// Send a heartbeat envelope now
    Beat,
    /// The previous beat was never acknowledged; the connection is dead
    Timeout,
}

/// Heartbeat state for one socket connection
///
/// Created on `Hello`, dropped with the socket. At most one heartbeat is
/// unacknowledged at any time.
#[derive(Debug)]
pub struct Heartbeat {
    interval: Duration,
    ack_pending: bool,
    next_beat: Instant,
    ack_deadline: Option<Instant>,
}

impl Heartbeat {
    /// Start the cadence with the first beat after `interval * first_beat_fraction`
    ///
    /// The fraction is clamped to `[0, 1]`; the protocol mandates a uniformly
    /// random first-beat delay to spread reconnect herds.
    #[must_use]
    pub fn start(interval: Duration, now: Instant, first_beat_fraction: f64) -> Self {
        let fraction = first_beat_fraction.clamp(0.0, 1.0);
        Self {
            interval,
            ack_pending: false,
            next_beat: now + interval.mul_f64(fraction),
            ack_deadline: None,
        }
    }

    /// Start the cadence with a random first-beat delay
    #[must_use]
    pub fn start_jittered(interval: Duration, now: Instant) -> Self {
        Self::start(interval, now, rand::random::<f64>())
    }

    /// The configured beat interval
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a beat is awaiting its ack
    #[must_use]
    pub fn ack_pending(&self) -> bool {
        self.ack_pending
    }

    /// The next instant the engine must wake up at
    #[must_use]
    pub fn next_deadline(&self) -> Instant {
        match self.ack_deadline {
            Some(deadline) => deadline.min(self.next_beat),
            None => self.next_beat,
        }
    }

    /// Handle the deadline firing at `now`
    ///
    /// Returns [`BeatAction::Timeout`] when the outstanding beat's ack window
    /// has lapsed, or when the cadence reaches the next beat with an ack
    /// still pending; a second heartbeat is never sent over an
    /// unacknowledged one.
    pub fn on_deadline(&mut self, now: Instant) -> BeatAction {
        if self.ack_pending {
            // The ack window always closes before the next beat, so any
            // wakeup with an ack outstanding is a dead connection.
            return BeatAction::Timeout;
        }

        self.ack_pending = true;
        self.ack_deadline = Some(now + self.interval.mul_f64(ACK_TOLERANCE));
        self.next_beat = now + self.interval;
        BeatAction::Beat
    }

    /// Record an ack; returns false if none was pending (ignored, not an error)
    pub fn on_ack(&mut self) -> bool {
        if !self.ack_pending {
            return false;
        }
        self.ack_pending = false;
        self.ack_deadline = None;
        true
    }
}
