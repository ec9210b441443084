//! Idle and keep-alive deadlines.
//!
//! The engine never sleeps itself. It records when each timer should
//! fire and the session loop waits on whichever deadline is set.

use std::time::{Duration, Instant};

/// The two independent timers of a session; each holds at most one
/// deadline at a time.
#[derive(Debug, Clone)]
pub struct Timers {
    idle_timeout: Duration,
    keepalive_interval: Duration,
    idle: Option<Instant>,
    keepalive: Option<Instant>,
}

impl Timers {
    pub fn new(idle_timeout: Duration, keepalive_interval: Duration) -> Self {
        Self {
            idle_timeout,
            keepalive_interval,
            idle: None,
            keepalive: None,
        }
    }

    /// (Re)start the stall detector for the command in flight.
    pub fn arm_idle(&mut self, now: Instant) {
        self.idle = Some(now + self.idle_timeout);
    }

    pub fn clear_idle(&mut self) {
        self.idle = None;
    }

    /// Schedule the next look at the queue.
    pub fn arm_keepalive(&mut self, now: Instant) {
        self.keepalive = Some(now + self.keepalive_interval);
    }

    pub fn clear_keepalive(&mut self) {
        self.keepalive = None;
    }

    pub fn clear_all(&mut self) {
        self.idle = None;
        self.keepalive = None;
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        self.idle
    }

    pub fn keepalive_deadline(&self) -> Option<Instant> {
        self.keepalive
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }
}
