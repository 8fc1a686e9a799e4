//! Delays between attempts to restore lost connectivity.
//!
//! The cluster worker asks a [`ReconnectionPolicy`] for a fresh
//! [`ReconnectionSchedule`] every time it starts retrying something
//! (a failed peer discovery pass, or reconnecting to the seeds after the pool
//! emptied), and drops the schedule once an attempt succeeds.

use std::time::Duration;

use rand::Rng;

/// Specifies how long to wait between reconnection attempts.
pub trait ReconnectionPolicy: std::fmt::Debug + Send + Sync {
    /// Called when a series of attempts starts.
    fn new_schedule(&self) -> Box<dyn ReconnectionSchedule>;
}

/// Delays of a single series of attempts.
pub trait ReconnectionSchedule: Send + Sync {
    /// Delay before the next attempt.
    fn next_delay(&mut self) -> Duration;
}

/// Waits the same amount of time before every attempt.
#[derive(Debug, Clone)]
pub struct ConstantReconnectionPolicy {
    delay: Duration,
}

impl ConstantReconnectionPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl ReconnectionPolicy for ConstantReconnectionPolicy {
    fn new_schedule(&self) -> Box<dyn ReconnectionSchedule> {
        Box::new(ConstantSchedule { delay: self.delay })
    }
}

struct ConstantSchedule {
    delay: Duration,
}

impl ReconnectionSchedule for ConstantSchedule {
    fn next_delay(&mut self) -> Duration {
        self.delay
    }
}

/// Doubles the delay after every attempt, starting at `base` and never
/// exceeding `max`.
///
/// With `jitter`, each delay is drawn uniformly from `[delay / 2, delay]`.
#[derive(Debug, Clone)]
pub struct ExponentialReconnectionPolicy {
    base: Duration,
    max: Duration,
    jitter: bool,
}

impl ExponentialReconnectionPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

impl Default for ExponentialReconnectionPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl ReconnectionPolicy for ExponentialReconnectionPolicy {
    fn new_schedule(&self) -> Box<dyn ReconnectionSchedule> {
        Box::new(ExponentialSchedule {
            current: self.base,
            max: self.max,
            jitter: self.jitter,
        })
    }
}

struct ExponentialSchedule {
    current: Duration,
    max: Duration,
    jitter: bool,
}

impl ReconnectionSchedule for ExponentialSchedule {
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = std::cmp::min(self.max, self.current.saturating_mul(2));
        if self.jitter && !delay.is_zero() {
            rand::rng().random_range(delay / 2..=delay)
        } else {
            delay
        }
    }
}
