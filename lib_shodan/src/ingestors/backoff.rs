//! Reconnect pacing for stream subscriptions.

use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

/// Whole milliseconds of `duration`, saturating at `u64::MAX`.
pub fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Exponential backoff with a cap and additive random jitter.
///
/// The wait before reconnect number `n` (counting from 1) is
/// `min(base * 2^(n-1), cap) + rand(0..=jitter)`. After `max_attempts`
/// consecutive failed reconnects the subscription gives up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub max_attempts: u32,
    pub jitter: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(1_000),
            cap: Duration::from_millis(60_000),
            max_attempts: 10,
            jitter: Duration::from_millis(500),
        }
    }
}

impl BackoffPolicy {
    /// Deterministic part of the wait after `failures` consecutive failures
    /// (the first failure waits `base`).
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// [`delay_for`](Self::delay_for) plus uniform jitter.
    pub fn jittered(&self, failures: u32) -> Duration {
        let jitter_ms = whole_millis(self.jitter);
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.delay_for(failures) + Duration::from_millis(extra)
    }

    pub fn exhausted(&self, failures: u32) -> bool {
        failures > self.max_attempts
    }
}

/// Backoff bookkeeping of one subscription.
///
/// This is not a resume position: the service keeps no offsets, so a
/// reconnect only resets pacing. Whatever was published while disconnected
/// is gone, which is why every reconnect is reported to the consumer.
#[derive(Debug, Clone, Default)]
pub struct StreamCursor {
    connected_at: Option<Instant>,
    failures: u32,
}

impl StreamCursor {
    /// Records bytes from the current connection. Returns `true` for the first
    /// delivery of a connection; that delivery resets the failure count.
    pub fn record_delivery(&mut self) -> bool {
        if self.connected_at.is_some() {
            return false;
        }
        self.connected_at = Some(Instant::now());
        self.failures = 0;
        true
    }

    /// Records a failed connection and returns the consecutive failure count.
    pub fn record_failure(&mut self) -> u32 {
        self.connected_at = None;
        self.failures = self.failures.saturating_add(1);
        self.failures
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// When the current connection first delivered data.
    pub fn connected_at(&self) -> Option<Instant> {
        self.connected_at
    }
}
