/**
 * Configuration constants for the watch manager and its resource watchers
 */
use std::time::Duration;
use tracing::Span;

/// Capacity of the shared watch event queue
pub const EVENT_QUEUE_CAPACITY: usize = 100;

/// Capacity of the shared watch error queue
pub const ERROR_QUEUE_CAPACITY: usize = 100;

/// First retry delay in milliseconds
pub const INITIAL_BACKOFF_MILLIS: u64 = 1000;

/// Maximum backoff time in seconds between reconnect attempts
pub const MAX_BACKOFF_SECONDS: u64 = 30;

/// Growth factor applied to the delay on every consecutive failure
pub const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Fraction of the delay used as symmetric random jitter (0.1 = ±10%)
pub const BACKOFF_JITTER: f64 = 0.1;

/// Watch stream timeout in seconds (294 vs 300 to allow 6 seconds for graceful shutdown)
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// Pause before reopening a stream the server closed cleanly, in milliseconds
pub const RECONNECT_FLOOR_MILLIS: u64 = 1000;

/// Retry delay policy for a single watcher
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Fraction of the computed delay, applied as `delay ± delay * jitter`
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(INITIAL_BACKOFF_MILLIS),
            max_delay: Duration::from_secs(MAX_BACKOFF_SECONDS),
            multiplier: BACKOFF_MULTIPLIER,
            jitter: BACKOFF_JITTER,
        }
    }
}

impl BackoffConfig {
    /// Same delays every time, handy for tests and deterministic tooling
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }
}

/// Settings shared by the watch manager and every watcher it creates
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub event_queue_capacity: usize,
    pub error_queue_capacity: usize,
    pub backoff: BackoffConfig,
    /// Delay before reconnecting after the server ends a stream without error
    pub reconnect_floor: Duration,
    /// Parent span for every watcher span; `Span::none()` keeps them detached
    pub span: Span,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            event_queue_capacity: EVENT_QUEUE_CAPACITY,
            error_queue_capacity: ERROR_QUEUE_CAPACITY,
            backoff: BackoffConfig::default(),
            reconnect_floor: Duration::from_millis(RECONNECT_FLOOR_MILLIS),
            span: Span::none(),
        }
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(EVENT_QUEUE_CAPACITY > 0, "EVENT_QUEUE_CAPACITY must be greater than 0");
    assert!(ERROR_QUEUE_CAPACITY > 0, "ERROR_QUEUE_CAPACITY must be greater than 0");
    assert!(INITIAL_BACKOFF_MILLIS > 0, "INITIAL_BACKOFF_MILLIS must be greater than 0");
    assert!(MAX_BACKOFF_SECONDS > 0, "MAX_BACKOFF_SECONDS must be greater than 0");
    assert!(
        INITIAL_BACKOFF_MILLIS <= MAX_BACKOFF_SECONDS * 1000,
        "INITIAL_BACKOFF_MILLIS must not exceed MAX_BACKOFF_SECONDS"
    );
    assert!(WATCH_TIMEOUT_SECONDS > 0, "WATCH_TIMEOUT_SECONDS must be greater than 0");
};
