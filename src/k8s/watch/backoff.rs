use super::config::BackoffConfig;
use rand::Rng;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Exponential backoff with symmetric jitter.
///
/// Each call to [`Backoff::next`] counts as one attempt. The zero-jitter delay
/// for attempt `n` is `min(max, initial * multiplier^(n-1))`; jitter then moves
/// it by up to `± delay * jitter`, never below zero.
#[derive(Debug)]
pub struct Backoff {
    config: BackoffConfig,
    attempts: Mutex<u32>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}

impl Backoff {
    #[must_use]
    pub const fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            attempts: Mutex::new(0),
        }
    }

    // a panic while holding this lock cannot leave the counter half-written
    fn lock(&self) -> MutexGuard<'_, u32> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compute the next delay and count the attempt
    pub fn next(&self) -> Duration {
        let attempt = {
            let mut attempts = self.lock();
            *attempts = attempts.saturating_add(1);
            *attempts
        };
        let base = self.base_delay(attempt);
        self.jittered(base)
    }

    /// Zero-jitter delay for a given (1-based) attempt
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let max = self.config.max_delay.as_secs_f64();
        let secs = (self.config.initial_delay.as_secs_f64() * self.config.multiplier.powi(exponent))
            .min(max);
        if secs.is_finite() && secs >= 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            self.config.max_delay
        }
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let spread = delay.as_secs_f64() * self.config.jitter;
        if spread <= 0.0 || !spread.is_finite() {
            return delay;
        }
        let offset = rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64((delay.as_secs_f64() + offset).max(0.0))
    }

    /// Start the sequence over from the initial delay
    pub fn reset(&self) {
        *self.lock() = 0;
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        *self.lock()
    }

    #[must_use]
    pub const fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(jitter: f64) -> BackoffConfig {
        BackoffConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_zero_jitter_sequence_doubles_until_capped() {
        let backoff = Backoff::new(config(0.0));
        let delays: Vec<u64> = (0..8).map(|_| backoff.next().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30, 30]);
        assert_eq!(backoff.attempts(), 8);
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let backoff = Backoff::new(config(0.0));
        backoff.next();
        backoff.next();
        backoff.next();
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.next(), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = Backoff::new(config(0.1));
        for attempt in 1..=20 {
            let base = backoff.base_delay(attempt).as_secs_f64();
            let delay = backoff.next().as_secs_f64();
            assert!(
                (delay - base).abs() <= base * 0.1 + 1e-9,
                "attempt {attempt}: {delay} not within 10% of {base}"
            );
        }
    }

    #[test]
    fn test_huge_attempt_counts_saturate_at_max() {
        let backoff = Backoff::new(config(0.0));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_full_jitter_never_goes_negative() {
        let backoff = Backoff::new(config(1.0));
        for _ in 0..50 {
            // Duration cannot be negative; this exercises the clamp path
            let _ = backoff.next();
        }
        assert_eq!(backoff.attempts(), 50);
    }

    #[test]
    fn test_default_matches_constants() {
        let backoff = Backoff::default();
        assert_eq!(backoff.config().initial_delay, Duration::from_secs(1));
        assert_eq!(backoff.config().max_delay, Duration::from_secs(30));
    }
}
