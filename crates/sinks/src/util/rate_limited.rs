//! Rate-limited error logging
//!
//! Publish failures during an outage arrive at message rate; logging
//! each one would be unbounded. This logger emits at most one line per
//! interval and folds the suppressed count into the next line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between emitted lines
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Error logger that aggregates repeats
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log: Mutex<Option<Instant>>,
    suppressed: AtomicU64,
    total: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log: Mutex::new(None),
            suppressed: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Record an error; emit a log line if the interval has passed
    ///
    /// Returns true when the error was logged, false when suppressed.
    pub fn error(&self, context: &str, error: &dyn std::fmt::Display) -> bool {
        self.total.fetch_add(1, Ordering::Relaxed);

        let should_log = {
            let mut last = self.last_log.lock();
            let now = Instant::now();
            match *last {
                Some(at) if now.duration_since(at) < self.min_interval => false,
                _ => {
                    *last = Some(now);
                    true
                }
            }
        };

        if should_log {
            let suppressed = self.suppressed.swap(0, Ordering::Relaxed);
            tracing::error!(
                context = %context,
                error = %error,
                suppressed,
                total = self.total.load(Ordering::Relaxed),
                "sink error"
            );
        } else {
            self.suppressed.fetch_add(1, Ordering::Relaxed);
        }
        should_log
    }

    /// Errors recorded since construction
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn first_error_always_logs() {
        let logger = RateLimitedLogger::default();
        let err = io::Error::other("boom");
        assert!(logger.error("test", &err));
        assert_eq!(logger.total(), 1);
    }

    #[test]
    fn rapid_errors_are_suppressed() {
        let logger = RateLimitedLogger::new(Duration::from_secs(60));
        let err = io::Error::other("boom");

        assert!(logger.error("test", &err));
        for _ in 0..10 {
            assert!(!logger.error("test", &err));
        }
        assert_eq!(logger.total(), 11);
    }

    #[test]
    fn zero_interval_never_suppresses() {
        let logger = RateLimitedLogger::new(Duration::ZERO);
        let err = io::Error::other("boom");
        assert!(logger.error("test", &err));
        assert!(logger.error("test", &err));
    }
}
