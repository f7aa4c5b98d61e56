//! Circuit breaker for the comment API
//!
//! After `threshold` consecutive failures the assistant reports itself
//! unavailable, so the executor goes straight to template comments instead
//! of paying for a request that is likely to fail.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests allowed
    Closed,
    /// Too many failures, requests rejected
    Open,
    /// Timeout elapsed, one request may test recovery
    HalfOpen,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct CircuitBreaker {
    failure_count: AtomicU32,
    last_failure: AtomicU64, // Unix timestamp millis
    threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            failure_count: AtomicU32::new(0),
            last_failure: AtomicU64::new(0),
            threshold: threshold.max(1),
            timeout,
        }
    }

    pub fn state(&self) -> CircuitState {
        if self.failure_count.load(Ordering::Relaxed) < self.threshold {
            return CircuitState::Closed;
        }

        let elapsed = now_millis().saturating_sub(self.last_failure.load(Ordering::Relaxed));
        if elapsed >= self.timeout.as_millis() as u64 {
            CircuitState::HalfOpen
        } else {
            CircuitState::Open
        }
    }

    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.last_failure.store(now_millis(), Ordering::Relaxed);
    }

    pub fn can_execute(&self) -> bool {
        self.state() != CircuitState::Open
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Milliseconds until a request may be tried, 0 unless open
    pub fn time_until_retry(&self) -> u64 {
        match self.state() {
            CircuitState::Open => {
                let elapsed =
                    now_millis().saturating_sub(self.last_failure.load(Ordering::Relaxed));
                (self.timeout.as_millis() as u64).saturating_sub(elapsed)
            }
            _ => 0,
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opens_after_threshold() {
        let cb = CircuitBreaker::new(2, Duration::from_secs(60));
        assert!(cb.can_execute());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.can_execute());
        assert!(cb.time_until_retry() > 0);
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::new(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_timeout() {
        let cb = CircuitBreaker::new(1, Duration::ZERO);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.can_execute());
        assert_eq!(cb.time_until_retry(), 0);
    }
}
