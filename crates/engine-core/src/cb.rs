use crate::retry::exponential_delay;
use std::time::Duration;

/// Counts consecutive transport failures of a repeated remote call.
///
/// Each failure below the threshold yields a backoff delay; reaching the
/// threshold opens the breaker and the caller is expected to give up.
/// A success closes it again.
#[derive(Clone, Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    consecutive_failures: u32,
    base_delay: Duration,
    max_delay: Duration,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CircuitBreakerState {
    RetryAfter(Duration),
    Open,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive_failures: 0,
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    pub fn record_failure(&mut self) -> CircuitBreakerState {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if self.consecutive_failures >= self.threshold {
            CircuitBreakerState::Open
        } else {
            let exponent = self.consecutive_failures.saturating_sub(1) as usize;
            CircuitBreakerState::RetryAfter(exponential_delay(
                self.base_delay,
                self.max_delay,
                exponent,
            ))
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_open(&self) -> bool {
        self.consecutive_failures >= self.threshold
    }
}
