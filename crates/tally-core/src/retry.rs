//! Bounded retry policy
//!
//! Decoupled from the I/O call so tests can walk the schedule without real
//! delays.

use std::time::Duration;

/// A bounded retry schedule: fixed delay or exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    exponential: bool,
}

impl RetryPolicy {
    /// Retry up to `max_attempts` times with the same delay between tries.
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            exponential: false,
        }
    }

    /// Retry up to `max_attempts` times, doubling the delay each retry.
    #[must_use]
    pub const fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            exponential: true,
        }
    }

    /// The delay before the next try, given the number of attempts already
    /// made (starting at 1). `None` once the schedule is exhausted.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        if self.exponential {
            let factor = 2u32.saturating_pow(attempt - 1);
            Some(self.base_delay.saturating_mul(factor))
        } else {
            Some(self.base_delay)
        }
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
