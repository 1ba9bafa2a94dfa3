//! Retry policy for command execution
//!
//! The policy decides whether a failed attempt is retried or handed to
//! compensation. All attempts for one command happen inside a single
//! `execute_next` call, so the policy never changes how fast the queue
//! shrinks, only how hard each entry is tried.

use std::time::Duration;

use sagaq_command::ExecutionError;

/// How many times to attempt a command before compensating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first, always at least 1
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, failures compensate immediately
    #[inline]
    #[must_use]
    pub fn compensate_immediately() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// Allow up to `max_attempts` attempts with no backoff
    ///
    /// Zero is treated as 1; a command is always attempted once.
    #[inline]
    #[must_use]
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Duration::ZERO,
        }
    }

    /// Set a fixed delay between attempts
    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Decide whether another attempt is warranted
    ///
    /// Retries stop when attempts are exhausted or the failure is permanent
    /// (`is_retryable` is false).
    #[inline]
    #[must_use]
    pub fn should_retry(&self, attempts_so_far: u32, error: &ExecutionError) -> bool {
        attempts_so_far < self.max_attempts && error.is_retryable()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::compensate_immediately()
    }
}
