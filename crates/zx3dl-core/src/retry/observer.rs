//! Hooks for watching retry loops

use std::fmt::Display;
use std::time::Duration;

/// Receives callbacks while a [`RetryExecutor`](super::RetryExecutor) runs
pub trait RetryObserver: Send + Sync {
    /// An attempt (1-indexed) is about to start
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32);

    /// An attempt failed and another one follows after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration);

    fn on_success(&self, attempt: u32, total_duration: Duration);

    /// The last allowed attempt failed
    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display);

    /// The predicate refused to retry
    fn on_rejected(&self, attempt: u32, error: &dyn Display) {
        let _ = (attempt, error);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Display) {}
}

/// Logs retry events through `tracing`
///
/// Attempt starts at TRACE, failures that will be retried at WARN, success
/// after a retry at INFO, exhaustion at ERROR and rejected errors at DEBUG
/// (the caller reports those itself).
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::trace!(
            operation = %self.operation,
            attempt,
            max_attempts,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Display) {
        tracing::error!(
            operation = %self.operation,
            attempts,
            error = %final_error,
            "all retry attempts exhausted"
        );
    }

    fn on_rejected(&self, attempt: u32, error: &dyn Display) {
        tracing::debug!(
            operation = %self.operation,
            attempt,
            error = %error,
            "error is not retryable"
        );
    }
}
