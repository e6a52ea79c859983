//! Backoff delays and retryability predicates

use crate::types::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::time::Duration;

/// Delay to wait after `attempt` (1-indexed) failed
///
/// Exponential: `initial * multiplier^(attempt-1)`, capped at `max_delay_ms`.
/// With `jitter`, up to 25% is added on top of the capped value.
///
/// ```rust
/// use zx3dl_core::retry::calculate_delay;
/// use zx3dl_core::types::RetryPolicy;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 1000);
/// assert_eq!(calculate_delay(&policy, 2, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(attempt_index as f64);
            (policy.initial_delay_ms as f64 * multiplier) as u64
        }
        RetryStrategy::LinearBackoff => {
            policy.initial_delay_ms.saturating_mul(attempt_index as u64 + 1)
        }
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms + rand::rng().random_range(0..=jitter_range)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether an error deserves another attempt
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Retries every error
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// Errors that may carry an HTTP status
pub trait HttpStatusError {
    /// The response status, when the failure came from a response
    fn status_code(&self) -> Option<u16>;

    /// Whether a failure without a status (connection reset, timeout) is
    /// transient. Errors that are never transient, such as a digest
    /// mismatch, override this.
    fn is_transient(&self) -> bool {
        true
    }
}

/// Retries transient transport failures and a fixed set of statuses
#[derive(Debug, Clone)]
pub struct HttpStatusPredicate {
    retryable_codes: Vec<u16>,
    retry_server_errors: bool,
}

impl HttpStatusPredicate {
    /// 408, 425, 429 and every 5xx
    pub fn default_http() -> Self {
        Self {
            retryable_codes: vec![408, 425, 429],
            retry_server_errors: true,
        }
    }

    pub fn is_retryable_code(&self, code: u16) -> bool {
        (self.retry_server_errors && (500..600).contains(&code))
            || self.retryable_codes.contains(&code)
    }
}

impl<E: HttpStatusError> RetryPredicate<E> for HttpStatusPredicate {
    fn should_retry(&self, error: &E) -> bool {
        match error.status_code() {
            Some(code) => self.is_retryable_code(code),
            None => error.is_transient(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: RetryStrategy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            strategy,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
        }
    }

    #[test]
    fn test_none_strategy_never_waits() {
        let p = policy(RetryStrategy::None);
        assert_eq!(calculate_delay(&p, 1, true), Duration::ZERO);
        assert_eq!(calculate_delay(&p, 4, true), Duration::ZERO);
    }

    #[test]
    fn test_fixed_and_linear() {
        let fixed = policy(RetryStrategy::FixedDelay);
        assert_eq!(calculate_delay(&fixed, 3, false), Duration::from_millis(1000));

        let linear = policy(RetryStrategy::LinearBackoff);
        assert_eq!(calculate_delay(&linear, 3, false), Duration::from_millis(3000));
    }

    #[test]
    fn test_exponential_is_capped() {
        let p = policy(RetryStrategy::ExponentialBackoff);
        assert_eq!(calculate_delay(&p, 3, false), Duration::from_millis(4000));
        assert_eq!(calculate_delay(&p, 10, false), Duration::from_millis(30000));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let p = policy(RetryStrategy::ExponentialBackoff);
        for _ in 0..50 {
            let delay = calculate_delay(&p, 2, true).as_millis();
            assert!((2000..=2500).contains(&delay));
        }
    }

    struct Status(Option<u16>, bool);

    impl HttpStatusError for Status {
        fn status_code(&self) -> Option<u16> {
            self.0
        }
        fn is_transient(&self) -> bool {
            self.1
        }
    }

    #[test]
    fn test_http_predicate() {
        let p = HttpStatusPredicate::default_http();
        assert!(p.should_retry(&Status(Some(500), true)));
        assert!(p.should_retry(&Status(Some(507), true)));
        assert!(p.should_retry(&Status(Some(429), true)));
        assert!(!p.should_retry(&Status(Some(404), true)));
        assert!(!p.should_retry(&Status(Some(403), true)));
        assert!(p.should_retry(&Status(None, true)));
        assert!(!p.should_retry(&Status(None, false)));
    }
}
