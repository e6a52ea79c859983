//! The retry loop

use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Instant;

use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::policy::{calculate_delay, AlwaysRetry, RetryPredicate};

/// Retry executor for operations failing with `E`
///
/// The predicate `P` and observer `O` are swapped in with the `with_*`
/// builders; both default to accepting and ignoring everything.
pub struct RetryExecutor<E, P, O> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    _phantom: PhantomData<fn(&E)>,
}

impl<E> RetryExecutor<E, AlwaysRetry, NoOpObserver> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            _phantom: PhantomData,
        }
    }
}

impl<E, P, O> RetryExecutor<E, P, O> {
    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutor<E, P2, O> {
        RetryExecutor {
            policy: self.policy,
            predicate,
            observer: self.observer,
            _phantom: PhantomData,
        }
    }

    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutor<E, P, O2> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            _phantom: PhantomData,
        }
    }
}

impl<E, P, O> RetryExecutor<E, P, O>
where
    E: Display + Send + 'static,
    P: RetryPredicate<E>,
    O: RetryObserver,
{
    /// Run `op` until it succeeds, the predicate rejects an error, or
    /// `max_attempts` is reached. A policy with zero attempts still runs once.
    pub async fn execute<F, Fut, T>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.observer.on_attempt_start(attempt, max_attempts);

            let err = match op().await {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !self.predicate.should_retry(&err) {
                self.observer.on_rejected(attempt, &err);
                return Err(RetryError::NonRetryable {
                    attempt,
                    source: err,
                });
            }

            if attempt >= max_attempts {
                self.observer.on_exhausted(attempt, &err);
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    source: err,
                    total_duration: start.elapsed(),
                });
            }

            let delay = calculate_delay(&self.policy, attempt, true);
            self.observer.on_attempt_failed(attempt, &err, delay);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}
