//! Error returned when a retried operation gives up

use std::error::Error;
use std::fmt;
use std::time::Duration;

/// Outcome of a failed retry loop, generic over the operation's error `E`
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a retryable error
    Exhausted {
        attempts: u32,
        source: E,
        total_duration: Duration,
    },

    /// The predicate rejected the error; no further attempts were made
    NonRetryable { attempt: u32, source: E },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                source,
                total_duration,
            } => write!(
                f,
                "gave up after {} attempts over {:.2}s: {}",
                attempts,
                total_duration.as_secs_f64(),
                source
            ),
            RetryError::NonRetryable { source, .. } => write!(f, "{}", source),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source),
            RetryError::NonRetryable { source, .. } => Some(source),
        }
    }
}

impl<E> RetryError<E> {
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::NonRetryable { attempt, .. } => *attempt,
        }
    }

    /// The error from the last attempt
    pub fn into_source(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } => source,
            RetryError::NonRetryable { source, .. } => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_exhausted_display_and_source() {
        let err: RetryError<io::Error> = RetryError::Exhausted {
            attempts: 3,
            source: io::Error::new(io::ErrorKind::TimedOut, "timed out"),
            total_duration: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "gave up after 3 attempts over 1.50s: timed out");
        assert!(matches!(err, RetryError::Exhausted { .. }));
        assert_eq!(err.attempts(), 3);
        assert!(Error::source(&err).is_some());
    }

    #[test]
    fn test_non_retryable_passes_through_message() {
        let err = RetryError::NonRetryable {
            attempt: 1,
            source: io::Error::new(io::ErrorKind::NotFound, "HTTP 404"),
        };
        assert_eq!(err.to_string(), "HTTP 404");
        assert_eq!(err.into_source().kind(), io::ErrorKind::NotFound);
    }
}
