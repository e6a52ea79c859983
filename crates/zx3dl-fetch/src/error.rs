//! Error types for zx3dl-fetch

use std::path::PathBuf;
use thiserror::Error;
use zx3dl_core::retry::HttpStatusError;
use zx3dl_core::types::FailureKind;

pub type Result<T> = std::result::Result<T, FetchError>;

#[derive(Error, Debug)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    /// Connection, timeout or body stream failure
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// The server rejected the byte range of a resumed transfer
    #[error("Range not satisfiable for {url}, restarting")]
    RangeRejected { url: String },

    /// Size or digest mismatch
    #[error("Integrity check failed for {subject}: {message}")]
    Integrity { subject: String, message: String },

    /// Local filesystem failure
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The container could not be opened or lacks the member
    #[error("Archive error in {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    /// Every source of an item failed
    #[error("All sources failed for {item}: {last}")]
    AllSourcesFailed {
        item: String,
        last: Box<FetchError>,
    },

    /// Item without sources
    #[error("No sources declared for {item}")]
    NoSources { item: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    pub fn network(url: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub fn integrity(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Integrity {
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn archive(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Run-report category for this error
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Integrity { .. } | Self::Archive { .. } => FailureKind::Integrity,
            Self::Filesystem { .. } => FailureKind::Filesystem,
            Self::AllSourcesFailed { last, .. } => match last.failure_kind() {
                FailureKind::Integrity => FailureKind::Integrity,
                FailureKind::Filesystem => FailureKind::Filesystem,
                _ => FailureKind::Download,
            },
            _ => FailureKind::Download,
        }
    }
}

impl HttpStatusError for FetchError {
    fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::RangeRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zx3dl_core::retry::{HttpStatusPredicate, RetryPredicate};

    #[test]
    fn test_retry_classification() {
        let predicate = HttpStatusPredicate::default_http();
        let http = |status| FetchError::Http {
            url: "u".into(),
            status,
        };
        assert!(predicate.should_retry(&http(503)));
        assert!(predicate.should_retry(&http(429)));
        assert!(!predicate.should_retry(&http(404)));
        assert!(predicate.should_retry(&FetchError::network("u", "reset")));
        assert!(predicate.should_retry(&FetchError::RangeRejected { url: "u".into() }));
        assert!(!predicate.should_retry(&FetchError::integrity("x", "bad md5")));
    }

    #[test]
    fn test_failure_kind_follows_last_error() {
        let err = FetchError::AllSourcesFailed {
            item: "ZX3/x".into(),
            last: Box::new(FetchError::integrity("ZX3/x", "size 3 != 4")),
        };
        assert_eq!(err.failure_kind(), FailureKind::Integrity);

        let err = FetchError::AllSourcesFailed {
            item: "ZX3/x".into(),
            last: Box::new(FetchError::Http {
                url: "u".into(),
                status: 500,
            }),
        };
        assert_eq!(err.failure_kind(), FailureKind::Download);
    }
}
