//! Per-run failure and retry accounting

use std::fmt;

/// Category of a per-item failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A catalog document could not be fetched or parsed
    MetadataFetch,
    /// Every source of an item failed
    Download,
    /// Bytes arrived but did not match the declared size or hash
    Integrity,
    /// Writing into the cache or destination tree failed
    Filesystem,
    /// The arcade converter could not produce an ARC file
    Conversion,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::MetadataFetch => "metadata fetch failure",
            FailureKind::Download => "download failure",
            FailureKind::Integrity => "integrity failure",
            FailureKind::Filesystem => "filesystem failure",
            FailureKind::Conversion => "conversion failure",
        };
        f.write_str(label)
    }
}

/// One failed item or adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Item key, adapter name or path the failure is about
    pub subject: String,
    pub kind: FailureKind,
    pub reason: String,
}

impl Failure {
    pub fn new(subject: impl Into<String>, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            kind,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.subject, self.kind, self.reason)
    }
}

/// A source that failed before another one succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent {
    pub subject: String,
    pub url: String,
    pub reason: String,
}

/// Everything the end-of-run summary reports
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub installed: usize,
    pub skipped: usize,
    pub failures: Vec<Failure>,
    pub retries: Vec<RetryEvent>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, failure: Failure) {
        self.failures.push(failure);
    }

    pub fn record_retry(&mut self, event: RetryEvent) {
        self.retries.push(event);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Failures that concern items rather than catalog documents
    pub fn item_failures(&self) -> impl Iterator<Item = &Failure> {
        self.failures
            .iter()
            .filter(|f| f.kind != FailureKind::MetadataFetch)
    }

    pub fn has_item_failures(&self) -> bool {
        self.item_failures().next().is_some()
    }

    pub fn merge(&mut self, other: RunReport) {
        self.installed += other.installed;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
        self.retries.extend(other.retries);
        self.warnings.extend(other.warnings);
    }
}
