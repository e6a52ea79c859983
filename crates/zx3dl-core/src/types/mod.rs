//! Type definitions shared by every zx3dl crate

mod checksum;
mod item;
mod report;
mod runtime_config;
mod selection;

pub use checksum::{file_checksum, Checksum, ChecksumAlgorithm, ChecksumHasher};
pub use item::{ArcadeCore, ArchiveRef, DestTemplate, Item, ItemKey, ItemRole, Source};
pub use report::{Failure, FailureKind, RetryEvent, RunReport};
pub use runtime_config::{
    CatalogConfig, NetworkConfig, RetryPoliciesConfig, RetryPolicy, RetryStrategy, RuntimeConfig,
};
pub use selection::{CoreType, GroupingMode, KeepPolicy, Kind, Selection, Tag};
