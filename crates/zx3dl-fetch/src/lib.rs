//! Artifact cache and download engine for zx3dl
//!
//! This crate provides:
//! - Resumable, retried HTTP transfers with size and digest verification
//! - A persistent per-item cache with on-disk `entry.json` records
//! - Extraction of single members from cached container ZIPs
//! - A keyed lock table so concurrent resolutions of one key never race

pub mod archive;
pub mod cache;
pub mod download;
pub mod entry;
pub mod error;
pub mod locks;

pub use cache::{CacheManager, Resolved, SourceFailure};
pub use download::{DownloadEngine, Transfer, TransferRequest};
pub use entry::CacheEntry;
pub use error::{FetchError, Result};
pub use locks::KeyedLocks;
