//! Catalog handling for zx3dl
//!
//! This crate provides:
//! - A cache of catalog documents (`<cache>/db/`) with offline fallback
//! - Adapters normalizing each pack format into canonical items
//! - The aggregator merging adapter output into one catalog
//! - The selection filter

pub mod aggregate;
pub mod error;
pub mod filter;
pub mod sources;
pub mod store;

pub use aggregate::Catalog;
pub use error::{CatalogError, Result};
pub use filter::{filter, matches};
pub use sources::{build_sources, CatalogSource, MainCatalog, SourceOptions};
pub use store::{DocumentRef, FetchMode, MetadataStore};
