//! Merging adapter output into one catalog
//!
//! Adapters are merged in the order they were given. When two adapters
//! describe the same key the first description wins: later sources are
//! appended behind the existing ones (duplicate URLs dropped) and a
//! disagreeing size or hash is only reported.

use futures::future::join_all;
use std::collections::HashMap;
use tracing::{info, warn};
use zx3dl_core::types::{Failure, FailureKind, Item, ItemKey, RunReport};

use crate::sources::CatalogSource;

/// The merged, deduplicated item list
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Item>,
    index: HashMap<ItemKey, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Query every adapter and merge the results in adapter order
    ///
    /// A failing adapter is recorded as a metadata failure and contributes
    /// nothing; the others still merge.
    pub async fn build(sources: &[Box<dyn CatalogSource>]) -> (Self, RunReport) {
        let results = join_all(sources.iter().map(|source| source.fetch_catalog())).await;

        let mut catalog = Self::new();
        let mut report = RunReport::new();
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(items) => {
                    info!("{}: {} items", source.name(), items.len());
                    catalog.extend(source.name(), items, &mut report);
                }
                Err(err) => {
                    warn!("Catalog source {} failed: {}", source.name(), err);
                    report.record_failure(Failure::new(
                        source.name(),
                        FailureKind::MetadataFetch,
                        err.to_string(),
                    ));
                }
            }
        }
        (catalog, report)
    }

    /// Merge already fetched batches, first batch first
    pub fn from_batches<I>(batches: I) -> (Self, RunReport)
    where
        I: IntoIterator<Item = (String, Vec<Item>)>,
    {
        let mut catalog = Self::new();
        let mut report = RunReport::new();
        for (origin, items) in batches {
            catalog.extend(&origin, items, &mut report);
        }
        (catalog, report)
    }

    pub fn extend(&mut self, origin: &str, items: Vec<Item>, report: &mut RunReport) {
        for item in items {
            self.insert(origin, item, report);
        }
    }

    /// Add one item, merging it into an existing one with the same key
    pub fn insert(&mut self, origin: &str, item: Item, report: &mut RunReport) {
        let Some(&position) = self.index.get(&item.key) else {
            self.index.insert(item.key.clone(), self.items.len());
            self.items.push(item);
            return;
        };

        let existing = &mut self.items[position];
        if let (Some(kept), Some(other)) = (existing.size, item.size) {
            if kept != other {
                let message = format!(
                    "{}: {} declares size {}, keeping {}",
                    existing.key, origin, other, kept
                );
                warn!("{}", message);
                report.warn(message);
            }
        }
        if let (Some(kept), Some(other)) = (&existing.hash, &item.hash) {
            if kept != other {
                let message = format!(
                    "{}: {} declares {}, keeping {}",
                    existing.key, origin, other, kept
                );
                warn!("{}", message);
                report.warn(message);
            }
        }
        existing.size = existing.size.or(item.size);
        if existing.hash.is_none() {
            existing.hash = item.hash;
        }

        for source in item.sources {
            if !existing.sources.iter().any(|s| s.url == source.url) {
                existing.sources.push(source);
            }
        }
        for tag in item.tags {
            if !existing.tags.contains(&tag) {
                existing.tags.push(tag);
            }
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, key: &ItemKey) -> Option<&Item> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
