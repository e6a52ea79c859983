//! Packs shipped as one container ZIP

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::sync::Arc;
use zx3dl_core::types::{ArchiveRef, Checksum, DestTemplate, Item, ItemKey, Source};

use super::{ordered_entries, CatalogSource, Pack};
use crate::error::{CatalogError, Result};
use crate::store::{FetchMode, MetadataStore};

#[derive(Debug, Clone, Deserialize)]
pub struct ZipDocument {
    /// URL of the container ZIP
    pub base_url: String,
    #[serde(default)]
    pub base_size: Option<u64>,
    #[serde(default)]
    pub base_hash: Option<String>,
    /// Member path to placement
    #[serde(deserialize_with = "ordered_entries")]
    pub files: Vec<(String, MemberEntry)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberEntry {
    #[serde(default)]
    pub path: Vec<String>,
    pub file: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

pub struct ZipPackSource {
    pack: Pack,
    store: Arc<MetadataStore>,
}

impl ZipPackSource {
    pub fn new(pack: Pack, store: Arc<MetadataStore>) -> Self {
        Self { pack, store }
    }
}

#[async_trait]
impl CatalogSource for ZipPackSource {
    fn name(&self) -> &str {
        &self.pack.name
    }

    async fn fetch_catalog(&self) -> Result<Vec<Item>> {
        let doc_ref = self.pack.document()?;
        let doc: ZipDocument = self.store.load(&doc_ref, FetchMode::UseCache).await?;
        zip_items(&self.pack.name, &doc)
    }
}

/// One item per member, each sourced from the shared container
pub fn zip_items(namespace: &str, doc: &ZipDocument) -> Result<Vec<Item>> {
    if doc.base_url.trim().is_empty() {
        return Err(CatalogError::invalid_pack(namespace, "empty base_url"));
    }
    let container_hash = Checksum::md5_opt(doc.base_hash.as_deref());
    let container_size = doc.base_size.filter(|size| *size > 0);

    let items = doc
        .files
        .iter()
        .map(|(member, entry)| {
            let dir: Utf8PathBuf = entry.path.iter().filter(|p| !p.is_empty()).collect();
            let source = Source::new(&doc.base_url)
                .with_size(entry.size)
                .with_hash(Checksum::md5_opt(entry.hash.as_deref()))
                .in_archive(ArchiveRef {
                    member: member.clone(),
                    container_size,
                    container_hash: container_hash.clone(),
                });
            Item::new(
                ItemKey::new(namespace, member),
                &entry.file,
                DestTemplate::new(dir, &entry.file),
                source,
            )
        })
        .collect();
    Ok(items)
}
