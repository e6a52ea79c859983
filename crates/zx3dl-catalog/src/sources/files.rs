//! Packs of individually downloaded files

use async_trait::async_trait;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use zx3dl_core::types::{Checksum, CoreType, DestTemplate, Item, ItemKey, Kind, Source};

use super::{file_name_of, ordered_entries, CatalogSource, Pack, TagDictionary, TagId};
use crate::error::{CatalogError, Result};
use crate::store::{FetchMode, MetadataStore};

#[derive(Debug, Clone, Deserialize)]
pub struct FilesDocument {
    #[serde(default, deserialize_with = "ordered_entries")]
    pub files: Vec<(String, FileEntry)>,
    /// Without a dictionary the pack is untagged and every file is a plain file
    #[serde(default)]
    pub tag_dictionary: TagDictionary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    pub url: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, rename = "type")]
    pub core_type: Option<String>,
    #[serde(default)]
    pub tags: Vec<TagId>,
    /// Subdirectories below the pack's output directory
    #[serde(default)]
    pub path: Vec<String>,
}

pub struct FilesPackSource {
    pack: Pack,
    store: Arc<MetadataStore>,
}

impl FilesPackSource {
    pub fn new(pack: Pack, store: Arc<MetadataStore>) -> Self {
        Self { pack, store }
    }
}

#[async_trait]
impl CatalogSource for FilesPackSource {
    fn name(&self) -> &str {
        &self.pack.name
    }

    async fn fetch_catalog(&self) -> Result<Vec<Item>> {
        let doc_ref = self.pack.document()?;
        let out_path = self
            .pack
            .out_path
            .as_deref()
            .ok_or_else(|| CatalogError::invalid_pack(&self.pack.name, "missing out_path"))?;
        let namespace = self.pack.path.as_deref().unwrap_or(&self.pack.name);

        let doc: FilesDocument = self.store.load(&doc_ref, FetchMode::UseCache).await?;
        Ok(files_items(namespace, out_path, self.pack.args_keep, &doc))
    }
}

/// Normalize a files pack
///
/// Files with a `kind` are groupable cores placed directly in `out_path`;
/// everything else keeps its `path` below `out_path`. Entries whose kind or
/// type is not recognised are skipped. In a tagged document an entry needs
/// at least one known tag; a document without a tag dictionary yields
/// untagged items that every tag selection accepts.
pub fn files_items(namespace: &str, out_path: &str, managed: bool, doc: &FilesDocument) -> Vec<Item> {
    let tagged = !doc.tag_dictionary.is_empty();
    let mut items = Vec::with_capacity(doc.files.len());

    for (key, entry) in &doc.files {
        let name = file_name_of(key);

        let (kind, core_type, tags) = if tagged {
            let Ok(kind) = parse_optional::<Kind>(entry.kind.as_deref()) else {
                debug!("Skipping {}: unknown kind {:?}", key, entry.kind);
                continue;
            };
            let Ok(core_type) = parse_optional::<CoreType>(entry.core_type.as_deref()) else {
                debug!("Skipping {}: unknown type {:?}", key, entry.core_type);
                continue;
            };
            let tags = doc.tag_dictionary.tags(&entry.tags);
            if tags.is_empty() {
                debug!("Skipping {}: no selectable tags", key);
                continue;
            }
            (kind, core_type, tags)
        } else {
            (None, None, Vec::new())
        };

        let dest = if kind.is_some() {
            DestTemplate::new(out_path, name).groupable(true)
        } else {
            let mut dir = Utf8PathBuf::from(out_path);
            dir.extend(entry.path.iter().filter(|p| !p.is_empty()));
            DestTemplate::new(dir, name)
        }
        .managed(managed);

        let source = Source::new(&entry.url)
            .with_size(entry.size)
            .with_hash(Checksum::md5_opt(entry.hash.as_deref()));

        items.push(
            Item::new(ItemKey::new(namespace, key), name, dest, source)
                .with_kind(kind)
                .with_core_type(core_type)
                .with_tags(tags),
        );
    }
    items
}

/// Blank means absent; anything else must parse
fn parse_optional<T: std::str::FromStr>(value: Option<&str>) -> std::result::Result<Option<T>, T::Err> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => v.parse().map(Some),
        None => Ok(None),
    }
}
