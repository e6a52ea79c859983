//! Source adapters
//!
//! The main catalog lists packs; each pack is one adapter that turns its own
//! document format into canonical [`Item`]s:
//!
//! - `files`: individually downloaded files ([`FilesPackSource`])
//! - `zip`: members of one container ZIP ([`ZipPackSource`])
//! - `arcade`: ROM sets and MRA descriptions ([`ArcadeSource`])

mod arcade;
mod files;
mod zip_pack;

pub use arcade::{arcade_items, ArcadeSource, CoreEntry, MraDocument, RomDocument};
pub use files::{files_items, FilesDocument, FilesPackSource};
pub use zip_pack::{zip_items, ZipDocument, ZipPackSource};

use async_trait::async_trait;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};
use zx3dl_core::types::{CatalogConfig, Item, Tag};

use crate::error::{CatalogError, Result};
use crate::store::{DocumentRef, FetchMode, MetadataStore};

/// Anything that can list catalog items
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Name used in logs and failure reports
    fn name(&self) -> &str;

    /// Fetch and normalize this source's items
    async fn fetch_catalog(&self) -> Result<Vec<Item>>;
}

/// Opaque tag identifier used inside catalog documents
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(untagged)]
pub enum TagId {
    Number(u64),
    Text(String),
}

/// Tag name to identifier table shipped with a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TagDictionary(BTreeMap<String, TagId>);

impl TagDictionary {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names whose identifier appears in `ids`, in dictionary order
    pub fn names<'a>(&'a self, ids: &'a [TagId]) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(_, id)| ids.contains(id))
            .map(|(name, _)| name.as_str())
    }

    /// Known tags among `ids`; names outside the tag set are ignored
    pub fn tags(&self, ids: &[TagId]) -> Vec<Tag> {
        self.names(ids).filter_map(|name| name.parse().ok()).collect()
    }

    pub fn id(&self, name: &str) -> Option<&TagId> {
        self.0.get(name)
    }
}

/// Pack document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackType {
    Zip,
    Files,
    Arcade,
    #[serde(other)]
    Unknown,
}

/// One pack entry of the main catalog
#[derive(Debug, Clone, Deserialize)]
pub struct Pack {
    pub name: String,
    #[serde(rename = "type")]
    pub pack_type: PackType,
    /// Tag identifiers gating the pack; empty means always processed
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub file: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    /// Cache namespace for files packs
    pub path: Option<String>,
    /// Destination directory for files packs
    pub out_path: Option<String>,
    /// Whether the user's keep flag applies to the pack's directory
    #[serde(default)]
    pub args_keep: bool,
    /// Arcade documents by role
    #[serde(default)]
    pub dbs: BTreeMap<String, DocumentRef>,
    /// Base URL of the MRA files
    pub mra_url: Option<String>,
}

impl Pack {
    /// The pack's own document
    pub fn document(&self) -> Result<DocumentRef> {
        match (&self.file, &self.url) {
            (Some(file), Some(url)) => Ok(DocumentRef {
                file: file.clone(),
                url: url.clone(),
                hash: self.hash.clone(),
                size: self.size,
            }),
            _ => Err(CatalogError::invalid_pack(&self.name, "missing file or url")),
        }
    }

    pub fn db(&self, role: &str) -> Result<&DocumentRef> {
        self.dbs
            .get(role)
            .ok_or_else(|| CatalogError::invalid_pack(&self.name, format!("missing {} document", role)))
    }
}

/// The main catalog document
#[derive(Debug, Clone, Deserialize)]
pub struct MainCatalog {
    #[serde(default)]
    pub tag_dictionary: TagDictionary,
    /// Packs in document order
    #[serde(deserialize_with = "ordered_entries")]
    pub packs: Vec<(String, Pack)>,
}

impl MainCatalog {
    pub fn document(config: &CatalogConfig) -> DocumentRef {
        DocumentRef::new(&config.main_name, &config.main_url)
    }

    pub async fn load(store: &MetadataStore, config: &CatalogConfig, mode: FetchMode) -> Result<Self> {
        store.load(&Self::document(config), mode).await
    }

    /// Whether a tag-gated pack matches one of the requested tags
    pub fn pack_enabled(&self, pack: &Pack, requested: &BTreeSet<Tag>) -> bool {
        if pack.tags.is_empty() || requested.is_empty() {
            return true;
        }
        requested.iter().any(|tag| {
            self.tag_dictionary
                .id(tag.as_str())
                .is_some_and(|id| pack.tags.contains(id))
        })
    }

    /// Packs to process, in document order
    pub fn enabled_packs<'a>(&'a self, requested: &'a BTreeSet<Tag>) -> impl Iterator<Item = &'a Pack> + 'a {
        self.packs
            .iter()
            .map(|(_, pack)| pack)
            .filter(move |pack| self.pack_enabled(pack, requested))
    }
}

/// Knobs that change how adapters use the metadata store
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Requested tags; gates tagged packs
    pub tags: BTreeSet<Tag>,
    /// Purge and re-download arcade documents
    pub refresh_arcade: bool,
}

/// One adapter per enabled pack, in main catalog order
pub fn build_sources(
    main: &MainCatalog,
    store: Arc<MetadataStore>,
    options: &SourceOptions,
) -> Vec<Box<dyn CatalogSource>> {
    let mut sources: Vec<Box<dyn CatalogSource>> = Vec::new();
    for pack in main.enabled_packs(&options.tags) {
        match pack.pack_type {
            PackType::Files => sources.push(Box::new(FilesPackSource::new(pack.clone(), store.clone()))),
            PackType::Zip => sources.push(Box::new(ZipPackSource::new(pack.clone(), store.clone()))),
            PackType::Arcade => sources.push(Box::new(
                ArcadeSource::new(pack.clone(), store.clone()).force_refresh(options.refresh_arcade),
            )),
            PackType::Unknown => warn!("Skipping pack {} of unknown type", pack.name),
        }
    }
    debug!("{} of {} packs enabled", sources.len(), main.packs.len());
    sources
}

/// Deserialize a JSON object into `(key, value)` pairs, keeping document order
pub(crate) fn ordered_entries<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a JSON object")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, V>()? {
                entries.push((key, value));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}

/// Last path segment of a catalog key or URL
pub(crate) fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAIN: &str = r#"{
        "tag_dictionary": {"arcade": 1, "console": 2, "computer": 3, "util": 4},
        "packs": {
            "zsys": {"name": "System", "type": "zip", "tags": [],
                     "file": "zsys_db.json", "url": "https://example.com/", "hash": "", "size": 0},
            "cores": {"name": "Cores", "type": "files", "tags": [2, 3],
                      "file": "cores_db.json", "url": "https://example.com/",
                      "path": "cores", "out_path": "ZX3", "args_keep": true},
            "arcade": {"name": "Arcade", "type": "arcade", "tags": [1],
                       "mra_url": "https://example.com/mra/", "dbs": {}}
        }
    }"#;

    fn requested(tags: &[Tag]) -> BTreeSet<Tag> {
        tags.iter().copied().collect()
    }

    #[test]
    fn test_packs_keep_document_order() {
        let main: MainCatalog = serde_json::from_str(MAIN).unwrap();
        let names: Vec<&str> = main.packs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["zsys", "cores", "arcade"]);
        assert_eq!(main.packs[1].1.pack_type, PackType::Files);
        assert!(main.packs[1].1.args_keep);
    }

    #[test]
    fn test_tag_gated_packs() {
        let main: MainCatalog = serde_json::from_str(MAIN).unwrap();

        let arcade_only = requested(&[Tag::Arcade]);
        let names: Vec<&str> = main.enabled_packs(&arcade_only).map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["System", "Arcade"]);

        let console = requested(&[Tag::Console]);
        let names: Vec<&str> = main.enabled_packs(&console).map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["System", "Cores"]);

        assert_eq!(main.enabled_packs(&BTreeSet::new()).count(), 3);
    }

    #[test]
    fn test_tag_dictionary_maps_ids_to_known_tags() {
        let dict: TagDictionary =
            serde_json::from_str(r#"{"arcade": 1, "console": "c", "jtcps1": 7}"#).unwrap();
        let ids = vec![TagId::Text("c".into()), TagId::Number(7), TagId::Number(1)];
        assert_eq!(dict.tags(&ids), vec![Tag::Arcade, Tag::Console]);
        assert_eq!(dict.names(&ids).count(), 3);
    }

    #[test]
    fn test_pack_document_requires_file_and_url() {
        let main: MainCatalog = serde_json::from_str(MAIN).unwrap();
        let arcade = &main.packs[2].1;
        assert!(matches!(arcade.document(), Err(CatalogError::InvalidPack { .. })));
        assert!(arcade.db("mra_db").is_err());
        assert_eq!(main.packs[1].1.document().unwrap().file, "cores_db.json");
    }

    #[test]
    fn test_unknown_pack_type_deserializes() {
        let pack: Pack = serde_json::from_str(r#"{"name": "x", "type": "tarball"}"#).unwrap();
        assert_eq!(pack.pack_type, PackType::Unknown);
    }
}
