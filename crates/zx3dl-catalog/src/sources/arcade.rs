//! Arcade ROM sets and MRA descriptions
//!
//! Three documents drive this pack:
//! - `jtcores_db`: installed arcade cores, with their default MRA and ARC
//! - `arcade_rom_db`: ROM ZIPs, tagged with the cores that use them
//! - `mra_db`: MRA files, tagged `arcade<core>`
//!
//! Only ROMs and MRAs that belong to a listed core are emitted.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use zx3dl_core::types::{
    ArcadeCore, Checksum, DestTemplate, Item, ItemKey, ItemRole, Source, Tag,
};

use super::{file_name_of, ordered_entries, CatalogSource, Pack, TagDictionary, TagId};
use crate::error::{CatalogError, Result};
use crate::store::{FetchMode, MetadataStore};

/// Destination directory of arcade output
pub const ARCADE_DIR: &str = "JOTEGO";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreEntry {
    #[serde(default)]
    pub default_mra: String,
    #[serde(default)]
    pub default_arc: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RomDocument {
    #[serde(deserialize_with = "ordered_entries")]
    pub files: Vec<(String, RomEntry)>,
    #[serde(default)]
    pub tag_dictionary: TagDictionary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RomEntry {
    pub url: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub tags: Vec<TagId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MraDocument {
    #[serde(deserialize_with = "ordered_entries")]
    pub files: Vec<(String, MraEntry)>,
    #[serde(default)]
    pub tag_dictionary: TagDictionary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MraEntry {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub tags: Vec<TagId>,
}

pub struct ArcadeSource {
    pack: Pack,
    store: Arc<MetadataStore>,
    force_refresh: bool,
}

impl ArcadeSource {
    pub fn new(pack: Pack, store: Arc<MetadataStore>) -> Self {
        Self {
            pack,
            store,
            force_refresh: false,
        }
    }

    /// Purge the cached arcade documents before fetching them
    pub fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }
}

#[async_trait]
impl CatalogSource for ArcadeSource {
    fn name(&self) -> &str {
        &self.pack.name
    }

    async fn fetch_catalog(&self) -> Result<Vec<Item>> {
        let mra_url = self
            .pack
            .mra_url
            .as_deref()
            .ok_or_else(|| CatalogError::invalid_pack(&self.pack.name, "missing mra_url"))?;
        let roms_ref = self.pack.db("arcade_rom_db")?;
        let mras_ref = self.pack.db("mra_db")?;
        let cores_ref = self.pack.db("jtcores_db")?;

        let mode = if self.force_refresh {
            FetchMode::ForceRefresh
        } else {
            FetchMode::UseCache
        };

        let cores: BTreeMap<String, CoreEntry> = self.store.load(cores_ref, mode).await?;
        let roms: RomDocument = self.store.load(roms_ref, mode).await?;
        let mras: MraDocument = self.store.load(mras_ref, mode).await?;

        let items = arcade_items(&roms, &mras, &cores, mra_url);
        debug!("{}: {} arcade items for {} cores", self.pack.name, items.len(), cores.len());
        Ok(items)
    }
}

/// ROM and MRA items for every core listed in `cores`
pub fn arcade_items(
    roms: &RomDocument,
    mras: &MraDocument,
    cores: &BTreeMap<String, CoreEntry>,
    mra_url: &str,
) -> Vec<Item> {
    let mut items = Vec::new();

    for (key, entry) in &roms.files {
        let used = roms
            .tag_dictionary
            .names(&entry.tags)
            .any(|core| cores.contains_key(core));
        if !used {
            continue;
        }
        let name = file_name_of(key);
        let source = Source::new(&entry.url)
            .with_size(entry.size)
            .with_hash(Checksum::md5_opt(entry.hash.as_deref()));
        items.push(
            Item::new(
                ItemKey::new("arcade/roms", name),
                name,
                DestTemplate::new(ARCADE_DIR, name),
                source,
            )
            .with_tags(vec![Tag::Arcade])
            .with_role(ItemRole::ArcadeRom),
        );
    }

    for (key, entry) in &mras.files {
        let name = file_name_of(key);
        if !name.ends_with(".mra") || key.contains("_alternatives") {
            continue;
        }
        let Some((core, core_entry)) = mras
            .tag_dictionary
            .names(&entry.tags)
            .map(|tag| tag.replace("arcade", ""))
            .find_map(|core| cores.get(&core).map(|found| (core, found)))
        else {
            continue;
        };

        let source = Source::new(format!("{}{}", mra_url, name))
            .with_size(entry.size)
            .with_hash(Checksum::md5_opt(entry.hash.as_deref()));
        let role = ItemRole::ArcadeMra(ArcadeCore {
            core,
            default_mra: non_blank(&core_entry.default_mra),
            default_arc: non_blank(&core_entry.default_arc),
        });
        items.push(
            Item::new(
                ItemKey::new("arcade/mra", key),
                name,
                DestTemplate::new(ARCADE_DIR, name),
                source,
            )
            .with_tags(vec![Tag::Arcade])
            .with_role(role),
        );
    }

    items
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> (RomDocument, MraDocument, BTreeMap<String, CoreEntry>) {
        let roms = serde_json::from_str(
            r#"{
                "tag_dictionary": {"jtcps1": 1, "jtkiwi": 2},
                "files": {
                    "roms/sf2.zip": {"url": "https://example.com/roms/sf2.zip", "hash": "aa",
                                     "size": 100, "tags": [1]},
                    "roms/kiwi.zip": {"url": "https://example.com/roms/kiwi.zip", "hash": "bb",
                                      "size": 50, "tags": [2]}
                }
            }"#,
        )
        .unwrap();
        let mras = serde_json::from_str(
            r#"{
                "tag_dictionary": {"arcadejtcps1": 10, "arcadejtkiwi": 11},
                "files": {
                    "mra/Street Fighter II (World).mra": {"hash": "cc", "size": 3, "tags": [10]},
                    "mra/_alternatives/_SF2/sf2ce.mra": {"hash": "dd", "size": 3, "tags": [10]},
                    "mra/readme.md": {"hash": "ee", "size": 3, "tags": [10]},
                    "mra/Kiwi.mra": {"hash": "ff", "size": 3, "tags": [11]}
                }
            }"#,
        )
        .unwrap();
        let cores = serde_json::from_str(
            r#"{"jtcps1": {"default_mra": "Street Fighter II", "default_arc": "sf2"}}"#,
        )
        .unwrap();
        (roms, mras, cores)
    }

    #[test]
    fn test_only_listed_cores_are_emitted() {
        let (roms, mras, cores) = fixtures();
        let items = arcade_items(&roms, &mras, &cores, "https://example.com/mra/");

        let keys: Vec<&str> = items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["arcade/roms/sf2.zip", "arcade/mra/mra/Street Fighter II (World).mra"]
        );
        assert!(items.iter().all(|i| i.tags == vec![Tag::Arcade]));
        assert!(items.iter().all(|i| !i.is_placed()));
    }

    #[test]
    fn test_mra_items_carry_core_defaults() {
        let (roms, mras, cores) = fixtures();
        let items = arcade_items(&roms, &mras, &cores, "https://example.com/mra/");
        let mra = &items[1];

        assert_eq!(
            mra.sources[0].url,
            "https://example.com/mra/Street Fighter II (World).mra"
        );
        match &mra.role {
            ItemRole::ArcadeMra(core) => {
                assert_eq!(core.core, "jtcps1");
                assert_eq!(core.default_mra.as_deref(), Some("Street Fighter II"));
                assert_eq!(core.default_arc.as_deref(), Some("sf2"));
            }
            other => panic!("unexpected role {:?}", other),
        }
    }
}
