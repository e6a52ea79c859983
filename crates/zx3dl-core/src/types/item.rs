//! The canonical catalog item every source adapter normalizes into

use super::checksum::Checksum;
use super::selection::{CoreType, Kind, Tag};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of an item: `<namespace>/<relative path>`
///
/// Unique across the merged catalog. Two adapters describing the same
/// artifact must produce the same key for their sources to be merged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemKey(String);

impl ItemKey {
    pub fn new(namespace: &str, relative: &str) -> Self {
        let namespace = namespace.trim_matches('/');
        let relative = relative.trim_matches('/');
        if namespace.is_empty() {
            Self(relative.to_string())
        } else {
            Self(format!("{}/{}", namespace, relative))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name for this key inside the cache
    ///
    /// The readable prefix is truncated; the hash suffix keeps distinct keys
    /// apart after sanitizing.
    pub fn slug(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        let suffix: String = digest[..6].iter().map(|b| format!("{:02x}", b)).collect();
        let readable = crate::utils::sanitize_component(&self.0);
        let readable: String = readable.chars().take(64).collect();
        format!("{}-{}", readable, suffix)
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A member inside a container ZIP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveRef {
    /// Path of the member inside the container
    pub member: String,
    pub container_size: Option<u64>,
    pub container_hash: Option<Checksum>,
}

/// One location an item can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub size: Option<u64>,
    pub hash: Option<Checksum>,
    /// Set when `url` is a container and the item is one of its members
    pub archive: Option<ArchiveRef>,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            size: None,
            hash: None,
            archive: None,
        }
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_hash(mut self, hash: Option<Checksum>) -> Self {
        self.hash = hash;
        self
    }

    pub fn in_archive(mut self, archive: ArchiveRef) -> Self {
        self.archive = Some(archive);
        self
    }
}

/// Arcade core an MRA description belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcadeCore {
    /// Core name as listed in the cores database, e.g. `jtcps1`
    pub core: String,
    /// Prefix of the MRA whose ARC becomes the core's default
    pub default_mra: Option<String>,
    /// File stem of the default ARC
    pub default_arc: Option<String>,
}

/// How the tree builder treats an item
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ItemRole {
    /// Copied to its destination as-is
    #[default]
    File,
    /// Arcade ROM set, only needed as converter input
    ArcadeRom,
    /// Arcade MRA description, converted into an ARC file
    ArcadeMra(ArcadeCore),
}

/// Where an item lands in the destination tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestTemplate {
    /// Directory relative to the destination root
    pub dir: Utf8PathBuf,
    pub file_name: String,
    /// Cores can be regrouped by type and tag; support files never are
    pub groupable: bool,
    /// The top-level directory of a managed item is cleared before writing
    /// unless the user asked to keep existing files
    pub managed: bool,
}

impl DestTemplate {
    pub fn new(dir: impl Into<Utf8PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            file_name: file_name.into(),
            groupable: false,
            managed: false,
        }
    }

    pub fn groupable(mut self, groupable: bool) -> Self {
        self.groupable = groupable;
        self
    }

    pub fn managed(mut self, managed: bool) -> Self {
        self.managed = managed;
        self
    }

    /// First component of `dir`, the unit cleared by the replace policy
    pub fn top_level(&self) -> Option<&str> {
        self.dir.components().next().map(|c| c.as_str())
    }

    /// Path for flat placement
    pub fn flat_path(&self) -> Utf8PathBuf {
        self.dir.join(&self.file_name)
    }
}

/// A single installable artifact after normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: ItemKey,
    pub name: String,
    pub kind: Option<Kind>,
    pub core_type: Option<CoreType>,
    /// Ordered, but filtered with set semantics
    pub tags: Vec<Tag>,
    /// Priority order; never empty
    pub sources: Vec<Source>,
    pub size: Option<u64>,
    pub hash: Option<Checksum>,
    pub dest: DestTemplate,
    pub role: ItemRole,
}

impl Item {
    /// Create an item whose expected size and hash come from its first source
    pub fn new(key: ItemKey, name: impl Into<String>, dest: DestTemplate, source: Source) -> Self {
        Self {
            key,
            name: name.into(),
            kind: None,
            core_type: None,
            tags: Vec::new(),
            size: source.size,
            hash: source.hash.clone(),
            sources: vec![source],
            dest,
            role: ItemRole::File,
        }
    }

    pub fn with_kind(mut self, kind: Option<Kind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_core_type(mut self, core_type: Option<CoreType>) -> Self {
        self.core_type = core_type;
        self
    }

    pub fn with_tags(mut self, tags: Vec<Tag>) -> Self {
        let mut unique = Vec::with_capacity(tags.len());
        for tag in tags {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        self.tags = unique;
        self
    }

    pub fn with_role(mut self, role: ItemRole) -> Self {
        self.role = role;
        self
    }

    /// Cores are the only items the grouping modes move around
    pub fn is_core(&self) -> bool {
        self.dest.groupable && (self.kind.is_some() || self.core_type.is_some())
    }

    /// Whether the item is copied into the tree (arcade inputs are not)
    pub fn is_placed(&self) -> bool {
        self.role == ItemRole::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_normalizes_slashes() {
        let key = ItemKey::new("/ZX3/", "/CORES/spectrum.zx3");
        assert_eq!(key.as_str(), "ZX3/CORES/spectrum.zx3");
        assert_eq!(ItemKey::new("", "a/b").as_str(), "a/b");
    }

    #[test]
    fn test_slug_is_stable_and_distinct() {
        let a = ItemKey::new("ZX3", "a/b.zx3");
        let b = ItemKey::new("ZX3", "a_b.zx3");
        assert_eq!(a.slug(), a.clone().slug());
        assert_ne!(a.slug(), b.slug());
        assert!(!a.slug().contains('/'));
    }

    #[test]
    fn test_item_takes_expectations_from_first_source() {
        let source = Source::new("https://example.com/core.zx3")
            .with_size(Some(42))
            .with_hash(Some(Checksum::md5("abc")));
        let item = Item::new(
            ItemKey::new("ZX3", "core.zx3"),
            "core.zx3",
            DestTemplate::new("ZX3", "core.zx3").groupable(true),
            source,
        )
        .with_kind(Some(Kind::A35t))
        .with_tags(vec![Tag::Arcade, Tag::Arcade, Tag::Console]);

        assert_eq!(item.size, Some(42));
        assert_eq!(item.hash, Some(Checksum::md5("abc")));
        assert_eq!(item.tags, vec![Tag::Arcade, Tag::Console]);
        assert!(item.is_core());
        assert!(item.is_placed());
    }

    #[test]
    fn test_top_level_dir() {
        let dest = DestTemplate::new("ZX3/CORES", "x.zx3");
        assert_eq!(dest.top_level(), Some("ZX3"));
        assert_eq!(dest.flat_path(), Utf8PathBuf::from("ZX3/CORES/x.zx3"));
        assert_eq!(DestTemplate::new("", "AUTOEXEC").top_level(), None);
    }
}
