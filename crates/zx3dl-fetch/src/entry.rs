//! On-disk record of a cached artifact (`entry.json`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;
use zx3dl_core::types::Checksum;

use crate::error::{FetchError, Result};

pub const ENTRY_FILE: &str = "entry.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheEntry {
    pub key: String,
    pub file_name: String,
    /// Size of the stored bytes once complete
    pub size: Option<u64>,
    pub hash: Option<Checksum>,
    /// Total size announced for an unfinished transfer
    #[serde(default)]
    pub total_size: Option<u64>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub complete: bool,
}

impl CacheEntry {
    pub fn pending(key: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            file_name: file_name.into(),
            size: None,
            hash: None,
            total_size: None,
            source_url: None,
            verified_at: None,
            complete: false,
        }
    }

    /// Read `entry.json` from a slot directory
    ///
    /// A missing file is `None`. An unreadable one is logged and also treated
    /// as absent, so the slot is fetched again instead of failing the run.
    pub fn load(dir: &Path) -> Option<Self> {
        let path = dir.join(ENTRY_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Ignoring unreadable cache entry {}: {}", path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write `entry.json` atomically
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| FetchError::filesystem(dir, e))?;
        let path = dir.join(ENTRY_FILE);
        let tmp = dir.join(format!("{}.tmp", ENTRY_FILE));
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| FetchError::filesystem(&path, std::io::Error::other(e)))?;
        fs::write(&tmp, content).map_err(|e| FetchError::filesystem(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| FetchError::filesystem(&path, e))
    }

    pub fn mark_complete(&mut self, size: u64, hash: Checksum, source_url: &str) {
        self.size = Some(size);
        self.hash = Some(hash);
        self.total_size = None;
        self.source_url = Some(source_url.to_string());
        self.verified_at = Some(Utc::now());
        self.complete = true;
    }

    /// Turn a complete entry back into an unfinished transfer of `total` bytes
    pub fn demote(&mut self, total: u64) {
        self.complete = false;
        self.total_size = Some(total);
        self.verified_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut entry = CacheEntry::pending("ZX3/core.zx3", "core.zx3");
        entry.mark_complete(4, Checksum::md5("abcd"), "http://host/core.zx3");
        entry.save(dir.path()).unwrap();

        let loaded = CacheEntry::load(dir.path()).unwrap();
        assert_eq!(loaded, entry);
        assert!(loaded.complete);
        assert!(loaded.verified_at.is_some());
    }

    #[test]
    fn test_corrupt_entry_is_absent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(ENTRY_FILE), "{not json").unwrap();
        assert!(CacheEntry::load(dir.path()).is_none());
        assert!(CacheEntry::load(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn test_demote_keeps_identity() {
        let mut entry = CacheEntry::pending("k", "f");
        entry.mark_complete(10, Checksum::md5("aa"), "u");
        entry.demote(10);
        assert!(!entry.complete);
        assert_eq!(entry.total_size, Some(10));
        assert_eq!(entry.source_url.as_deref(), Some("u"));
    }
}
