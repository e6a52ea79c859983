//! Persistent artifact cache
//!
//! Layout below the cache root:
//!
//! ```text
//! items/<slug>/<file>         verified artifact bytes
//! items/<slug>/<file>.part    unfinished transfer
//! items/<slug>/entry.json     CacheEntry
//! archives/<slug>/...         container ZIPs, one slot per container URL
//! ```
//!
//! `resolve` returns a verified local copy of an item. A complete entry whose
//! bytes still match the item's declared size and digest is served without
//! touching the network. Otherwise the item's sources are tried in priority
//! order and the entry is marked complete only after verification.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zx3dl_core::types::{file_checksum, ArchiveRef, Checksum, ChecksumAlgorithm, Item, ItemKey, Source};
use zx3dl_core::utils::sanitize_component;

use crate::archive::extract_member;
use crate::download::{remove_if_exists, DownloadEngine, TransferRequest};
use crate::entry::CacheEntry;
use crate::error::{FetchError, Result};
use crate::locks::KeyedLocks;

/// A source that failed before the item was obtained elsewhere
#[derive(Debug)]
pub struct SourceFailure {
    pub url: String,
    pub error: FetchError,
}

/// A verified local copy of an item
#[derive(Debug)]
pub struct Resolved {
    pub key: ItemKey,
    pub path: PathBuf,
    /// Served from a complete entry without network access
    pub from_cache: bool,
    pub source_failures: Vec<SourceFailure>,
}

/// One cache directory: data file, partial file and entry record
struct Slot {
    key: String,
    dir: PathBuf,
    file_name: String,
}

impl Slot {
    fn data_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    fn part_path(&self) -> PathBuf {
        DownloadEngine::partial_path(&self.data_path())
    }
}

enum SlotState {
    Ready,
    /// Unfinished transfer that may be resumed
    Partial(CacheEntry),
    Empty,
}

pub struct CacheManager {
    root: PathBuf,
    engine: DownloadEngine,
    locks: KeyedLocks,
}

impl CacheManager {
    pub fn new(root: impl Into<PathBuf>, engine: DownloadEngine) -> Self {
        Self {
            root: root.into(),
            engine,
            locks: KeyedLocks::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn item_dir(&self, key: &ItemKey) -> PathBuf {
        self.root.join("items").join(key.slug())
    }

    fn item_slot(&self, item: &Item) -> Slot {
        Slot {
            key: item.key.to_string(),
            dir: self.item_dir(&item.key),
            file_name: safe_file_name(&item.name),
        }
    }

    fn container_slot(&self, url: &str) -> Slot {
        let key = format!("archive:{}", url);
        let file_name = url
            .split(|c| c == '?' || c == '#')
            .next()
            .and_then(|u| u.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(safe_file_name)
            .unwrap_or_else(|| "container.zip".to_string());
        Slot {
            dir: self
                .root
                .join("archives")
                .join(ItemKey::new("", &key).slug()),
            key,
            file_name,
        }
    }

    /// Return a verified local copy of `item`
    pub async fn resolve(&self, item: &Item) -> Result<Resolved> {
        if item.sources.is_empty() {
            return Err(FetchError::NoSources {
                item: item.key.to_string(),
            });
        }

        let _guard = self.locks.lock(item.key.as_str()).await;
        let slot = self.item_slot(item);

        let mut entry = match inspect(&slot, item.size, item.hash.as_ref())? {
            SlotState::Ready => {
                debug!("Cache hit for {}", item.key);
                return Ok(Resolved {
                    key: item.key.clone(),
                    path: slot.data_path(),
                    from_cache: true,
                    source_failures: Vec::new(),
                });
            }
            SlotState::Partial(entry) => Some(entry),
            SlotState::Empty => None,
        };

        let mut failures: Vec<SourceFailure> = Vec::new();
        for source in &item.sources {
            let result = match &source.archive {
                None => {
                    self.download_into(&slot, &source.url, item.size, item.hash.as_ref(), entry.take())
                        .await
                }
                Some(archive) => self.extract_into(&slot, item, source, archive).await,
            };

            match result {
                Ok(path) => {
                    info!("Fetched {}", item.key);
                    return Ok(Resolved {
                        key: item.key.clone(),
                        path,
                        from_cache: false,
                        source_failures: failures,
                    });
                }
                Err(error) => {
                    warn!("Source {} failed for {}: {}", source.url, item.key, error);
                    failures.push(SourceFailure {
                        url: source.url.clone(),
                        error,
                    });
                }
            }
        }

        let last = failures
            .pop()
            .map(|failure| failure.error)
            .unwrap_or_else(|| FetchError::NoSources {
                item: item.key.to_string(),
            });
        Err(FetchError::AllSourcesFailed {
            item: item.key.to_string(),
            last: Box::new(last),
        })
    }

    /// Download `url` into the slot, resuming a compatible partial file
    async fn download_into(
        &self,
        slot: &Slot,
        url: &str,
        size: Option<u64>,
        hash: Option<&Checksum>,
        entry: Option<CacheEntry>,
    ) -> Result<PathBuf> {
        let mut entry = entry.unwrap_or_else(|| CacheEntry::pending(&slot.key, &slot.file_name));
        if entry.source_url.as_deref() != Some(url) {
            remove_if_exists(&slot.part_path())?;
            entry.total_size = None;
        }
        entry.file_name = slot.file_name.clone();
        entry.source_url = Some(url.to_string());
        entry.complete = false;
        entry.total_size = entry.total_size.or(size);
        entry.save(&slot.dir)?;

        let data = slot.data_path();
        let request = TransferRequest::new(url, &slot.key)
            .with_expected(size, hash)
            .known_total(entry.total_size);
        let transfer = self.engine.fetch(&request, &data).await?;
        if transfer.resumed {
            debug!("Resumed transfer of {}", slot.key);
        }

        let digest = recorded_digest(&data, hash)?;
        entry.mark_complete(transfer.size, digest, url);
        entry.save(&slot.dir)?;
        Ok(data)
    }

    /// Make sure the container is cached, then extract the item's member
    async fn extract_into(
        &self,
        slot: &Slot,
        item: &Item,
        source: &Source,
        archive: &ArchiveRef,
    ) -> Result<PathBuf> {
        let container = self.container_slot(&source.url);
        let container_path = {
            let _guard = self.locks.lock(&container.key).await;
            match inspect(
                &container,
                archive.container_size,
                archive.container_hash.as_ref(),
            )? {
                SlotState::Ready => container.data_path(),
                SlotState::Partial(entry) => {
                    self.download_into(
                        &container,
                        &source.url,
                        archive.container_size,
                        archive.container_hash.as_ref(),
                        Some(entry),
                    )
                    .await?
                }
                SlotState::Empty => {
                    self.download_into(
                        &container,
                        &source.url,
                        archive.container_size,
                        archive.container_hash.as_ref(),
                        None,
                    )
                    .await?
                }
            }
        };

        let data = slot.data_path();
        let size = extract_member(&container_path, &archive.member, &data)?;

        if let Some(expected) = item.size {
            if size != expected {
                remove_if_exists(&data)?;
                return Err(FetchError::integrity(
                    &slot.key,
                    format!("member size mismatch: expected {}, got {}", expected, size),
                ));
            }
        }
        if let Some(expected) = &item.hash {
            let actual = file_checksum(&data, expected.algorithm)
                .map_err(|e| FetchError::filesystem(&data, e))?;
            if !expected.matches(&actual) {
                remove_if_exists(&data)?;
                return Err(FetchError::integrity(
                    &slot.key,
                    format!("member {} mismatch: expected {}, got {}", expected.algorithm, expected.value, actual),
                ));
            }
        }

        let mut entry = CacheEntry::pending(&slot.key, &slot.file_name);
        let digest = recorded_digest(&data, item.hash.as_ref())?;
        entry.mark_complete(size, digest, &format!("{}#{}", source.url, archive.member));
        entry.save(&slot.dir)?;
        Ok(data)
    }

    /// Remove the cached copy of `key`. Returns whether anything was removed.
    pub async fn purge(&self, key: &ItemKey) -> Result<bool> {
        let _guard = self.locks.lock(key.as_str()).await;
        let dir = self.item_dir(key);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| FetchError::filesystem(&dir, e))?;
        info!("Purged cache entry {}", key);
        Ok(true)
    }

    /// Every stored entry, complete or not
    pub fn entries(&self) -> Result<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for area in ["items", "archives"] {
            let dir = self.root.join(area);
            let read = match fs::read_dir(&dir) {
                Ok(read) => read,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(FetchError::filesystem(&dir, e)),
            };
            for child in read {
                let child = child.map_err(|e| FetchError::filesystem(&dir, e))?;
                if let Some(entry) = CacheEntry::load(&child.path()) {
                    entries.push(entry);
                }
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}

/// Decide what a slot holds, repairing it on the way
///
/// - complete entry, bytes match: `Ready`
/// - complete entry, file shorter than recorded: demoted to `Partial`
/// - complete entry, file larger or digest differs: bytes removed, `Empty`
/// - incomplete entry with a partial file: `Partial`
/// - bytes without an entry are adopted when size and digest prove them
fn inspect(slot: &Slot, size: Option<u64>, hash: Option<&Checksum>) -> Result<SlotState> {
    let data = slot.data_path();
    let entry = CacheEntry::load(&slot.dir).filter(|e| e.file_name == slot.file_name);

    let Some(mut entry) = entry else {
        remove_if_exists(&slot.part_path())?;
        if let (Some(size), Some(hash)) = (size, hash) {
            if file_matches(&data, size, hash)? {
                debug!("Adopting untracked file for {}", slot.key);
                let mut entry = CacheEntry::pending(&slot.key, &slot.file_name);
                entry.mark_complete(size, hash.clone(), "");
                entry.source_url = None;
                entry.save(&slot.dir)?;
                return Ok(SlotState::Ready);
            }
        }
        remove_if_exists(&data)?;
        return Ok(SlotState::Empty);
    };

    if !entry.complete {
        return Ok(if slot.part_path().exists() {
            SlotState::Partial(entry)
        } else {
            SlotState::Empty
        });
    }

    let catalog_changed = size.is_some_and(|s| entry.size.is_some_and(|recorded| recorded != s))
        || hash.is_some_and(|h| entry.hash.as_ref().is_some_and(|recorded| recorded != h));
    if catalog_changed {
        debug!("Catalog changed for {}, refetching", slot.key);
        remove_if_exists(&data)?;
        return Ok(SlotState::Empty);
    }

    let actual_size = match fs::metadata(&data) {
        Ok(meta) => meta.len(),
        Err(_) => {
            debug!("Cache entry for {} lost its file", slot.key);
            return Ok(SlotState::Empty);
        }
    };

    let expected_size = size.or(entry.size);
    if let Some(expected) = expected_size {
        if actual_size < expected {
            debug!(
                "Cached {} truncated at {} of {} bytes, resuming",
                slot.key, actual_size, expected
            );
            remove_if_exists(&slot.part_path())?;
            fs::rename(&data, slot.part_path())
                .map_err(|e| FetchError::filesystem(&data, e))?;
            entry.demote(expected);
            entry.save(&slot.dir)?;
            return Ok(SlotState::Partial(entry));
        }
        if actual_size > expected {
            debug!("Cached {} has unexpected size, refetching", slot.key);
            remove_if_exists(&data)?;
            return Ok(SlotState::Empty);
        }
    }

    let expected_hash = hash.or(entry.hash.as_ref()).cloned();
    if let Some(expected) = expected_hash {
        let actual = file_checksum(&data, expected.algorithm)
            .map_err(|e| FetchError::filesystem(&data, e))?;
        if !expected.matches(&actual) {
            debug!("Cached {} is stale ({} changed), refetching", slot.key, expected.algorithm);
            remove_if_exists(&data)?;
            return Ok(SlotState::Empty);
        }
        entry.hash = Some(expected);
    }

    entry.size = Some(actual_size);
    entry.verified_at = Some(chrono::Utc::now());
    entry.save(&slot.dir)?;
    Ok(SlotState::Ready)
}

fn file_matches(path: &Path, size: u64, hash: &Checksum) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() == size => hash
            .verify_file(path)
            .map_err(|e| FetchError::filesystem(path, e)),
        _ => Ok(false),
    }
}

/// The declared digest, or an MD5 of the stored bytes when none was declared
fn recorded_digest(path: &Path, declared: Option<&Checksum>) -> Result<Checksum> {
    match declared {
        Some(hash) => Ok(hash.clone()),
        None => file_checksum(path, ChecksumAlgorithm::Md5)
            .map(Checksum::md5)
            .map_err(|e| FetchError::filesystem(path, e)),
    }
}

/// Keep catalog file names intact unless they could escape the slot
fn safe_file_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed == crate::entry::ENTRY_FILE {
        format!("_{}", trimmed)
    } else if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(|c| c == '/' || c == '\\')
    {
        sanitize_component(trimmed)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("Street Fighter II (World).mra"), "Street Fighter II (World).mra");
        assert_eq!(safe_file_name("../evil"), "_evil");
        assert_eq!(safe_file_name("entry.json"), "_entry.json");
    }
}
