//! Cached catalog documents
//!
//! Every catalog document is published as `<file>.zip` under a base URL and
//! cached in `<cache>/db/`. A plain `<file>` placed next to the archive takes
//! precedence, which lets a local catalog be tested without publishing it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zx3dl_core::types::Checksum;
use zx3dl_fetch::archive::read_member;
use zx3dl_fetch::{DownloadEngine, TransferRequest};

use crate::error::{CatalogError, Result};

/// A catalog document as its parent catalog describes it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocumentRef {
    /// JSON file name, e.g. `zx3_main_db.json`
    pub file: String,
    /// Base URL the `<file>.zip` archive lives under
    pub url: String,
    /// MD5 of the archive; blank when unknown
    #[serde(default)]
    pub hash: Option<String>,
    /// Size of the archive; zero when unknown
    #[serde(default)]
    pub size: Option<u64>,
}

impl DocumentRef {
    pub fn new(file: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            url: url.into(),
            hash: None,
            size: None,
        }
    }

    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.file)
    }

    /// `<url>/<file>.zip`, resolved the way a browser resolves a relative link
    pub fn archive_url(&self) -> Result<String> {
        let base = url::Url::parse(&self.url)
            .map_err(|e| CatalogError::invalid_url(&self.url, e))?;
        base.join(&self.archive_name())
            .map(String::from)
            .map_err(|e| CatalogError::invalid_url(&self.url, e))
    }

    pub fn checksum(&self) -> Option<Checksum> {
        Checksum::md5_opt(self.hash.as_deref())
    }

    pub fn expected_size(&self) -> Option<u64> {
        self.size.filter(|size| *size > 0)
    }
}

/// How much the store trusts its cached copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Use the cached archive when it matches the declared size and hash
    UseCache,
    /// Download again, falling back to the cached archive when offline
    RefreshWithFallback,
    /// Drop the cached archive and download again
    ForceRefresh,
}

/// The `<cache>/db/` directory
#[derive(Clone)]
pub struct MetadataStore {
    dir: PathBuf,
    engine: DownloadEngine,
}

impl MetadataStore {
    pub fn new(cache_root: &Path, engine: DownloadEngine) -> Self {
        Self {
            dir: cache_root.join("db"),
            engine,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn archive_path(&self, doc: &DocumentRef) -> PathBuf {
        self.dir.join(doc.archive_name())
    }

    fn override_path(&self, doc: &DocumentRef) -> PathBuf {
        self.dir.join(&doc.file)
    }

    /// Make sure a usable copy of `doc` is on disk and return its path
    pub async fn fetch_document(&self, doc: &DocumentRef, mode: FetchMode) -> Result<PathBuf> {
        let plain = self.override_path(doc);
        if plain.is_file() {
            debug!("Using local {}", plain.display());
            return Ok(plain);
        }

        let archive = self.archive_path(doc);
        match mode {
            FetchMode::UseCache => {
                if self.is_current(doc, &archive)? {
                    debug!("{} is up to date", doc.file);
                    return Ok(archive);
                }
                self.download(doc, &archive).await?;
            }
            FetchMode::ForceRefresh => {
                self.purge(doc)?;
                self.download(doc, &archive).await?;
            }
            FetchMode::RefreshWithFallback => {
                if let Err(err) = self.download(doc, &archive).await {
                    if archive.is_file() {
                        warn!("{}; using cached copy of {}", err, doc.file);
                    } else {
                        return Err(err);
                    }
                }
            }
        }
        Ok(archive)
    }

    /// Fetch `doc` and parse its JSON
    pub async fn load<T: DeserializeOwned>(&self, doc: &DocumentRef, mode: FetchMode) -> Result<T> {
        let path = self.fetch_document(doc, mode).await?;
        let bytes = if path == self.override_path(doc) {
            fs::read(&path).map_err(|e| CatalogError::io(&path, e))?
        } else {
            read_member(&path, &doc.file).map_err(|e| CatalogError::fetch(&doc.file, e))?
        };
        serde_json::from_slice(&bytes).map_err(|e| CatalogError::parse(&doc.file, e))
    }

    /// Remove the cached archive of `doc`. Returns whether one existed.
    pub fn purge(&self, doc: &DocumentRef) -> Result<bool> {
        let archive = self.archive_path(doc);
        match fs::remove_file(&archive) {
            Ok(()) => {
                debug!("Purged {}", archive.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CatalogError::io(&archive, e)),
        }
    }

    fn is_current(&self, doc: &DocumentRef, archive: &Path) -> Result<bool> {
        let meta = match fs::metadata(archive) {
            Ok(meta) => meta,
            Err(_) => return Ok(false),
        };
        if doc.expected_size().is_some_and(|size| size != meta.len()) {
            return Ok(false);
        }
        match doc.checksum() {
            Some(hash) => hash
                .verify_file(archive)
                .map_err(|e| CatalogError::io(archive, e)),
            None => Ok(true),
        }
    }

    async fn download(&self, doc: &DocumentRef, archive: &Path) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| CatalogError::io(&self.dir, e))?;
        let url = doc.archive_url()?;
        let hash = doc.checksum();
        let request =
            TransferRequest::new(&url, &doc.file).with_expected(doc.expected_size(), hash.as_ref());

        info!("Fetching {}", doc.file);
        self.engine
            .fetch(&request, archive)
            .await
            .map_err(|e| CatalogError::fetch(&doc.file, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_url_joins_like_a_browser() {
        let doc = DocumentRef::new("zx3_main_db.json", "https://example.com/raw/bd/");
        assert_eq!(
            doc.archive_url().unwrap(),
            "https://example.com/raw/bd/zx3_main_db.json.zip"
        );

        let no_slash = DocumentRef::new("mra_db.json", "https://example.com/raw/bd/main.json");
        assert_eq!(
            no_slash.archive_url().unwrap(),
            "https://example.com/raw/bd/mra_db.json.zip"
        );
    }

    #[test]
    fn test_blank_hash_and_zero_size_are_unknown() {
        let doc: DocumentRef = serde_json::from_str(
            r#"{"file": "cores_db.json", "url": "https://example.com/", "hash": "", "size": 0}"#,
        )
        .unwrap();
        assert!(doc.checksum().is_none());
        assert!(doc.expected_size().is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        let doc = DocumentRef::new("x.json", "not a url");
        assert!(matches!(
            doc.archive_url(),
            Err(CatalogError::InvalidUrl { .. })
        ));
    }
}
