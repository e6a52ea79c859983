//! Builders for items and cache managers used across fetch tests

use std::io::Write;
use std::path::Path;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zx3dl_core::types::{
    ArchiveRef, Checksum, ChecksumAlgorithm, ChecksumHasher, DestTemplate, Item, ItemKey,
    RetryPolicy, Source,
};
use zx3dl_fetch::{CacheManager, DownloadEngine};

pub const CORE_BYTES: &[u8] = b"ZX3 core image payload";

pub fn md5_of(data: &[u8]) -> Checksum {
    let mut hasher = ChecksumHasher::new(ChecksumAlgorithm::Md5);
    hasher.update(data);
    Checksum::md5(hasher.finalize_hex())
}

/// Engine without backoff delays
pub fn test_engine(max_attempts: u32) -> DownloadEngine {
    DownloadEngine::with_client(reqwest::Client::new(), RetryPolicy::immediate(max_attempts))
}

pub fn test_cache(max_attempts: u32) -> (CacheManager, TempDir) {
    let dir = TempDir::new().unwrap();
    let cache = CacheManager::new(dir.path().join("cache"), test_engine(max_attempts));
    (cache, dir)
}

/// A plain item served from `urls` in priority order
pub fn item_from(name: &str, content: &[u8], urls: &[String]) -> Item {
    let mut sources = urls.iter().map(|url| {
        Source::new(url.clone())
            .with_size(Some(content.len() as u64))
            .with_hash(Some(md5_of(content)))
    });
    let first = sources.next().expect("at least one url");
    let mut item = Item::new(
        ItemKey::new("ZX3/CORES", name),
        name,
        DestTemplate::new("ZX3/CORES", name),
        first,
    );
    item.sources.extend(sources);
    item
}

/// An item that is member `member` of the container at `url`
pub fn archive_item(member: &str, content: &[u8], url: &str, container: &[u8]) -> Item {
    let source = Source::new(url)
        .with_size(Some(content.len() as u64))
        .with_hash(Some(md5_of(content)))
        .in_archive(ArchiveRef {
            member: member.to_string(),
            container_size: Some(container.len() as u64),
            container_hash: Some(md5_of(container)),
        });
    let name = member.rsplit('/').next().unwrap_or(member);
    Item::new(
        ItemKey::new("", member),
        name,
        DestTemplate::new("", name),
        source,
    )
}

pub fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = zip::ZipWriter::new(&mut cursor);
        for (name, data) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

pub fn truncate(path: &Path, len: u64) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(len).unwrap();
}
