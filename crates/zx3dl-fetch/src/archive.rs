//! Single-member extraction from container ZIPs

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

use crate::download::remove_if_exists;
use crate::error::{FetchError, Result};

/// Copy `member` out of the ZIP at `container` into `dest`
///
/// The bytes go to `<dest>.part` first and are renamed into place, so a
/// half-written member never looks complete. Returns the member size.
pub fn extract_member(container: &Path, member: &str, dest: &Path) -> Result<u64> {
    let file = File::open(container).map_err(|e| FetchError::filesystem(container, e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| FetchError::archive(container, e.to_string()))?;

    let mut entry = archive.by_name(member).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => {
            FetchError::archive(container, format!("member {} not found", member))
        }
        other => FetchError::archive(container, other.to_string()),
    })?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| FetchError::filesystem(parent, e))?;
    }

    let part = crate::download::DownloadEngine::partial_path(dest);
    let mut out = File::create(&part).map_err(|e| FetchError::filesystem(&part, e))?;
    let written = io::copy(&mut entry, &mut out).map_err(|e| {
        if e.kind() == io::ErrorKind::InvalidData {
            FetchError::archive(container, format!("corrupt member {}: {}", member, e))
        } else {
            FetchError::filesystem(&part, e)
        }
    });
    let written = match written {
        Ok(n) => n,
        Err(e) => {
            drop(out);
            remove_if_exists(&part)?;
            return Err(e);
        }
    };
    out.sync_all().map_err(|e| FetchError::filesystem(&part, e))?;
    drop(out);

    remove_if_exists(dest)?;
    fs::rename(&part, dest).map_err(|e| FetchError::filesystem(dest, e))?;
    debug!("Extracted {} ({} bytes) from {}", member, written, container.display());
    Ok(written)
}

/// Largest buffer reserved up front from a member's declared size
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// Initial buffer size for a member; the header value is untrusted
fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// Read a whole member into memory (catalog documents)
pub fn read_member(container: &Path, member: &str) -> Result<Vec<u8>> {
    let file = File::open(container).map_err(|e| FetchError::filesystem(container, e))?;
    let mut archive =
        ZipArchive::new(file).map_err(|e| FetchError::archive(container, e.to_string()))?;
    let mut entry = archive
        .by_name(member)
        .map_err(|e| FetchError::archive(container, format!("{}: {}", member, e)))?;
    let mut buf = Vec::with_capacity(initial_capacity(entry.size()));
    io::copy(&mut entry, &mut buf)
        .map_err(|e| FetchError::archive(container, format!("{}: {}", member, e)))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, members: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, data) in members {
            writer
                .start_file(*name, SimpleFileOptions::default())
                .unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_extract_single_member() {
        let dir = TempDir::new().unwrap();
        let container = dir.path().join("pack.zip");
        write_zip(
            &container,
            &[("SYS/config.ini", b"boot=1"), ("BIN/tool", b"binary")],
        );

        let dest = dir.path().join("out/config.ini");
        let size = extract_member(&container, "SYS/config.ini", &dest).unwrap();

        assert_eq!(size, 6);
        assert_eq!(fs::read(&dest).unwrap(), b"boot=1");
        assert!(!dir.path().join("out/config.ini.part").exists());
    }

    #[test]
    fn test_missing_member_is_archive_error() {
        let dir = TempDir::new().unwrap();
        let container = dir.path().join("pack.zip");
        write_zip(&container, &[("a", b"1")]);

        let err = extract_member(&container, "b", &dir.path().join("b")).unwrap_err();
        assert!(matches!(err, FetchError::Archive { .. }));
    }

    #[test]
    fn test_declared_size_does_not_drive_allocation() {
        assert_eq!(initial_capacity(0), 0);
        assert_eq!(initial_capacity(4096), 4096);
        assert_eq!(initial_capacity(u64::MAX), MAX_PREALLOC as usize);
    }

    #[test]
    fn test_read_member_returns_document_bytes() {
        let dir = TempDir::new().unwrap();
        let container = dir.path().join("db.json.zip");
        write_zip(&container, &[("db.json", br#"{"files": {}}"#)]);

        assert_eq!(read_member(&container, "db.json").unwrap(), br#"{"files": {}}"#);
    }

    #[test]
    fn test_not_a_zip() {
        let dir = TempDir::new().unwrap();
        let container = dir.path().join("pack.zip");
        fs::write(&container, b"plain text").unwrap();
        assert!(matches!(
            read_member(&container, "x"),
            Err(FetchError::Archive { .. })
        ));
    }
}
