//! Content digests
//!
//! The published catalogs carry MD5 digests; SHA-256 is accepted for
//! hand-written catalogs and extra sources.

use crate::error::Error;
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

/// Digest algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl FromStr for ChecksumAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            _ => Err(Error::InvalidChecksum {
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => f.write_str("md5"),
            Self::Sha256 => f.write_str("sha256"),
        }
    }
}

/// An expected digest: algorithm plus lowercase hex value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: ChecksumAlgorithm,
    pub value: String,
}

impl Checksum {
    pub fn new(algorithm: ChecksumAlgorithm, value: impl AsRef<str>) -> Self {
        Self {
            algorithm,
            value: value.as_ref().trim().to_ascii_lowercase(),
        }
    }

    pub fn md5(value: impl AsRef<str>) -> Self {
        Self::new(ChecksumAlgorithm::Md5, value)
    }

    pub fn sha256(value: impl AsRef<str>) -> Self {
        Self::new(ChecksumAlgorithm::Sha256, value)
    }

    /// Build an MD5 checksum from an optional catalog field, ignoring blanks
    pub fn md5_opt(value: Option<&str>) -> Option<Self> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Self::md5)
    }

    /// Compare against a computed hex digest
    pub fn matches(&self, hex: &str) -> bool {
        self.value.eq_ignore_ascii_case(hex.trim())
    }

    pub fn hasher(&self) -> ChecksumHasher {
        ChecksumHasher::new(self.algorithm)
    }

    /// Hash a file on disk and compare
    pub fn verify_file(&self, path: &Path) -> io::Result<bool> {
        let actual = file_checksum(path, self.algorithm)?;
        Ok(self.matches(&actual))
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.value)
    }
}

/// Incremental hasher for either algorithm
pub enum ChecksumHasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl ChecksumHasher {
    pub fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Self::Md5(Md5::new()),
            ChecksumAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.update(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize_hex(self) -> String {
        let bytes = match self {
            Self::Md5(h) => h.finalize().to_vec(),
            Self::Sha256(h) => h.finalize().to_vec(),
        };
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Stream a file through the hasher in 1 MiB chunks
pub fn file_checksum(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = ChecksumHasher::new(algorithm);
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(hasher.finalize_hex())
}
