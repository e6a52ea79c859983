//! Error types for zx3dl-catalog

use std::path::PathBuf;
use thiserror::Error;
use zx3dl_fetch::FetchError;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// The document could not be downloaded and no cached copy exists
    #[error("Failed to fetch {document}: {source}")]
    Fetch {
        document: String,
        #[source]
        source: FetchError,
    },

    #[error("Failed to parse {document}: {source}")]
    Parse {
        document: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// A pack entry in the main catalog lacks something its type needs
    #[error("Invalid pack {pack}: {message}")]
    InvalidPack { pack: String, message: String },

    #[error("Cache error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    pub fn fetch(document: impl Into<String>, source: FetchError) -> Self {
        Self::Fetch {
            document: document.into(),
            source,
        }
    }

    pub fn parse(document: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Parse {
            document: document.into(),
            source,
        }
    }

    pub fn invalid_url(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid_pack(pack: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPack {
            pack: pack.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
