//! Error types for zx3dl-layout

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LayoutError>;

#[derive(Error, Debug)]
pub enum LayoutError {
    /// The destination root exists but cannot hold a tree
    #[error("Invalid destination {}: {message}", path.display())]
    InvalidRoot { path: PathBuf, message: String },

    #[error("Filesystem error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template {name} failed: {message}")]
    Template { name: String, message: String },

    /// The ARC converter ran but did not succeed
    #[error("Conversion of {mra} failed: {message}")]
    Conversion { mra: String, message: String },
}

impl LayoutError {
    pub fn invalid_root(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidRoot {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn template(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Template {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn conversion(mra: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            mra: mra.into(),
            message: message.into(),
        }
    }
}
