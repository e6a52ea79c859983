//! # zx3dl-core
//!
//! Core library for the zx3dl SD card builder providing:
//! - The canonical catalog model (`Item`, `Source`, `Checksum`, selection enums)
//! - Runtime configuration with embedded defaults and layered overrides
//! - Retry execution engine with policy-based configuration
//! - Run-level failure accounting shared by every stage

pub mod config;
pub mod error;
pub mod retry;
pub mod types;
pub mod utils;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use utils::get_home_dir;
