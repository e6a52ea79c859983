//! Destination tree handling for zx3dl
//!
//! This crate provides:
//! - Destination planning for the grouping modes
//! - The tree builder (clean, keep and replace policies)
//! - Arcade ARC generation through the external `mra` tool
//! - Autoboot installation as tokenized +3DOS programs

pub mod arc;
pub mod autoboot;
pub mod error;
pub mod plan;
pub mod plus3dos;
pub mod tree;

pub use arc::{ArcConverter, ArcJob, MraTool};
pub use autoboot::{AutobootInstaller, AutobootOutcome, Variant, AUTOBOOT_FILE};
pub use error::{LayoutError, Result};
pub use plan::{plan, Conflict, DestinationPlan, PlannedItem};
pub use tree::{copy_atomic, ArtifactResolver, TreeBuilder};
