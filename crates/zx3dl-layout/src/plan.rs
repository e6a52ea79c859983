//! Destination planning
//!
//! Maps every selected item to the paths it occupies below the destination
//! root. Only cores move with the grouping mode:
//!
//! ```text
//! Flat           ZX3/core.zx3
//! ByType         ZX3/ZX3/core.zx3
//! ByTag          ZX3/ARCADE/core.zx3, ZX3/CONSOLE/core.zx3
//! ByTypeThenTag  ZX3/ZX3/ARCADE/core.zx3
//! ```

use camino::Utf8PathBuf;
use std::collections::HashMap;
use tracing::warn;
use zx3dl_core::types::{GroupingMode, Item, ItemKey, Selection};

/// An item and the destination paths it is written to
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub item: Item,
    pub targets: Vec<Utf8PathBuf>,
}

/// A destination path claimed by more than one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: Utf8PathBuf,
    pub kept: ItemKey,
    pub rejected: ItemKey,
}

#[derive(Debug, Clone, Default)]
pub struct DestinationPlan {
    /// Items copied into the tree, in selection order
    pub placed: Vec<PlannedItem>,
    /// Items only needed in the cache (arcade converter inputs)
    pub inputs: Vec<Item>,
    pub conflicts: Vec<Conflict>,
}

impl DestinationPlan {
    /// Managed top-level directories, each listed once
    pub fn managed_dirs(&self) -> Vec<Utf8PathBuf> {
        let mut dirs: Vec<Utf8PathBuf> = Vec::new();
        for entry in self.placed.iter().filter(|p| p.item.dest.managed) {
            if let Some(top) = entry.item.dest.top_level() {
                let top = Utf8PathBuf::from(top);
                if !dirs.contains(&top) {
                    dirs.push(top);
                }
            }
        }
        dirs
    }
}

/// Destination paths for one item
pub fn targets_for(item: &Item, selection: &Selection, grouping: GroupingMode) -> Vec<Utf8PathBuf> {
    let dest = &item.dest;
    if !item.is_core() {
        return vec![dest.flat_path()];
    }

    let typed_dir = match item.core_type {
        Some(core_type) => dest.dir.join(core_type.dir_name()),
        None => dest.dir.clone(),
    };

    match grouping {
        GroupingMode::Flat => vec![dest.flat_path()],
        GroupingMode::ByType => vec![typed_dir.join(&dest.file_name)],
        GroupingMode::ByTag | GroupingMode::ByTypeThenTag => {
            let base = if grouping == GroupingMode::ByTag {
                &dest.dir
            } else {
                &typed_dir
            };
            let tagged: Vec<Utf8PathBuf> = selection
                .grouping_tags(&item.tags)
                .map(|tag| base.join(tag.dir_name()).join(&dest.file_name))
                .collect();
            if tagged.is_empty() {
                vec![base.join(&dest.file_name)]
            } else {
                tagged
            }
        }
    }
}

/// Plan the whole selection; the first item to claim a path keeps it
pub fn plan(items: &[Item], selection: &Selection, grouping: GroupingMode) -> DestinationPlan {
    let mut result = DestinationPlan::default();
    let mut claimed: HashMap<Utf8PathBuf, ItemKey> = HashMap::new();

    for item in items {
        if !item.is_placed() {
            result.inputs.push(item.clone());
            continue;
        }

        let mut targets = Vec::new();
        for path in targets_for(item, selection, grouping) {
            match claimed.get(&path) {
                Some(owner) if *owner != item.key => {
                    warn!("{} is already claimed by {}, skipping {}", path, owner, item.key);
                    result.conflicts.push(Conflict {
                        path,
                        kept: owner.clone(),
                        rejected: item.key.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    claimed.insert(path.clone(), item.key.clone());
                    targets.push(path);
                }
            }
        }

        if !targets.is_empty() {
            result.placed.push(PlannedItem {
                item: item.clone(),
                targets,
            });
        }
    }
    result
}
