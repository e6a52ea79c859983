//! Selection of the items to install

use zx3dl_core::types::{Item, Selection};

use crate::aggregate::Catalog;

/// Whether `item` passes the kind, type and tag gates
///
/// Items without a kind or type are support files and pass those gates.
/// Untagged items only come from documents without a tag dictionary; they,
/// and any item when no tags were requested, pass the tag gate.
pub fn matches(item: &Item, selection: &Selection) -> bool {
    let kind_ok = item.kind.map_or(true, |kind| selection.kinds.contains(&kind));
    let type_ok = item
        .core_type
        .map_or(true, |core_type| selection.types.contains(&core_type));
    let tags_ok = selection.tags.is_empty()
        || item.tags.is_empty()
        || item.tags.iter().any(|tag| selection.tags.contains(tag));
    kind_ok && type_ok && tags_ok
}

/// Selected items in catalog order
pub fn filter(catalog: &Catalog, selection: &Selection) -> Vec<Item> {
    filter_items(catalog.items(), selection)
}

pub fn filter_items(items: &[Item], selection: &Selection) -> Vec<Item> {
    items
        .iter()
        .filter(|item| matches(item, selection))
        .cloned()
        .collect()
}
