use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A user's reordering of one page: section keys, and panel identifiers per
/// section. Both parts are optional and may be stale against the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOrder {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section_order: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub panel_order: BTreeMap<String, Vec<String>>,
}

impl PageOrder {
    pub fn is_empty(&self) -> bool {
        self.section_order.is_empty() && self.panel_order.values().all(Vec::is_empty)
    }
}

/// Move `from` to the position currently held by `to`.
///
/// Returns the list unchanged when either key is missing or both are equal.
pub fn move_item(items: &[String], from: &str, to: &str) -> Vec<String> {
    let from_index = items.iter().position(|item| item == from);
    let to_index = items.iter().position(|item| item == to);

    let mut next = items.to_vec();
    if let (Some(from_index), Some(to_index)) = (from_index, to_index) {
        if from_index != to_index {
            let moved = next.remove(from_index);
            next.insert(to_index, moved);
        }
    }
    next
}
