use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::catalog::Page;
use crate::model::PageOrder;

/// Effective arrangement of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedOrder {
    pub section_order: Vec<String>,
    pub panel_order: BTreeMap<String, Vec<String>>,
    /// All panel ids of the page, section by section in effective order
    pub panel_id_order: Vec<String>,
}

/// Apply the relative order of `overrides` to `base`.
///
/// Entries of `overrides` that are not in `base` are dropped, repeated entries
/// count once, and every `base` element the override does not mention is
/// appended in `base` order. The result is always a permutation of `base`.
pub fn merge_order(base: &[String], overrides: &[String]) -> Vec<String> {
    if overrides.is_empty() {
        return base.to_vec();
    }

    let known: HashSet<&str> = base.iter().map(String::as_str).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(overrides.len());
    let mut merged: Vec<String> = Vec::with_capacity(base.len());

    for item in overrides {
        if known.contains(item.as_str()) && seen.insert(item.as_str()) {
            merged.push(item.clone());
        }
    }
    for item in base {
        if !seen.contains(item.as_str()) {
            merged.push(item.clone());
        }
    }

    merged
}

/// Compute section order and per-section panel order for `page`.
pub fn resolve_page_order(page: &Page, overrides: Option<&PageOrder>) -> ResolvedOrder {
    let no_override: &[String] = &[];
    let section_order = merge_order(
        &page.section_keys(),
        overrides.map_or(no_override, |o| o.section_order.as_slice()),
    );

    let mut panel_order = BTreeMap::new();
    let mut panel_id_order = Vec::new();
    for key in &section_order {
        let base = page
            .section(key)
            .map(|s| s.panel_ids.as_slice())
            .unwrap_or_default();
        let section_override = overrides
            .and_then(|o| o.panel_order.get(key))
            .map_or(no_override, Vec::as_slice);

        let panels = merge_order(base, section_override);
        panel_id_order.extend(panels.iter().cloned());
        panel_order.insert(key.clone(), panels);
    }

    ResolvedOrder {
        section_order,
        panel_order,
        panel_id_order,
    }
}

/// Arrange `items` by `order`; items whose id is not in `order` follow in
/// their original order.
pub fn order_by_id<T, F>(items: Vec<T>, order: &[String], id_of: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if order.is_empty() {
        return items;
    }

    let mut pending: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut ordered = Vec::with_capacity(pending.len());

    for id in order {
        let found = pending
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|item| id_of(item) == id));
        if let Some(idx) = found {
            if let Some(item) = pending[idx].take() {
                ordered.push(item);
            }
        }
    }
    ordered.extend(pending.into_iter().flatten());

    ordered
}
