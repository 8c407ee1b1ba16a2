//! Pure functions combining the catalog and the overlay into the resolved view.
//!
//! Nothing here keeps state or performs I/O, so callers may recompute the view
//! on every change.

mod devices;
mod order;
mod panels;

use std::collections::BTreeMap;

use serde::Serialize;

pub use devices::devices_in_room;
pub use devices::resolve_devices;
pub use order::merge_order;
pub use order::order_by_id;
pub use order::resolve_page_order;
pub use order::ResolvedOrder;
pub use panels::resolve_panels;

use crate::catalog::Catalog;
use crate::model::{ControlPanel, DeviceLists};
use crate::overlay::Envelope;

/// Everything the rendering layer needs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedView {
    pub devices: DeviceLists,
    pub panels: BTreeMap<String, ControlPanel>,
    pub pages: BTreeMap<String, ResolvedOrder>,
}

/// Resolve devices, panels and the order of every catalog page.
pub fn resolve_view(catalog: &Catalog, overlay: &Envelope) -> ResolvedView {
    let pages = catalog
        .pages()
        .iter()
        .map(|page| {
            let order = resolve_page_order(page, overlay.user_panel_order.get(&page.key));
            (page.key.clone(), order)
        })
        .collect();

    ResolvedView {
        devices: resolve_devices(catalog.devices(), &overlay.user_devices),
        panels: resolve_panels(catalog.panels(), &overlay.user_control_panels),
        pages,
    }
}

/// Resolve the order of a single page. Unknown pages have no sections.
pub fn resolve_page(catalog: &Catalog, page_key: &str, overlay: &Envelope) -> ResolvedOrder {
    match catalog.page(page_key) {
        Some(page) => resolve_page_order(page, overlay.user_panel_order.get(page_key)),
        None => ResolvedOrder::default(),
    }
}
