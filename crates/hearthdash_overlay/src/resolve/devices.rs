use crate::model::{Device, DeviceLists};

/// Combine catalog and overlay devices per category.
///
/// Catalog devices always come first, followed by overlay devices, each group
/// in its own order. No deduplication is done.
pub fn resolve_devices(catalog: &DeviceLists, overlay: &DeviceLists) -> DeviceLists {
    fn concat(a: &[Device], b: &[Device]) -> Vec<Device> {
        a.iter().chain(b).cloned().collect()
    }

    DeviceLists {
        climate: concat(&catalog.climate, &overlay.climate),
        sensors: concat(&catalog.sensors, &overlay.sensors),
        switches: concat(&catalog.switches, &overlay.switches),
        shutters: concat(&catalog.shutters, &overlay.shutters),
    }
}

/// Resolved devices located in `room`, across all categories.
pub fn devices_in_room<'a>(devices: &'a DeviceLists, room: &'a str) -> impl Iterator<Item = &'a Device> {
    devices.iter().filter(move |d| d.room == room)
}
