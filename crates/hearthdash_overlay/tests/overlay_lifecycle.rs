use std::fs;

use hearthdash_overlay::model::{move_item, Category, PageOrder};
use hearthdash_overlay::overlay::{ExportScope, ImportMode, CURRENT_VERSION};
use hearthdash_overlay::resolve::{devices_in_room, order_by_id, resolve_page, resolve_view};
use hearthdash_overlay::storage::{FileStorage, KeyValuePersistence, Persistence, OVERLAY_KEY};
use hearthdash_overlay::{Catalog, OverlayStore};
use serde_json::json;
use tempfile::TempDir;

fn catalog(sections: &[&str]) -> Catalog {
    let sections: Vec<_> = sections
        .iter()
        .map(|key| json!({ "key": key, "panelIds": [format!("{}-panel", key)] }))
        .collect();

    let document = json!({
        "pages": [{ "key": "heizung", "title": "Heizung", "sections": sections }],
        "controlPanels": {
            "heating-1": {
                "name": "Heating",
                "states": { "mode": { "state": "hm.0.mode", "widget": "dropdown", "displayAs": { "0": "Off", "1": "Auto" } } }
            }
        },
        "devices": {
            "climate": [{
                "id": "hm.0.living",
                "name": "Living room",
                "room": "living",
                "type": "climate",
                "states": { "currentTemp": "hm.0.living.actual", "targetTemp": "hm.0.living.set" },
                "config": { "minTemp": 5.0, "maxTemp": 30.0, "step": 0.5, "unit": "°C" }
            }]
        },
        "links": [{ "id": "links-router", "name": "Router", "url": "http://192.168.1.1", "iconKey": "router" }]
    });

    Catalog::from_json(&document.to_string()).unwrap()
}

fn file_store(dir: &TempDir, catalog: &Catalog) -> OverlayStore<KeyValuePersistence<FileStorage>> {
    let persistence = KeyValuePersistence::new(FileStorage::new(dir.path()));
    OverlayStore::open(persistence, catalog).unwrap()
}

#[test]
fn test_section_order_survives_catalog_growth() {
    let temp_dir = TempDir::new().unwrap();
    let before = catalog(&["A", "B", "C"]);
    let mut store = file_store(&temp_dir, &before);

    let base = resolve_page(&before, "heizung", store.overlay()).section_order;
    assert_eq!(base, vec!["A", "B", "C"]);

    let moved = move_item(&base, "C", "A");
    assert_eq!(moved, vec!["C", "A", "B"]);
    store
        .set_order(
            "heizung",
            PageOrder {
                section_order: moved,
                ..Default::default()
            },
        )
        .unwrap();

    let after = catalog(&["A", "B", "C", "D"]);
    let store = file_store(&temp_dir, &after);
    let resolved = resolve_page(&after, "heizung", store.overlay());
    assert_eq!(resolved.section_order, vec!["C", "A", "B", "D"]);
    assert_eq!(
        resolved.panel_id_order,
        vec!["C-panel", "A-panel", "B-panel", "D-panel"]
    );

    // Dropping a section from the catalog drops it from the result too
    let shrunk = catalog(&["A", "C"]);
    let resolved = resolve_page(&shrunk, "heizung", store.overlay());
    assert_eq!(resolved.section_order, vec!["C", "A"]);
}

#[test]
fn test_panel_override_and_revert() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = catalog(&["A"]);
    let mut store = file_store(&temp_dir, &catalog);

    let mut edited = catalog.panels()["heating-1"].clone();
    edited.name = "Heating (custom)".to_string();
    store.update_panel("heating-1", edited).unwrap();

    let view = resolve_view(&catalog, store.overlay());
    assert_eq!(view.panels["heating-1"].name, "Heating (custom)");

    store.remove_panel("heating-1").unwrap();
    let view = resolve_view(&catalog, store.overlay());
    assert_eq!(view.panels["heating-1"].name, "Heating");

    let options = view.panels["heating-1"].states["mode"].dropdown_options();
    assert_eq!(options.len(), 2);
    assert_eq!(options[1].label, "Auto");
}

#[test]
fn test_overlay_persists_across_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = catalog(&["A"]);

    {
        let mut store = file_store(&temp_dir, &catalog);
        store
            .import_str(
                r#"{"userDevices": {"climate": [{
                    "id": "hm.0.office", "name": "Office", "room": "office", "type": "climate",
                    "states": {"currentTemp": "hm.0.office.actual", "targetTemp": "hm.0.office.set"},
                    "config": {"minTemp": 5.0, "maxTemp": 30.0, "step": 0.5, "unit": "°C"}
                }]}}"#,
                ImportMode::Merge,
            )
            .unwrap();
    }

    let raw: serde_json::Value =
        serde_json::from_slice(&fs::read(temp_dir.path().join(format!("{}.json", OVERLAY_KEY))).unwrap())
            .unwrap();
    assert_eq!(raw["version"], CURRENT_VERSION);

    let store = file_store(&temp_dir, &catalog);
    let view = resolve_view(&catalog, store.overlay());
    let climate: Vec<_> = view.devices.climate.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(climate, vec!["hm.0.living", "hm.0.office"]);
    assert_eq!(devices_in_room(&view.devices, "office").count(), 1);
    assert!(store.overlay().user_devices.find(Category::Climate, "hm.0.office").is_some());
}

#[test]
fn test_v1_blob_is_migrated_on_open() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join(format!("{}.json", OVERLAY_KEY)),
        json!({
            "version": 1,
            "state": {
                "userDevices": { "switches": [{ "id": "s1", "name": "Lamp", "room": "office", "type": "switch", "isUserAdded": true }] },
                "userControlPanels": {}
            }
        })
        .to_string(),
    )
    .unwrap();

    let catalog = catalog(&["A"]);
    let mut store = file_store(&temp_dir, &catalog);
    assert_eq!(store.overlay().user_links, catalog.default_links());
    assert!(store.overlay().user_panel_order.is_empty());

    // Nothing is rewritten until the next mutation
    let persistence = KeyValuePersistence::new(FileStorage::new(temp_dir.path()));
    assert_eq!(persistence.load().unwrap().unwrap().version, 1);

    store.reset_order("heizung").unwrap();
    store.remove_device(Category::Switch, "s1").unwrap();
    assert_eq!(persistence.load().unwrap().unwrap().version, CURRENT_VERSION);
}

#[test]
fn test_export_then_import_elsewhere() {
    let source_dir = TempDir::new().unwrap();
    let target_dir = TempDir::new().unwrap();
    let catalog = catalog(&["A", "B"]);

    let mut source = file_store(&source_dir, &catalog);
    source
        .set_order(
            "heizung",
            PageOrder {
                section_order: vec!["B".to_string()],
                ..Default::default()
            },
        )
        .unwrap();
    source.replace_links(Vec::new()).unwrap();
    let backup = serde_json::to_string(&source.export(ExportScope::All)).unwrap();

    let mut target = file_store(&target_dir, &catalog);
    target.import_str(&backup, ImportMode::Replace).unwrap();

    assert_eq!(target.overlay(), source.overlay());
    assert!(target.overlay().user_links.is_empty());
}

#[test]
fn test_order_panel_records() {
    let catalog = catalog(&["A", "B"]);
    let order = resolve_page(&catalog, "heizung", &Default::default()).panel_id_order;

    let records = vec![
        ("B-panel", 2),
        ("other", 3),
        ("A-panel", 1),
    ];
    let ordered = order_by_id(records, &order, |record| record.0);
    assert_eq!(ordered, vec![("A-panel", 1), ("B-panel", 2), ("other", 3)]);
}
