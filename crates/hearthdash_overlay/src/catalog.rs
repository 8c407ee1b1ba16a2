//! The Base Catalog: factory-defined devices, control panels and page layout.
//!
//! The catalog is read once from a JSON document and is never mutated
//! afterwards. Everything the user changes lives in the overlay.
//!
//! ```json
//! {
//!   "pages": [
//!     { "key": "heating", "title": "Heating",
//!       "sections": [{ "key": "floors", "title": "Floors", "panelIds": ["heating-1"] }] }
//!   ],
//!   "controlPanels": { "heating-1": { "name": "Heating", "states": {} } },
//!   "devices": { "climate": [], "sensors": [], "switches": [], "shutters": [] },
//!   "links": []
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::model::{normalize_url, Category, ControlPanel, DeviceLists, Link};
use crate::overlay::ReservedIds;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Page '{page}' has a section without key or title")]
    UnnamedSection { page: String },

    #[error("Device '{id}' is listed under '{listed}' but has type '{actual}'")]
    MisfiledDevice {
        id: String,
        listed: Category,
        actual: Category,
    },
}

/// A section of a page: an ordered list of panel identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub key: String,
    pub title: String,
    pub panel_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub key: String,
    pub title: String,
    pub sections: Vec<Section>,
}

impl Page {
    /// Section keys in catalog order.
    pub fn section_keys(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.key.clone()).collect()
    }

    pub fn section(&self, key: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.key == key)
    }
}

/// A place in the page layout where a panel is shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelUsage {
    pub page: String,
    pub section: String,
}

#[derive(Debug, Default)]
pub struct Catalog {
    pages: Vec<Page>,
    panels: BTreeMap<String, ControlPanel>,
    devices: DeviceLists,
    default_links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalog {
    #[serde(default)]
    pages: Vec<RawPage>,
    #[serde(default)]
    control_panels: BTreeMap<String, ControlPanel>,
    #[serde(default)]
    devices: DeviceLists,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct RawPage {
    key: String,
    #[serde(default, alias = "name")]
    title: Option<String>,
    #[serde(default)]
    sections: Vec<RawSection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSection {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "controlPanelIds")]
    panel_ids: Vec<String>,
}

impl Catalog {
    /// Load the catalog from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CatalogError::Io(path.as_ref().to_path_buf(), e))?;

        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(contents)?;

        let mut pages = Vec::with_capacity(raw.pages.len());
        for page in raw.pages {
            let mut sections = Vec::with_capacity(page.sections.len());
            for section in page.sections {
                let key = match section.key.clone().or_else(|| section.title.clone()) {
                    Some(key) => key,
                    None => return Err(CatalogError::UnnamedSection { page: page.key }),
                };
                sections.push(Section {
                    title: section.title.unwrap_or_else(|| key.clone()),
                    key,
                    panel_ids: section.panel_ids,
                });
            }
            pages.push(Page {
                title: page.title.unwrap_or_else(|| page.key.clone()),
                key: page.key,
                sections,
            });
        }

        let mut panels = raw.control_panels;
        for (id, panel) in panels.iter_mut() {
            panel.id = id.clone();
            panel.normalize(id);
            let report = panel.validate();
            if !report.is_valid() {
                warn!("Catalog panel '{}' is incomplete:\n{}", id, report);
            }
        }

        for category in [
            Category::Climate,
            Category::Sensor,
            Category::Switch,
            Category::Shutter,
        ] {
            for device in raw.devices.get(category) {
                if device.category() != category {
                    return Err(CatalogError::MisfiledDevice {
                        id: device.id.clone(),
                        listed: category,
                        actual: device.category(),
                    });
                }
            }
        }

        let default_links = raw
            .links
            .into_iter()
            .map(|mut link| {
                link.url = normalize_url(&link.url);
                link
            })
            .collect();

        Ok(Self {
            pages,
            panels,
            devices: raw.devices,
            default_links,
        })
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, key: &str) -> Option<&Page> {
        self.pages.iter().find(|p| p.key == key)
    }

    pub fn panels(&self) -> &BTreeMap<String, ControlPanel> {
        &self.panels
    }

    pub fn devices(&self) -> &DeviceLists {
        &self.devices
    }

    /// Links a fresh overlay starts with
    pub fn default_links(&self) -> &[Link] {
        &self.default_links
    }

    /// Every page and section that references `panel_id`, without repeats.
    pub fn panel_usage(&self, panel_id: &str) -> Vec<PanelUsage> {
        let mut usage: Vec<PanelUsage> = Vec::new();
        for page in &self.pages {
            for section in &page.sections {
                if !section.panel_ids.iter().any(|id| id == panel_id) {
                    continue;
                }
                let entry = PanelUsage {
                    page: page.title.clone(),
                    section: section.title.clone(),
                };
                if !usage.contains(&entry) {
                    usage.push(entry);
                }
            }
        }
        usage
    }

    /// Identifiers owned by the catalog, which overlay-generated ids must avoid.
    pub fn reserved_ids(&self) -> ReservedIds {
        let mut reserved = ReservedIds::default();
        for device in self.devices.iter() {
            reserved.insert_device(device.category(), &device.id);
        }
        for id in self.panels.keys() {
            reserved.insert_panel(id);
        }
        reserved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "pages": [
            {
                "key": "heizung",
                "title": "Heizung",
                "sections": [
                    { "key": "floors", "title": "Floors", "controlPanelIds": ["heating-1", "heating-2"] },
                    { "title": "Water", "panelIds": ["water-1"] }
                ]
            },
            {
                "key": "dashboard",
                "sections": [{ "key": "overview", "panelIds": ["heating-1"] }]
            }
        ],
        "controlPanels": {
            "heating-1": { "name": "Heating", "states": {} },
            "water-1": { "name": "Hot water", "states": {} }
        },
        "devices": {
            "switches": [
                { "id": "0_userdata.0.devices.outlet1", "name": "Desk Lamp", "room": "office", "type": "switch" }
            ]
        }
    }"#;

    #[test]
    fn test_load_catalog() {
        let catalog = Catalog::from_json(CATALOG).unwrap();

        let page = catalog.page("heizung").unwrap();
        assert_eq!(page.section_keys(), vec!["floors", "Water"]);
        assert_eq!(page.section("Water").unwrap().panel_ids, vec!["water-1"]);
        assert_eq!(catalog.page("dashboard").unwrap().title, "dashboard");

        assert_eq!(catalog.panels()["heating-1"].id, "heating-1");
        assert_eq!(catalog.devices().switches.len(), 1);
        assert!(catalog.default_links().is_empty());
    }

    #[test]
    fn test_panel_usage() {
        let catalog = Catalog::from_json(CATALOG).unwrap();

        let usage = catalog.panel_usage("heating-1");
        assert_eq!(
            usage,
            vec![
                PanelUsage {
                    page: "Heizung".to_string(),
                    section: "Floors".to_string()
                },
                PanelUsage {
                    page: "dashboard".to_string(),
                    section: "overview".to_string()
                },
            ]
        );
        assert!(catalog.panel_usage("unknown").is_empty());
    }

    #[test]
    fn test_unnamed_section() {
        let result = Catalog::from_json(r#"{"pages": [{"key": "p", "sections": [{"panelIds": []}]}]}"#);
        assert!(matches!(result, Err(CatalogError::UnnamedSection { page }) if page == "p"));
    }

    #[test]
    fn test_misfiled_device() {
        let result = Catalog::from_json(
            r#"{"devices": {"climate": [{"id": "x", "name": "X", "room": "r", "type": "switch"}]}}"#,
        );
        assert!(matches!(
            result,
            Err(CatalogError::MisfiledDevice {
                listed: Category::Climate,
                actual: Category::Switch,
                ..
            })
        ));
    }

    #[test]
    fn test_panel_id_follows_map_key() {
        let catalog = Catalog::from_json(
            r#"{"controlPanels": {"heating-1": {"uuid": "stale", "name": "Heating", "states": {}}}}"#,
        )
        .unwrap();
        assert_eq!(catalog.panels()["heating-1"].id, "heating-1");
    }

    #[test]
    fn test_default_link_urls_are_normalized() {
        let catalog = Catalog::from_json(
            r#"{"links": [{"id": "links-nas", "name": "NAS", "url": " nas.local ", "iconKey": "server"}]}"#,
        )
        .unwrap();
        assert_eq!(catalog.default_links()[0].url, "http://nas.local");
    }

    #[test]
    fn test_reserved_ids() {
        let catalog = Catalog::from_json(CATALOG).unwrap();
        let reserved = catalog.reserved_ids();
        assert!(reserved.has_panel("water-1"));
        assert!(reserved.has_device(Category::Switch, "0_userdata.0.devices.outlet1"));
        assert!(!reserved.has_device(Category::Climate, "0_userdata.0.devices.outlet1"));
    }
}
