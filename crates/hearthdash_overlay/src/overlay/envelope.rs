use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

use crate::model::{ControlPanel, DeviceLists, Link, PageOrder};

/// The in-memory overlay: everything the user has customized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub user_devices: DeviceLists,
    #[serde(default)]
    pub user_control_panels: BTreeMap<String, ControlPanel>,
    #[serde(default)]
    pub user_links: Vec<Link>,
    #[serde(default)]
    pub user_panel_order: BTreeMap<String, PageOrder>,
}

impl Envelope {
    /// A fresh overlay seeded with the given links.
    pub fn with_links(links: &[Link]) -> Self {
        Self {
            user_links: links.to_vec(),
            ..Default::default()
        }
    }

    pub fn to_stored(&self, version: u32) -> Result<StoredEnvelope, serde_json::Error> {
        let state = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(StoredEnvelope { version, state })
    }

    pub fn export(&self, scope: ExportScope) -> OverlayDocument {
        let mut document = OverlayDocument::default();
        if matches!(scope, ExportScope::All | ExportScope::Devices) {
            document.user_devices = Some(self.user_devices.clone());
        }
        if matches!(scope, ExportScope::All | ExportScope::Panels) {
            document.user_control_panels = Some(self.user_control_panels.clone());
        }
        if scope == ExportScope::All {
            document.user_links = Some(self.user_links.clone());
            document.user_panel_order = Some(self.user_panel_order.clone());
        }
        document
    }
}

/// The envelope as written to durable storage: a schema version and the raw
/// state object, which may predate fields added in later versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEnvelope {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub state: Map<String, Value>,
}

/// Portable backup/restore document. Every part is optional so partial
/// exports can be imported too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_devices: Option<DeviceLists>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_control_panels: Option<BTreeMap<String, ControlPanel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_links: Option<Vec<Link>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_panel_order: Option<BTreeMap<String, PageOrder>>,
}

/// Which parts of the overlay an export contains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportScope {
    #[default]
    All,
    Devices,
    Panels,
}
