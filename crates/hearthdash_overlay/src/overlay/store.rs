use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::debug;
use tracing::info;

use super::envelope::{Envelope, ExportScope, OverlayDocument};
use super::import::{parse_import, ImportError, ImportMode};
use super::migrate::{migrate, MigrationDefaults, CURRENT_VERSION};
use crate::catalog::Catalog;
use crate::model::{
    normalize_url, Category, ControlPanel, Device, DevicePatch, Link, LinkPatch, PageOrder,
};
use crate::storage::{Persistence, StorageError};
use crate::validation::ValidationReport;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to persist overlay: {0}")]
    Storage(#[from] StorageError),

    #[error("Stored overlay is unreadable: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("Device '{id}' has type '{actual}' but was filed under '{expected}'")]
    CategoryMismatch {
        id: String,
        expected: Category,
        actual: Category,
    },

    #[error("Invalid device '{id}':\n{report}")]
    InvalidDevice { id: String, report: ValidationReport },

    #[error("Invalid panel '{id}':\n{report}")]
    InvalidPanel { id: String, report: ValidationReport },

    #[error("Invalid link '{id}':\n{report}")]
    InvalidLink { id: String, report: ValidationReport },

    #[error("Identifier '{0}' is already in use")]
    DuplicateId(String),

    #[error(transparent)]
    Import(#[from] ImportError),
}

/// Identifiers owned by the catalog. Overlay-created entries never take them.
#[derive(Debug, Clone, Default)]
pub struct ReservedIds {
    devices: HashMap<Category, HashSet<String>>,
    panels: HashSet<String>,
}

impl ReservedIds {
    pub fn insert_device(&mut self, category: Category, id: &str) {
        self.devices
            .entry(category)
            .or_default()
            .insert(id.to_string());
    }

    pub fn insert_panel(&mut self, id: &str) {
        self.panels.insert(id.to_string());
    }

    pub fn has_device(&self, category: Category, id: &str) -> bool {
        self.devices
            .get(&category)
            .is_some_and(|ids| ids.contains(id))
    }

    pub fn has_panel(&self, id: &str) -> bool {
        self.panels.contains(id)
    }
}

/// Counts of what an import brought in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub devices: usize,
    pub panels: usize,
    pub links: usize,
    pub pages: usize,
}

/// Owner of the mutable overlay and its persistence.
///
/// Every mutation is applied to a copy of the overlay, the copy is saved, and
/// only then does it replace the live state. Mutations that find nothing to
/// change do not write. The store is single-writer; callers sharing it must
/// serialize access themselves.
pub struct OverlayStore<P> {
    persistence: P,
    state: Envelope,
    reserved: ReservedIds,
}

impl<P: Persistence> OverlayStore<P> {
    /// Load the overlay, migrating it if it was stored by an older version.
    pub fn open(persistence: P, catalog: &Catalog) -> Result<Self, StoreError> {
        let defaults = MigrationDefaults {
            links: catalog.default_links(),
        };

        let state = match persistence.load()? {
            Some(stored) => {
                debug!("Loaded overlay stored at version {}", stored.version);
                migrate(stored, &defaults).map_err(StoreError::Corrupt)?
            }
            None => {
                info!("No stored overlay found, starting from defaults");
                Envelope::with_links(defaults.links)
            }
        };

        Ok(Self::with_state(persistence, state, catalog.reserved_ids()))
    }

    pub fn with_state(persistence: P, state: Envelope, reserved: ReservedIds) -> Self {
        Self {
            persistence,
            state,
            reserved,
        }
    }

    /// Current overlay snapshot.
    pub fn overlay(&self) -> &Envelope {
        &self.state
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    fn commit(&mut self, next: Envelope) -> Result<(), StoreError> {
        let stored = next
            .to_stored(CURRENT_VERSION)
            .map_err(StorageError::from)?;
        self.persistence.save(&stored)?;
        self.state = next;
        Ok(())
    }

    fn device_taken(&self, category: Category, id: &str) -> bool {
        self.reserved.has_device(category, id) || self.state.user_devices.find(category, id).is_some()
    }

    fn panel_taken(&self, id: &str) -> bool {
        self.reserved.has_panel(id) || self.state.user_control_panels.contains_key(id)
    }

    fn check_device(category: Category, device: &Device) -> Result<(), StoreError> {
        if device.category() != category {
            return Err(StoreError::CategoryMismatch {
                id: device.id.clone(),
                expected: category,
                actual: device.category(),
            });
        }
        device
            .validate()
            .into_result()
            .map_err(|report| StoreError::InvalidDevice {
                id: device.id.clone(),
                report,
            })
    }

    fn check_panel(panel: &ControlPanel) -> Result<(), StoreError> {
        panel
            .validate()
            .into_result()
            .map_err(|report| StoreError::InvalidPanel {
                id: panel.id.clone(),
                report,
            })
    }

    fn check_link(link: &Link) -> Result<(), StoreError> {
        link.validate()
            .into_result()
            .map_err(|report| StoreError::InvalidLink {
                id: link.id.clone(),
                report,
            })
    }

    pub fn add_device(&mut self, category: Category, mut device: Device) -> Result<(), StoreError> {
        Self::check_device(category, &device)?;
        if self.device_taken(category, &device.id) {
            return Err(StoreError::DuplicateId(device.id));
        }

        device.is_user_added = true;
        let mut next = self.state.clone();
        next.user_devices.get_mut(category).push(device);
        self.commit(next)
    }

    pub fn update_device(
        &mut self,
        category: Category,
        id: &str,
        patch: DevicePatch,
    ) -> Result<(), StoreError> {
        let mut next = self.state.clone();
        let Some(device) = next.user_devices.get_mut(category).iter_mut().find(|d| d.id == id) else {
            debug!("update_device: no {} device '{}'", category, id);
            return Ok(());
        };

        device.apply(patch);
        Self::check_device(category, device)?;
        self.commit(next)
    }

    pub fn remove_device(&mut self, category: Category, id: &str) -> Result<(), StoreError> {
        if self.state.user_devices.find(category, id).is_none() {
            debug!("remove_device: no {} device '{}'", category, id);
            return Ok(());
        }

        let mut next = self.state.clone();
        next.user_devices.get_mut(category).retain(|d| d.id != id);
        self.commit(next)
    }

    /// Append a copy of an overlay device. Returns the new identifier, or
    /// `None` when the source does not exist.
    pub fn duplicate_device(
        &mut self,
        category: Category,
        id: &str,
    ) -> Result<Option<String>, StoreError> {
        let Some(source) = self.state.user_devices.find(category, id) else {
            debug!("duplicate_device: no {} device '{}'", category, id);
            return Ok(None);
        };

        let mut stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let mut new_id = format!("{}_copy_{}", source.id, stamp);
        while self.device_taken(category, &new_id) {
            stamp += 1;
            new_id = format!("{}_copy_{}", source.id, stamp);
        }

        let copy = Device {
            id: new_id.clone(),
            name: format!("{} (Copy)", source.name),
            is_user_added: true,
            ..source.clone()
        };

        let mut next = self.state.clone();
        next.user_devices.get_mut(category).push(copy);
        self.commit(next)?;
        Ok(Some(new_id))
    }

    /// Add a user-created panel. The caller generates its identifier.
    pub fn add_panel(&mut self, mut panel: ControlPanel) -> Result<(), StoreError> {
        let id = panel.id.clone();
        panel.normalize(&id);
        Self::check_panel(&panel)?;
        if self.panel_taken(&panel.id) {
            return Err(StoreError::DuplicateId(panel.id));
        }

        panel.is_user_added = true;
        let mut next = self.state.clone();
        next.user_control_panels.insert(panel.id.clone(), panel);
        self.commit(next)
    }

    /// Store `panel` as the overlay entry for `id`, replacing any previous
    /// entry as a whole. Editing a catalog panel creates its override.
    pub fn update_panel(&mut self, id: &str, mut panel: ControlPanel) -> Result<(), StoreError> {
        panel.id = id.to_string();
        panel.normalize(id);
        Self::check_panel(&panel)?;

        let mut next = self.state.clone();
        next.user_control_panels.insert(id.to_string(), panel);
        self.commit(next)
    }

    pub fn remove_panel(&mut self, id: &str) -> Result<(), StoreError> {
        if !self.state.user_control_panels.contains_key(id) {
            debug!("remove_panel: no panel '{}'", id);
            return Ok(());
        }

        let mut next = self.state.clone();
        next.user_control_panels.remove(id);
        self.commit(next)
    }

    /// Copy an overlay panel under a fresh identifier. Returns the new
    /// identifier, or `None` when the source does not exist.
    pub fn duplicate_panel(&mut self, id: &str) -> Result<Option<String>, StoreError> {
        let Some(source) = self.state.user_control_panels.get(id) else {
            debug!("duplicate_panel: no panel '{}'", id);
            return Ok(None);
        };

        let mut new_id = uuid::Uuid::new_v4().to_string();
        while self.panel_taken(&new_id) {
            new_id = uuid::Uuid::new_v4().to_string();
        }

        let copy = source.duplicate(new_id.clone());
        let mut next = self.state.clone();
        next.user_control_panels.insert(new_id.clone(), copy);
        self.commit(next)?;
        Ok(Some(new_id))
    }

    pub fn add_link(&mut self, mut link: Link) -> Result<(), StoreError> {
        link.url = normalize_url(&link.url);
        Self::check_link(&link)?;
        if self.state.user_links.iter().any(|l| l.id == link.id) {
            return Err(StoreError::DuplicateId(link.id));
        }

        let mut next = self.state.clone();
        next.user_links.push(link);
        self.commit(next)
    }

    pub fn update_link(&mut self, id: &str, patch: LinkPatch) -> Result<(), StoreError> {
        let mut next = self.state.clone();
        let Some(link) = next.user_links.iter_mut().find(|l| l.id == id) else {
            debug!("update_link: no link '{}'", id);
            return Ok(());
        };

        link.apply(patch);
        Self::check_link(link)?;
        self.commit(next)
    }

    pub fn remove_link(&mut self, id: &str) -> Result<(), StoreError> {
        if !self.state.user_links.iter().any(|l| l.id == id) {
            debug!("remove_link: no link '{}'", id);
            return Ok(());
        }

        let mut next = self.state.clone();
        next.user_links.retain(|l| l.id != id);
        self.commit(next)
    }

    /// Replace the whole link list.
    pub fn replace_links(&mut self, links: Vec<Link>) -> Result<(), StoreError> {
        let links = normalize_links(links)?;
        let mut next = self.state.clone();
        next.user_links = links;
        self.commit(next)
    }

    pub fn set_order(&mut self, page_key: &str, order: PageOrder) -> Result<(), StoreError> {
        let mut next = self.state.clone();
        next.user_panel_order.insert(page_key.to_string(), order);
        self.commit(next)
    }

    /// Drop the page's override so it falls back to catalog order.
    pub fn reset_order(&mut self, page_key: &str) -> Result<(), StoreError> {
        if !self.state.user_panel_order.contains_key(page_key) {
            debug!("reset_order: page '{}' has no override", page_key);
            return Ok(());
        }

        let mut next = self.state.clone();
        next.user_panel_order.remove(page_key);
        self.commit(next)?;
        info!("Reset panel order of page '{}'", page_key);
        Ok(())
    }

    pub fn export(&self, scope: ExportScope) -> OverlayDocument {
        self.state.export(scope)
    }

    /// Reconcile an already validated document with the overlay.
    ///
    /// In `replace` mode every part present in the document overwrites the
    /// overlay's part; absent parts are kept. In `merge` mode device lists are
    /// concatenated, imported panels win by identifier, links are added
    /// unless their identifier exists, and imported page orders win per page.
    pub fn import(
        &mut self,
        document: OverlayDocument,
        mode: ImportMode,
    ) -> Result<ImportSummary, StoreError> {
        let mut summary = ImportSummary::default();
        let mut next = self.state.clone();

        if let Some(devices) = document.user_devices {
            for category in Category::iter() {
                for device in devices.get(category) {
                    Self::check_device(category, device)?;
                }
            }
            summary.devices = devices.len();
            match mode {
                ImportMode::Replace => next.user_devices = devices,
                ImportMode::Merge => {
                    next.user_devices.climate.extend(devices.climate);
                    next.user_devices.sensors.extend(devices.sensors);
                    next.user_devices.switches.extend(devices.switches);
                    next.user_devices.shutters.extend(devices.shutters);
                }
            }
        }

        if let Some(panels) = document.user_control_panels {
            summary.panels = panels.len();
            let panels = panels
                .into_iter()
                .map(|(id, mut panel)| {
                    panel.id = id.clone();
                    panel.normalize(&id);
                    Self::check_panel(&panel)?;
                    Ok((id, panel))
                })
                .collect::<Result<Vec<_>, StoreError>>()?;
            match mode {
                ImportMode::Replace => next.user_control_panels = panels.into_iter().collect(),
                ImportMode::Merge => next.user_control_panels.extend(panels),
            }
        }

        if let Some(links) = document.user_links {
            let links = normalize_links(links)?;
            summary.links = links.len();
            match mode {
                ImportMode::Replace => next.user_links = links,
                ImportMode::Merge => {
                    for link in links {
                        if !next.user_links.iter().any(|l| l.id == link.id) {
                            next.user_links.push(link);
                        }
                    }
                }
            }
        }

        if let Some(order) = document.user_panel_order {
            summary.pages = order.len();
            match mode {
                ImportMode::Replace => next.user_panel_order = order,
                ImportMode::Merge => next.user_panel_order.extend(order),
            }
        }

        self.commit(next)?;
        info!(
            "Imported overlay ({} mode): {} devices, {} panels, {} links, {} page orders",
            mode, summary.devices, summary.panels, summary.links, summary.pages
        );
        Ok(summary)
    }

    /// Parse, validate and import raw text. The overlay is unchanged on error.
    pub fn import_str(&mut self, text: &str, mode: ImportMode) -> Result<ImportSummary, StoreError> {
        let document = parse_import(text)?;
        self.import(document, mode)
    }
}

fn normalize_links(links: Vec<Link>) -> Result<Vec<Link>, StoreError> {
    links
        .into_iter()
        .map(|mut link| {
            link.url = normalize_url(&link.url);
            link.validate()
                .into_result()
                .map_err(|report| StoreError::InvalidLink {
                    id: link.id.clone(),
                    report,
                })?;
            Ok(link)
        })
        .collect()
}
