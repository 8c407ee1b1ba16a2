//! Schema migration of persisted overlays.
//!
//! Version history:
//! - 1: `userDevices`, `userControlPanels`
//! - 2: adds `userLinks`, seeded with the catalog's default links
//! - 3: adds `userPanelOrder`
//!
//! Each step only inserts fields that are absent. Data already present is
//! never rewritten.

use serde_json::{Map, Value};
use tracing::debug;
use tracing::warn;

use super::envelope::{Envelope, StoredEnvelope};
use crate::model::Link;

pub const CURRENT_VERSION: u32 = 3;

type RawState = Map<String, Value>;

/// Values that steps fill in for missing fields.
#[derive(Debug, Clone, Copy)]
pub struct MigrationDefaults<'a> {
    pub links: &'a [Link],
}

struct Step {
    /// Version this step upgrades from
    from: u32,
    name: &'static str,
    apply: fn(RawState, &MigrationDefaults<'_>) -> Result<RawState, serde_json::Error>,
}

const STEPS: &[Step] = &[
    Step {
        from: 1,
        name: "add userLinks",
        apply: add_links,
    },
    Step {
        from: 2,
        name: "add userPanelOrder",
        apply: add_panel_order,
    },
];

fn add_links(
    mut state: RawState,
    defaults: &MigrationDefaults<'_>,
) -> Result<RawState, serde_json::Error> {
    if !state.contains_key("userLinks") {
        state.insert("userLinks".to_string(), serde_json::to_value(defaults.links)?);
    }
    Ok(state)
}

fn add_panel_order(
    mut state: RawState,
    _defaults: &MigrationDefaults<'_>,
) -> Result<RawState, serde_json::Error> {
    state
        .entry("userPanelOrder")
        .or_insert_with(|| Value::Object(Map::new()));
    Ok(state)
}

/// Bring a raw stored state up to [`CURRENT_VERSION`].
///
/// A version of 0 is treated as 1. Versions newer than the current one are
/// passed through untouched.
pub fn upgrade(
    stored: StoredEnvelope,
    defaults: &MigrationDefaults<'_>,
) -> Result<RawState, serde_json::Error> {
    let version = stored.version.max(1);
    if version > CURRENT_VERSION {
        warn!(
            "Stored overlay has version {} but only {} is known; loading as-is",
            version, CURRENT_VERSION
        );
        return Ok(stored.state);
    }

    let mut state = stored.state;
    for step in STEPS.iter().filter(|s| s.from >= version) {
        debug!("Migrating overlay from version {}: {}", step.from, step.name);
        state = (step.apply)(state, defaults)?;
    }
    Ok(state)
}

/// Upgrade a stored state and decode it into an [`Envelope`].
pub fn migrate(
    stored: StoredEnvelope,
    defaults: &MigrationDefaults<'_>,
) -> Result<Envelope, serde_json::Error> {
    let state = upgrade(stored, defaults)?;
    serde_json::from_value(Value::Object(state))
}
