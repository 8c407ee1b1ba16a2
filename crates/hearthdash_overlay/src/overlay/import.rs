use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use thiserror::Error;

use super::envelope::OverlayDocument;
use crate::model::Category;
use crate::validation::ValidationReport;

/// How an imported document is reconciled with the current overlay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ImportMode {
    /// Parts present in the document overwrite the overlay
    #[default]
    Replace,
    /// Parts present in the document are added to the overlay
    Merge,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Invalid JSON format: {0}")]
    InvalidFormat(#[source] serde_json::Error),

    #[error("Invalid configuration:\n{0}")]
    Invalid(ValidationReport),
}

impl ImportError {
    /// Human readable error lines, one per problem.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ImportError::InvalidFormat(_) => vec!["Invalid JSON format".to_string()],
            ImportError::Invalid(report) => report.errors.iter().map(|e| e.to_string()).collect(),
        }
    }
}

fn is_present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

fn check_string(report: &mut ValidationReport, entry: &Value, field: &str, path: &str) {
    let ok = entry
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !ok {
        report.push(format!("{}.{}", path, field), "expected non-empty string");
    }
}

/// Check the shape of an untrusted document before it is imported.
///
/// Only structure is checked here. Absent or `null` parts are allowed.
pub fn validate_import(document: &Value) -> ValidationReport {
    let mut report = ValidationReport::new();

    let Some(root) = document.as_object() else {
        report.push("document", "expected object");
        return report;
    };

    if let Some(devices) = is_present(root.get("userDevices")) {
        match devices.as_object() {
            Some(devices) => {
                for category in [
                    Category::Climate,
                    Category::Sensor,
                    Category::Switch,
                    Category::Shutter,
                ] {
                    let key = category.collection_key();
                    if let Some(list) = is_present(devices.get(key)) {
                        if !list.is_array() {
                            report.push(format!("userDevices.{}", key), "expected array");
                        }
                    }
                }
            }
            None => report.push("userDevices", "expected object"),
        }
    }

    if let Some(panels) = is_present(root.get("userControlPanels")) {
        if !panels.is_object() {
            report.push("userControlPanels", "expected object");
        }
    }

    if let Some(links) = is_present(root.get("userLinks")) {
        match links.as_array() {
            Some(links) => {
                for (idx, link) in links.iter().enumerate() {
                    let path = format!("userLinks[{}]", idx);
                    for field in ["id", "name", "url", "iconKey"] {
                        check_string(&mut report, link, field, &path);
                    }
                }
            }
            None => report.push("userLinks", "expected array"),
        }
    }

    if let Some(order) = is_present(root.get("userPanelOrder")) {
        if !order.is_object() {
            report.push("userPanelOrder", "expected object");
        }
    }

    report
}

fn decode_part<T: DeserializeOwned>(
    root: &mut serde_json::Map<String, Value>,
    key: &str,
    report: &mut ValidationReport,
) -> Option<T> {
    let value = root.remove(key).filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(part) => Some(part),
        Err(e) => {
            report.push(key, e.to_string());
            None
        }
    }
}

/// Decode a validated document into its typed form.
///
/// Errors are collected per part so the user sees every broken section.
pub fn decode_document(document: Value) -> Result<OverlayDocument, ImportError> {
    let report = validate_import(&document);
    if !report.is_valid() {
        return Err(ImportError::Invalid(report));
    }

    let mut root = match document {
        Value::Object(root) => root,
        _ => return Err(ImportError::Invalid(report)),
    };

    let mut report = ValidationReport::new();
    let decoded = OverlayDocument {
        user_devices: decode_part(&mut root, "userDevices", &mut report),
        user_control_panels: decode_part(&mut root, "userControlPanels", &mut report),
        user_links: decode_part(&mut root, "userLinks", &mut report),
        user_panel_order: decode_part(&mut root, "userPanelOrder", &mut report),
    };

    report.into_result().map_err(ImportError::Invalid)?;
    Ok(decoded)
}

/// Parse raw text as an import document.
pub fn parse_import(text: &str) -> Result<OverlayDocument, ImportError> {
    let document: Value = serde_json::from_str(text).map_err(ImportError::InvalidFormat)?;
    decode_document(document)
}
