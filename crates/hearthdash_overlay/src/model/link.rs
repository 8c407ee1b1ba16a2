use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::validation::{require_non_empty, ValidationReport};

/// Icons a link may use.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
    EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LinkIcon {
    #[default]
    Link,
    Dashboard,
    Energy,
    Climate,
    Cameras,
    Router,
    Server,
    Water,
    Ev,
    Vacuum,
}

/// A user-managed shortcut to an external URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub id: String,
    pub name: String,
    pub url: String,
    pub icon_key: LinkIcon,
}

impl Link {
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: &str, icon_key: LinkIcon) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: normalize_url(url),
            icon_key,
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        require_non_empty(&mut report, "id", &self.id);
        require_non_empty(&mut report, "name", &self.name);
        require_non_empty(&mut report, "url", &self.url);
        report
    }

    pub fn apply(&mut self, patch: LinkPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(url) = patch.url {
            self.url = normalize_url(&url);
        }
        if let Some(icon_key) = patch.icon_key {
            self.icon_key = icon_key;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon_key: Option<LinkIcon>,
}

/// Trim the URL and prefix `http://` unless it already has an http(s) scheme.
pub fn normalize_url(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("192.168.1.10"), "http://192.168.1.10");
        assert_eq!(normalize_url("  https://grafana.local/d/x "), "https://grafana.local/d/x");
        assert_eq!(normalize_url("HTTP://router"), "HTTP://router");
        assert_eq!(normalize_url("   "), "");
    }

    #[test]
    fn test_patch_normalizes_url() {
        let mut link = Link::new("links-router", "Router", "http://192.168.1.1", LinkIcon::Router);
        link.apply(LinkPatch {
            url: Some("192.168.1.254".to_string()),
            ..Default::default()
        });
        assert_eq!(link.url, "http://192.168.1.254");
        assert_eq!(link.name, "Router");
    }

    #[test]
    fn test_icon_key_is_closed() {
        let ok: Link = serde_json::from_str(
            r#"{"id": "a", "name": "EV", "url": "http://ev", "iconKey": "ev"}"#,
        )
        .unwrap();
        assert_eq!(ok.icon_key, LinkIcon::Ev);

        let bad = serde_json::from_str::<Link>(
            r#"{"id": "a", "name": "EV", "url": "http://ev", "iconKey": "rocket"}"#,
        );
        assert!(bad.is_err());
    }
}
