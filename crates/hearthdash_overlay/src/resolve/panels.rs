use std::collections::BTreeMap;

use crate::model::ControlPanel;

/// Combine catalog panels with overlay panels keyed by identifier.
///
/// An overlay entry replaces the catalog entry at the same key as a whole
/// record; fields are never mixed.
pub fn resolve_panels(
    catalog: &BTreeMap<String, ControlPanel>,
    overlay: &BTreeMap<String, ControlPanel>,
) -> BTreeMap<String, ControlPanel> {
    let mut resolved = catalog.clone();
    for (id, panel) in overlay {
        resolved.insert(id.clone(), panel.clone());
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(id: &str, name: &str, function: Option<&str>) -> ControlPanel {
        ControlPanel {
            id: id.to_string(),
            name: name.to_string(),
            icon: None,
            label: None,
            function: function.map(str::to_string),
            is_user_added: false,
            states: BTreeMap::new(),
        }
    }

    #[test]
    fn test_overlay_wins_whole_record() {
        let catalog = BTreeMap::from([
            ("heating-1".to_string(), panel("heating-1", "Heating", Some("heating"))),
            ("water-1".to_string(), panel("water-1", "Hot water", None)),
        ]);
        let overlay = BTreeMap::from([(
            "heating-1".to_string(),
            panel("heating-1", "Heating (custom)", None),
        )]);

        let resolved = resolve_panels(&catalog, &overlay);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["heating-1"].name, "Heating (custom)");
        // no field-level merge: the catalog's function tag is gone
        assert_eq!(resolved["heating-1"].function, None);
        assert_eq!(resolved["water-1"], catalog["water-1"]);
    }

    #[test]
    fn test_overlay_only_panel_added() {
        let overlay = BTreeMap::from([("mine".to_string(), panel("mine", "Mine", None))]);
        let resolved = resolve_panels(&BTreeMap::new(), &overlay);
        assert_eq!(resolved.keys().collect::<Vec<_>>(), vec!["mine"]);
    }

    #[test]
    fn test_removing_override_reverts() {
        let catalog = BTreeMap::from([("heating-1".to_string(), panel("heating-1", "Heating", None))]);
        let mut overlay = BTreeMap::from([(
            "heating-1".to_string(),
            panel("heating-1", "Heating (custom)", None),
        )]);
        assert_eq!(resolve_panels(&catalog, &overlay)["heating-1"].name, "Heating (custom)");

        overlay.remove("heating-1");
        assert_eq!(resolve_panels(&catalog, &overlay)["heating-1"].name, "Heating");
    }
}
