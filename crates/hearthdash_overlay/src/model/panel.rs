use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::validation::{require_non_empty, ValidationReport};

/// Value of a dropdown entry, as written to the backend point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub value: OptionValue,
    pub label: String,
}

/// The widget used to render a binding. Each kind carries exactly the fields
/// it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "widget", rename_all = "kebab-case")]
pub enum Widget {
    /// Read-only display of the current value
    Readout,
    Switch,
    TimePicker,
    Dropdown {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        options: Vec<DropdownOption>,
    },
    NumericInput {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f64>,
    },
    Button,
    Level {
        min: f64,
        max: f64,
        step: f64,
    },
    InvertedLevel {
        min: f64,
        max: f64,
        step: f64,
    },
}

/// Binding of one state-key in a panel to a backend point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateBinding {
    /// Filled from the map key when absent
    #[serde(default)]
    pub state_key: String,
    /// Point reference that is read
    pub state: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub show_state: bool,
    /// Point reference that is written, when it differs from `state`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Raw value -> display text
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub display_as: BTreeMap<String, String>,
    #[serde(flatten)]
    pub widget: Widget,
}

impl StateBinding {
    /// Point reference used when writing a value.
    pub fn write_point(&self) -> &str {
        self.action.as_deref().unwrap_or(&self.state)
    }

    /// Options to offer for a dropdown. When none were declared they are
    /// derived from the display mapping.
    pub fn dropdown_options(&self) -> Vec<DropdownOption> {
        match &self.widget {
            Widget::Dropdown { options } if !options.is_empty() => options.clone(),
            Widget::Dropdown { .. } => self
                .display_as
                .iter()
                .map(|(value, label)| DropdownOption {
                    value: OptionValue::Text(value.clone()),
                    label: label.clone(),
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        require_non_empty(&mut report, "state", &self.state);
        if let Some(action) = &self.action {
            require_non_empty(&mut report, "action", action);
        }

        match &self.widget {
            Widget::Dropdown { options } => {
                if options.is_empty() && self.display_as.is_empty() {
                    report.push("options", "dropdown requires options or a display mapping");
                }
            }
            Widget::NumericInput {
                min: Some(min),
                max: Some(max),
                ..
            } if min >= max => {
                report.push("max", "expected max greater than min");
            }
            Widget::Level { min, max, step } | Widget::InvertedLevel { min, max, step } => {
                if min >= max {
                    report.push("max", "expected max greater than min");
                }
                if *step <= 0.0 {
                    report.push("step", "expected positive step");
                }
            }
            _ => {}
        }

        report
    }
}

/// A named group of state bindings rendered as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPanel {
    /// Shared namespace between catalog and overlay panels
    #[serde(rename = "uuid", alias = "id", default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_user_added: bool,
    #[serde(default)]
    pub states: BTreeMap<String, StateBinding>,
}

impl ControlPanel {
    /// Fill in values that may be omitted in hand-written documents: the
    /// panel id from its map key, and each binding's key and label from its
    /// state-key.
    pub fn normalize(&mut self, id: &str) {
        if self.id.is_empty() {
            self.id = id.to_string();
        }
        for (key, binding) in &mut self.states {
            if binding.state_key.is_empty() {
                binding.state_key = key.clone();
            }
            if binding.label.is_empty() {
                binding.label = key.clone();
            }
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        require_non_empty(&mut report, "uuid", &self.id);
        require_non_empty(&mut report, "name", &self.name);

        for (key, binding) in &self.states {
            if !binding.state_key.is_empty() && &binding.state_key != key {
                report.push(
                    format!("states.{}.stateKey", key),
                    format!("expected '{}', found '{}'", key, binding.state_key),
                );
            }
            report.extend_nested(&format!("states.{}", key), binding.validate());
        }

        report
    }

    /// Copy of this panel under a new identifier, with a "(Copy)" name.
    pub fn duplicate(&self, new_id: String) -> Self {
        Self {
            id: new_id,
            name: format!("{} (Copy)", self.name),
            is_user_added: true,
            ..self.clone()
        }
    }
}
