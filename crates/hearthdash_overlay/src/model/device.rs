use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::validation::{require_non_empty, ValidationReport};

/// Device categories. Each category is resolved as its own list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Climate,
    Sensor,
    Switch,
    Shutter,
}

impl Category {
    /// Key of this category's list inside `userDevices`.
    pub fn collection_key(self) -> &'static str {
        match self {
            Category::Climate => "climate",
            Category::Sensor => "sensors",
            Category::Switch => "switches",
            Category::Shutter => "shutters",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SensorType {
    Temperature,
    Humidity,
    Pressure,
    Light,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateStates {
    pub current_temp: String,
    pub target_temp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClimateConfig {
    pub min_temp: f64,
    pub max_temp: f64,
    pub step: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutterStates {
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutterConfig {
    #[serde(default)]
    pub invert_level: bool,
    pub step: f64,
}

/// Category-specific part of a device, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceKind {
    Climate {
        #[serde(default)]
        capabilities: Vec<String>,
        states: ClimateStates,
        config: ClimateConfig,
    },
    Sensor {
        #[serde(rename = "sensorType")]
        sensor_type: SensorType,
        unit: String,
    },
    Switch,
    Shutter {
        states: ShutterStates,
        config: ShutterConfig,
    },
}

impl DeviceKind {
    pub fn category(&self) -> Category {
        match self {
            DeviceKind::Climate { .. } => Category::Climate,
            DeviceKind::Sensor { .. } => Category::Sensor,
            DeviceKind::Switch => Category::Switch,
            DeviceKind::Shutter { .. } => Category::Shutter,
        }
    }
}

/// One controllable or observable point in the automation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Join key against the automation backend, unique within a category
    pub id: String,
    pub name: String,
    pub room: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_user_added: bool,
    #[serde(flatten)]
    pub kind: DeviceKind,
}

impl Device {
    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Check that every field the device needs before it is usable is filled in.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        require_non_empty(&mut report, "id", &self.id);
        require_non_empty(&mut report, "name", &self.name);
        require_non_empty(&mut report, "room", &self.room);

        match &self.kind {
            DeviceKind::Climate { states, config, .. } => {
                require_non_empty(&mut report, "states.currentTemp", &states.current_temp);
                require_non_empty(&mut report, "states.targetTemp", &states.target_temp);
                if config.min_temp >= config.max_temp {
                    report.push(
                        "config.maxTemp",
                        "maximum temperature must be greater than minimum temperature",
                    );
                }
                if config.step <= 0.0 {
                    report.push("config.step", "expected positive step");
                }
            }
            DeviceKind::Sensor { unit, .. } => {
                require_non_empty(&mut report, "unit", unit);
            }
            DeviceKind::Switch => {}
            DeviceKind::Shutter { states, config } => {
                require_non_empty(&mut report, "states.level", &states.level);
                if config.step <= 0.0 {
                    report.push("config.step", "expected positive step");
                }
            }
        }

        report
    }

    /// Apply a shallow patch. The identifier is never changed by a patch.
    pub fn apply(&mut self, patch: DevicePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(room) = patch.room {
            self.room = room;
        }
        if let Some(icon) = patch.icon {
            self.icon = icon;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
    }
}

/// Shallow update for an overlay device. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    /// `Some(None)` clears the icon
    #[serde(default)]
    pub icon: Option<Option<String>>,
    #[serde(flatten)]
    pub kind: Option<DeviceKind>,
}

/// Devices grouped by category, in the `userDevices` layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceLists {
    #[serde(default)]
    pub climate: Vec<Device>,
    #[serde(default)]
    pub sensors: Vec<Device>,
    #[serde(default)]
    pub switches: Vec<Device>,
    #[serde(default)]
    pub shutters: Vec<Device>,
}

impl DeviceLists {
    pub fn get(&self, category: Category) -> &[Device] {
        match category {
            Category::Climate => &self.climate,
            Category::Sensor => &self.sensors,
            Category::Switch => &self.switches,
            Category::Shutter => &self.shutters,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<Device> {
        match category {
            Category::Climate => &mut self.climate,
            Category::Sensor => &mut self.sensors,
            Category::Switch => &mut self.switches,
            Category::Shutter => &mut self.shutters,
        }
    }

    pub fn find(&self, category: Category, id: &str) -> Option<&Device> {
        self.get(category).iter().find(|d| d.id == id)
    }

    pub fn len(&self) -> usize {
        self.climate.len() + self.sensors.len() + self.switches.len() + self.shutters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All devices, category by category.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.climate
            .iter()
            .chain(&self.sensors)
            .chain(&self.switches)
            .chain(&self.shutters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn climate_json() -> &'static str {
        r#"{
            "id": "hm-rpc.0.NEQ1234567.1.SET_TEMPERATURE",
            "name": "Living Room Thermostat",
            "room": "living-room",
            "type": "climate",
            "capabilities": ["heating"],
            "states": {
                "currentTemp": "hm-rpc.0.NEQ1234567.1.ACTUAL_TEMPERATURE",
                "targetTemp": "hm-rpc.0.NEQ1234567.1.SET_TEMPERATURE"
            },
            "config": { "minTemp": 15, "maxTemp": 30, "step": 0.5, "unit": "°C" },
            "icon": "thermostat"
        }"#
    }

    #[test]
    fn test_parse_climate_device() {
        let device: Device = serde_json::from_str(climate_json()).unwrap();
        assert_eq!(device.category(), Category::Climate);
        assert_eq!(device.icon.as_deref(), Some("thermostat"));
        assert!(!device.is_user_added);
        match &device.kind {
            DeviceKind::Climate { config, .. } => assert_eq!(config.max_temp, 30.0),
            other => panic!("unexpected kind: {:?}", other),
        }
        assert!(device.validate().is_valid());
    }

    #[test]
    fn test_parse_switch_device() {
        let device: Device = serde_json::from_str(
            r#"{"id": "0_userdata.0.devices.outlet1", "name": "Desk Lamp", "room": "office", "type": "switch", "isUserAdded": true}"#,
        )
        .unwrap();
        assert_eq!(device.kind, DeviceKind::Switch);
        assert!(device.is_user_added);

        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["type"], "switch");
        assert_eq!(json["isUserAdded"], true);
    }

    #[test]
    fn test_validate_climate_range() {
        let mut device: Device = serde_json::from_str(climate_json()).unwrap();
        if let DeviceKind::Climate { config, states, .. } = &mut device.kind {
            config.min_temp = 30.0;
            states.current_temp = String::new();
        }

        let report = device.validate();
        let paths: Vec<_> = report.errors.iter().map(|e| e.field_path.as_str()).collect();
        assert_eq!(paths, vec!["states.currentTemp", "config.maxTemp"]);
    }

    #[test]
    fn test_validate_shutter_level() {
        let device = Device {
            id: "blinds".to_string(),
            name: "Blinds".to_string(),
            room: "office".to_string(),
            icon: None,
            is_user_added: true,
            kind: DeviceKind::Shutter {
                states: ShutterStates {
                    level: " ".to_string(),
                    working: None,
                },
                config: ShutterConfig {
                    invert_level: true,
                    step: 5.0,
                },
            },
        };

        let report = device.validate();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].field_path, "states.level");
    }

    #[test]
    fn test_patch_keeps_id() {
        let mut device: Device = serde_json::from_str(climate_json()).unwrap();
        device.apply(DevicePatch {
            name: Some("Thermostat".to_string()),
            icon: Some(None),
            ..Default::default()
        });

        assert_eq!(device.id, "hm-rpc.0.NEQ1234567.1.SET_TEMPERATURE");
        assert_eq!(device.name, "Thermostat");
        assert_eq!(device.icon, None);
        assert_eq!(device.room, "living-room");
    }

    #[test]
    fn test_category_names() {
        assert_eq!(Category::Sensor.to_string(), "sensor");
        assert_eq!(Category::Sensor.collection_key(), "sensors");
        assert_eq!("shutter".parse::<Category>().unwrap(), Category::Shutter);
    }
}
