// ── Typed request structs for Command payloads ──

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{AutomationKind, DeviceKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDevice {
    pub name: String,
    pub kind: DeviceKind,
    pub room_id: Option<String>,
    #[serde(default)]
    pub is_external: bool,
    #[serde(default)]
    pub external_ref: Option<String>,
    /// Free-form initial attributes (e.g. a thermostat's starting setpoint).
    #[serde(default)]
    pub attributes: Value,
}

impl NewDevice {
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            room_id: None,
            is_external: false,
            external_ref: None,
            attributes: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn in_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAutomation {
    pub name: String,
    pub kind: AutomationKind,
    pub condition: Value,
    pub action: Value,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}
