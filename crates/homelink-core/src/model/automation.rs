// ── Automation domain types ──
//
// Automations are stored and toggled through the hub; evaluating them is
// the hub's business, so `condition` and `action` stay opaque JSON.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AutomationKind {
    /// Fires at a time of day.
    Time,
    /// Fires when another device changes state.
    DeviceLink,
    Other(String),
}

impl AutomationKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Time => "time",
            Self::DeviceLink => "device-link",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for AutomationKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "time" => Self::Time,
            "device-link" | "device_link" => Self::DeviceLink,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for AutomationKind {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<AutomationKind> for String {
    fn from(kind: AutomationKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for AutomationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: String,
    pub name: String,
    pub kind: AutomationKind,
    pub condition: Value,
    pub action: Value,
    pub enabled: bool,
}
