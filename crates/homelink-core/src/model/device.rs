// ── Device and room domain types ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// Device category. Unknown hub types are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceKind {
    Light,
    Thermostat,
    Other(String),
}

impl DeviceKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Light => "light",
            Self::Thermostat => "thermostat",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for DeviceKind {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "light" => Self::Light,
            "thermostat" => Self::Thermostat,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for DeviceKind {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_owned())
    }
}

impl From<DeviceKind> for String {
    fn from(kind: DeviceKind) -> Self {
        kind.as_str().to_owned()
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A controllable device, owned by the registry.
///
/// `temperature` is only ever `Some` for thermostats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub room_id: Option<String>,
    pub is_on: bool,
    pub temperature: Option<f64>,
    /// Bridged from an external home-automation system.
    pub is_external: bool,
    pub external_ref: Option<String>,
}

impl Device {
    pub fn is_thermostat(&self) -> bool {
        self.kind == DeviceKind::Thermostat
    }

    pub fn is_light(&self) -> bool {
        self.kind == DeviceKind::Light
    }
}

/// A partial device mutation. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DevicePatch {
    pub is_on: Option<bool>,
    pub temperature: Option<f64>,
    pub name: Option<String>,
    pub room_id: Option<String>,
}

impl DevicePatch {
    pub fn power(is_on: bool) -> Self {
        Self {
            is_on: Some(is_on),
            ..Self::default()
        }
    }

    pub fn temperature(value: f64) -> Self {
        Self {
            temperature: Some(value),
            ..Self::default()
        }
    }

    pub(crate) fn apply(&self, device: &mut Device) {
        if let Some(is_on) = self.is_on {
            device.is_on = is_on;
        }
        if let Some(temperature) = self.temperature {
            device.temperature = Some(temperature);
        }
        if let Some(name) = &self.name {
            device.name.clone_from(name);
        }
        if let Some(room_id) = &self.room_id {
            device.room_id = Some(room_id.clone());
        }
    }

    /// Put back every field this patch touches, as it was in `previous`.
    pub(crate) fn revert(&self, device: &mut Device, previous: &Device) {
        if self.is_on.is_some() {
            device.is_on = previous.is_on;
        }
        if self.temperature.is_some() {
            device.temperature = previous.temperature;
        }
        if self.name.is_some() {
            device.name.clone_from(&previous.name);
        }
        if self.room_id.is_some() {
            device.room_id.clone_from(&previous.room_id);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parsing_keeps_unknown_types() {
        assert_eq!(DeviceKind::from("Light"), DeviceKind::Light);
        assert_eq!(DeviceKind::from("thermostat"), DeviceKind::Thermostat);
        assert_eq!(
            DeviceKind::from("lock"),
            DeviceKind::Other("lock".to_owned())
        );
        assert_eq!(DeviceKind::Other("lock".into()).to_string(), "lock");
    }

    #[test]
    fn revert_restores_only_patched_fields() {
        let before = Device {
            id: "1".into(),
            name: "Thermostat".into(),
            kind: DeviceKind::Thermostat,
            room_id: None,
            is_on: true,
            temperature: Some(70.0),
            is_external: false,
            external_ref: None,
        };
        let patch = DevicePatch::temperature(65.0);
        let mut device = before.clone();
        patch.apply(&mut device);
        device.is_on = false;
        assert_eq!(device.temperature, Some(65.0));

        patch.revert(&mut device, &before);
        assert_eq!(device.temperature, Some(70.0));
        assert!(!device.is_on);
    }
}
