// ── API-to-domain type conversions ──
//
// Bridges raw `homelink_api` wire types into `homelink_core::model` types
// and back for create payloads. Each impl normalizes field names and
// enforces the model's invariants (only thermostats carry a temperature).

use serde_json::Value;

use homelink_api::models::{
    AutomationCreate, AutomationResponse, DeviceCreate, DeviceResponse, MeResponse, RoomResponse,
};

use crate::command::{NewAutomation, NewDevice};
use crate::model::{Automation, AutomationKind, Device, DeviceKind, Room, UserProfile};

impl From<DeviceResponse> for Device {
    fn from(raw: DeviceResponse) -> Self {
        let kind = DeviceKind::from(raw.device_type);
        let temperature = if kind == DeviceKind::Thermostat {
            raw.temperature
        } else {
            None
        };
        Self {
            id: raw.id,
            name: raw.name,
            kind,
            room_id: raw.room_id,
            is_on: raw.is_on,
            temperature,
            is_external: raw.is_external,
            external_ref: raw.external_ref,
        }
    }
}

impl From<RoomResponse> for Room {
    fn from(raw: RoomResponse) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
        }
    }
}

impl From<AutomationResponse> for Automation {
    fn from(raw: AutomationResponse) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            kind: AutomationKind::from(raw.automation_type),
            condition: raw.condition,
            action: raw.action,
            enabled: raw.enabled,
        }
    }
}

impl From<&NewDevice> for DeviceCreate {
    fn from(new: &NewDevice) -> Self {
        Self {
            name: new.name.clone(),
            device_type: new.kind.to_string(),
            room_id: new.room_id.clone(),
            is_home_assistant: new.is_external,
            entity_id: new.external_ref.clone(),
            attributes: if new.attributes.is_null() {
                Value::Object(serde_json::Map::new())
            } else {
                new.attributes.clone()
            },
        }
    }
}

impl From<&NewAutomation> for AutomationCreate {
    fn from(new: &NewAutomation) -> Self {
        Self {
            name: new.name.clone(),
            automation_type: new.kind.to_string(),
            condition: new.condition.clone(),
            action: new.action.clone(),
            enabled: new.enabled,
        }
    }
}

/// Merge a `GET /auth/me` answer into `base`, keeping `base`'s identity
/// fields when the hub omits them.
pub(crate) fn merge_profile(base: UserProfile, me: MeResponse) -> UserProfile {
    UserProfile {
        id: me.id.unwrap_or(base.id),
        username: me.username.unwrap_or(base.username),
        email: me.email.or(base.email),
        first_name: me.first_name.or(base.first_name),
        last_name: me.last_name.or(base.last_name),
        role: me.role.or(base.role),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw_device(kind: &str, temperature: Option<f64>) -> DeviceResponse {
        DeviceResponse {
            id: "1".into(),
            name: "Thing".into(),
            device_type: kind.into(),
            room_id: Some("2".into()),
            is_on: true,
            temperature,
            is_external: false,
            external_ref: None,
        }
    }

    #[test]
    fn only_thermostats_keep_temperature() {
        let light = Device::from(raw_device("light", Some(70.0)));
        assert_eq!(light.temperature, None);

        let thermostat = Device::from(raw_device("thermostat", Some(70.0)));
        assert_eq!(thermostat.temperature, Some(70.0));
    }

    #[test]
    fn new_device_payload_uses_wire_names() {
        let new = NewDevice::new("Porch", DeviceKind::Light).in_room("3");
        let payload = serde_json::to_value(DeviceCreate::from(&new)).unwrap();
        assert_eq!(
            payload,
            serde_json::json!({
                "name": "Porch",
                "type": "light",
                "roomId": "3",
                "isHomeAssistant": false,
                "entityId": null,
                "attributes": {},
            })
        );
    }

    #[test]
    fn profile_merge_prefers_hub_values() {
        let base = UserProfile {
            id: "7".into(),
            username: "ana".into(),
            email: Some("old@example.com".into()),
            ..UserProfile::default()
        };
        let me = MeResponse {
            email: Some("new@example.com".into()),
            first_name: Some("Ana".into()),
            ..MeResponse::default()
        };
        let merged = merge_profile(base, me);
        assert_eq!(merged.id, "7");
        assert_eq!(merged.email.as_deref(), Some("new@example.com"));
        assert_eq!(merged.first_name.as_deref(), Some("Ana"));
    }
}
