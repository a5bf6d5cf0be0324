// Wire models for the hub REST API.
//
// Field names follow the hub's JSON exactly (snake_case for the auth
// surface, camelCase for devices). Domain conversion lives in
// `homelink-core`; nothing here carries behavior.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Identifier helpers ──────────────────────────────────────────────

/// The hub hands out numeric ids for seeded devices and string ids for
/// stored documents. Both normalize to `String`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    RawId::deserialize(d).map(String::from)
}

fn opt_id_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(d)?.map(String::from))
}

// ── Auth ────────────────────────────────────────────────────────────

/// `POST /auth/login` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// `POST /auth/register` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    #[serde(deserialize_with = "id_string")]
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// `POST /auth/refresh` response.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// `GET /auth/me` response. Every field is optional because the hub
/// strips unset profile fields instead of sending nulls.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeResponse {
    #[serde(default, rename = "_id", alias = "id", deserialize_with = "opt_id_string")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Account registration payload.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: secrecy::SecretString,
    pub first_name: String,
    pub last_name: String,
}

/// `PATCH /auth/me` profile fields. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.email.is_none()
    }
}

// ── Devices ─────────────────────────────────────────────────────────

/// A device as the hub reports it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    #[serde(default, deserialize_with = "opt_id_string")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub is_on: bool,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default, rename = "isHomeAssistant", alias = "isExternal")]
    pub is_external: bool,
    #[serde(default, rename = "entityId", alias = "externalRef")]
    pub external_ref: Option<String>,
}

/// `POST /devices` payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub room_id: Option<String>,
    pub is_home_assistant: bool,
    pub entity_id: Option<String>,
    pub attributes: Value,
}

// ── Rooms ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomResponse {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
}

/// `POST /rooms` and `PUT /rooms/{id}` payload.
#[derive(Debug, Clone, Serialize)]
pub struct RoomUpsert {
    pub name: String,
}

// ── Automations ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AutomationResponse {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub automation_type: String,
    #[serde(default)]
    pub condition: Value,
    #[serde(default)]
    pub action: Value,
    #[serde(default)]
    pub enabled: bool,
}

/// `POST /automations` payload.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationCreate {
    pub name: String,
    #[serde(rename = "type")]
    pub automation_type: String,
    pub condition: Value,
    pub action: Value,
    pub enabled: bool,
}

// ── Errors ──────────────────────────────────────────────────────────

/// Error body shapes: the hub's own `{"error": ...}` and the JWT layer's
/// `{"msg": ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        self.error.or(self.msg).or(self.message)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn device_accepts_numeric_and_string_ids() {
        let numeric: DeviceResponse = serde_json::from_value(json!({
            "id": 4, "name": "Living Room Thermostat", "type": "thermostat",
            "temperature": 72, "isOn": true
        }))
        .unwrap();
        assert_eq!(numeric.id, "4");
        assert_eq!(numeric.temperature, Some(72.0));
        assert!(numeric.room_id.is_none());

        let text: DeviceResponse = serde_json::from_value(json!({
            "id": "65f0c1", "name": "Porch", "type": "light", "roomId": 2,
            "isHomeAssistant": true, "entityId": "light.porch"
        }))
        .unwrap();
        assert_eq!(text.id, "65f0c1");
        assert_eq!(text.room_id.as_deref(), Some("2"));
        assert!(!text.is_on);
        assert!(text.is_external);
        assert_eq!(text.external_ref.as_deref(), Some("light.porch"));
    }

    #[test]
    fn me_response_reads_mongo_id() {
        let me: MeResponse = serde_json::from_value(json!({
            "_id": "abc", "username": "ada", "email": "ada@example.com", "role": "admin"
        }))
        .unwrap();
        assert_eq!(me.id.as_deref(), Some("abc"));
        assert_eq!(me.role.as_deref(), Some("admin"));
        assert!(me.first_name.is_none());
    }

    #[test]
    fn profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            email: Some("new@example.com".into()),
            ..ProfileUpdate::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({ "email": "new@example.com" })
        );
        assert!(ProfileUpdate::default().is_empty());
    }

    #[test]
    fn error_body_prefers_hub_error_field() {
        let body: ErrorBody =
            serde_json::from_value(json!({ "error": "Invalid credentials", "msg": "x" })).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("Invalid credentials"));

        let jwt: ErrorBody = serde_json::from_value(json!({ "msg": "Token has expired" })).unwrap();
        assert_eq!(jwt.into_message().as_deref(), Some("Token has expired"));
    }
}
