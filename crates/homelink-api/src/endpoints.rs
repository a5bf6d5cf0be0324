// Endpoint catalogue for the hub REST API.
//
// Each function returns a ready-to-send `ApiRequest`. Paths are relative
// to the configured API base URL (e.g. `http://hub.local:5000/api/`).

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crate::models::{AutomationCreate, DeviceCreate, ProfileUpdate, Registration, RoomUpsert};
use crate::request::ApiRequest;

pub const LOGIN_PATH: &str = "auth/login";
pub const REGISTER_PATH: &str = "auth/register";
pub const REFRESH_PATH: &str = "auth/refresh";
pub const ME_PATH: &str = "auth/me";
pub const DEVICES_PATH: &str = "devices";
pub const ROOMS_PATH: &str = "rooms";
pub const AUTOMATIONS_PATH: &str = "automations";

// ── Auth ────────────────────────────────────────────────────────────

pub fn login(username: &str, password: &SecretString) -> ApiRequest {
    ApiRequest::post(LOGIN_PATH).with_body(json!({
        "username": username,
        "password": password.expose_secret(),
    }))
}

pub fn register(registration: &Registration) -> ApiRequest {
    ApiRequest::post(REGISTER_PATH).with_body(json!({
        "username": registration.username,
        "email": registration.email,
        "password": registration.password.expose_secret(),
        "first_name": registration.first_name,
        "last_name": registration.last_name,
    }))
}

/// The refresh call authenticates with the refresh token, not the
/// access token.
pub fn refresh(refresh_token: &SecretString) -> ApiRequest {
    ApiRequest::post(REFRESH_PATH)
        .with_body(json!({}))
        .with_bearer(refresh_token.clone())
}

pub fn me() -> ApiRequest {
    ApiRequest::get(ME_PATH)
}

pub fn update_me(update: &ProfileUpdate) -> ApiRequest {
    ApiRequest::patch(ME_PATH).with_body(json!(update))
}

pub fn change_password(current: &SecretString, new: &SecretString) -> ApiRequest {
    ApiRequest::patch(ME_PATH).with_body(json!({
        "current_password": current.expose_secret(),
        "new_password": new.expose_secret(),
    }))
}

// ── Devices ─────────────────────────────────────────────────────────

pub fn list_devices() -> ApiRequest {
    ApiRequest::get(DEVICES_PATH)
}

pub fn create_device(device: &DeviceCreate) -> ApiRequest {
    ApiRequest::post(DEVICES_PATH).with_body(json!(device))
}

pub fn delete_device(id: &str) -> ApiRequest {
    ApiRequest::delete(format!("{DEVICES_PATH}/{id}"))
}

pub fn toggle_device(id: &str) -> ApiRequest {
    ApiRequest::post(format!("{DEVICES_PATH}/{id}/toggle"))
}

pub fn set_temperature(id: &str, temperature: f64) -> ApiRequest {
    ApiRequest::post(format!("{DEVICES_PATH}/{id}/temperature"))
        .with_body(json!({ "temperature": temperature }))
}

pub fn toggle_all_lights(desired_state: bool) -> ApiRequest {
    ApiRequest::post(format!("{DEVICES_PATH}/toggle-all-lights"))
        .with_body(json!({ "desiredState": desired_state }))
}

// ── Rooms ───────────────────────────────────────────────────────────

pub fn list_rooms() -> ApiRequest {
    ApiRequest::get(ROOMS_PATH)
}

pub fn create_room(room: &RoomUpsert) -> ApiRequest {
    ApiRequest::post(ROOMS_PATH).with_body(json!(room))
}

pub fn update_room(id: &str, room: &RoomUpsert) -> ApiRequest {
    ApiRequest::put(format!("{ROOMS_PATH}/{id}")).with_body(json!(room))
}

pub fn delete_room(id: &str) -> ApiRequest {
    ApiRequest::delete(format!("{ROOMS_PATH}/{id}"))
}

// ── Automations ─────────────────────────────────────────────────────

pub fn list_automations() -> ApiRequest {
    ApiRequest::get(AUTOMATIONS_PATH)
}

pub fn create_automation(automation: &AutomationCreate) -> ApiRequest {
    ApiRequest::post(AUTOMATIONS_PATH).with_body(json!(automation))
}

pub fn delete_automation(id: &str) -> ApiRequest {
    ApiRequest::delete(format!("{AUTOMATIONS_PATH}/{id}"))
}

pub fn toggle_automation(id: &str) -> ApiRequest {
    ApiRequest::post(format!("{AUTOMATIONS_PATH}/{id}/toggle"))
}
