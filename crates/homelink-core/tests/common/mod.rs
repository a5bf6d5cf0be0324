// Shared fixtures for homelink-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homelink_core::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use homelink_core::{CredentialStore, Hub, HubConfig, MemoryCredentialStore, UserProfile};

pub const REFRESH: &str = "refresh-token-1";

/// Unsigned three-segment token expiring `secs_from_now` seconds from now
/// (negative for the past). `tag` keeps tokens with equal expiry distinct.
pub fn token(tag: &str, secs_from_now: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + secs_from_now;
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(json!({ "exp": exp, "sub": tag }).to_string());
    format!("{header}.{claims}.{tag}")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn config_for(server: &MockServer) -> HubConfig {
    HubConfig::new(Url::parse(&format!("{}/api", server.uri())).unwrap())
}

/// A store holding a persisted session for `ana` with `access`.
pub fn stored_session(access: &str) -> Arc<MemoryCredentialStore> {
    let store = Arc::new(MemoryCredentialStore::new());
    let user = UserProfile {
        id: "7".into(),
        username: "ana".into(),
        ..UserProfile::default()
    };
    store
        .set(USER_KEY, &serde_json::to_string(&user).unwrap())
        .unwrap();
    store.set(ACCESS_TOKEN_KEY, access).unwrap();
    store.set(REFRESH_TOKEN_KEY, REFRESH).unwrap();
    store
}

pub fn hub_with(config: HubConfig, store: Arc<MemoryCredentialStore>) -> Hub {
    Hub::new(config, store).unwrap()
}

/// A hub signed in as `ana` with a fresh access token, plus that token.
pub async fn signed_in(server: &MockServer) -> (Hub, String) {
    let access = token("access-1", 3600);
    let hub = hub_with(config_for(server), stored_session(&access));
    (hub, access)
}

pub fn device(id: &str, name: &str, kind: &str, is_on: bool) -> Value {
    json!({ "id": id, "name": name, "type": kind, "roomId": "r1", "isOn": is_on })
}

pub fn thermostat(id: &str, name: &str, temperature: f64) -> Value {
    json!({
        "id": id, "name": name, "type": "thermostat",
        "roomId": "r1", "isOn": true, "temperature": temperature,
    })
}

/// Mount `GET /api/devices` answering `body` for requests carrying `access`.
pub async fn mount_devices(server: &MockServer, access: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .and(header("authorization", bearer(access).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_rooms(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_automations(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/automations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Fast tiers for exercising the band logic in real time.
pub fn quick_poll(config: &mut HubConfig) {
    config.poll.burst_interval = Duration::from_millis(20);
    config.poll.active_interval = Duration::from_millis(40);
    config.poll.idle_interval = Duration::from_millis(80);
    config.poll.burst_window = Duration::from_millis(150);
    config.poll.active_window = Duration::from_millis(300);
}
