#![allow(clippy::unwrap_used)]
// Integration tests for `HubClient` using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homelink_api::models::{DeviceResponse, LoginResponse, MeResponse, RoomResponse};
use homelink_api::{endpoints, Error, HubClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HubClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api", server.uri())).unwrap();
    let client = HubClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn secret(s: &str) -> SecretString {
    SecretString::from(s.to_owned())
}

// ── Auth ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "username": "ana", "password": "hunter22" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user_id": 7,
            "username": "ana",
            "access_token": "a.b.c",
            "refresh_token": "r.s.t",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp: LoginResponse = client
        .send(&endpoints::login("ana", &secret("hunter22")), None)
        .await
        .unwrap();

    assert_eq!(resp.user_id, "7");
    assert_eq!(resp.access_token, "a.b.c");
    assert_eq!(resp.refresh_token, "r.s.t");
}

#[tokio::test]
async fn test_login_unauthorized_carries_server_message() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid credentials" })),
        )
        .mount(&server)
        .await;

    let result: Result<LoginResponse, _> = client
        .send(&endpoints::login("ana", &secret("nope")), None)
        .await;

    match result {
        Err(Error::Authentication { message }) => assert_eq!(message, "Invalid credentials"),
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_refresh_presents_refresh_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(header("authorization", "Bearer refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "new" })))
        .expect(1)
        .mount(&server)
        .await;

    let req = endpoints::refresh(&secret("refresh-1"));
    let resp: homelink_api::models::RefreshResponse =
        client.send(&req, req.bearer()).await.unwrap();
    assert_eq!(resp.access_token, "new");
}

#[tokio::test]
async fn test_me_accepts_mongo_id() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/me"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "65f0c0ffee",
            "username": "ana",
            "email": "ana@example.com",
            "first_name": "Ana",
        })))
        .mount(&server)
        .await;

    let me: MeResponse = client
        .send(&endpoints::me(), Some(&secret("tok")))
        .await
        .unwrap();
    assert_eq!(me.id.as_deref(), Some("65f0c0ffee"));
    assert_eq!(me.first_name.as_deref(), Some("Ana"));
    assert_eq!(me.last_name, None);
}

// ── Devices & rooms ─────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Lamp", "type": "light", "roomId": 2, "isOn": true },
            { "id": "t9", "name": "Thermostat", "type": "thermostat", "isOn": false,
              "temperature": 71.5, "isHomeAssistant": true, "entityId": "climate.hall" },
        ])))
        .mount(&server)
        .await;

    let devices: Vec<DeviceResponse> = client
        .send(&endpoints::list_devices(), Some(&secret("tok")))
        .await
        .unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "1");
    assert_eq!(devices[0].room_id.as_deref(), Some("2"));
    assert!(devices[0].is_on);
    assert_eq!(devices[1].temperature, Some(71.5));
    assert!(devices[1].is_external);
    assert_eq!(devices[1].external_ref.as_deref(), Some("climate.hall"));
}

#[tokio::test]
async fn test_set_temperature_sends_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices/3/temperature"))
        .and(body_json(json!({ "temperature": 68.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 3, "name": "Thermostat", "type": "thermostat", "isOn": true, "temperature": 68.0,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let device: DeviceResponse = client
        .send(&endpoints::set_temperature("3", 68.0), Some(&secret("tok")))
        .await
        .unwrap();
    assert_eq!(device.temperature, Some(68.0));
}

#[tokio::test]
async fn test_empty_body_decodes_as_unit() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/rooms/4"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let (): () = client
        .send(&endpoints::delete_room("4"), Some(&secret("tok")))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rooms_list() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/rooms"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 1, "name": "Kitchen" },
        ])))
        .mount(&server)
        .await;

    let rooms: Vec<RoomResponse> = client
        .send(&endpoints::list_rooms(), Some(&secret("tok")))
        .await
        .unwrap();
    assert_eq!(rooms[0].name, "Kitchen");
}

// ── Errors ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_not_found_maps_to_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/devices/99/toggle"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Device not found" })),
        )
        .mount(&server)
        .await;

    let err = client
        .send::<DeviceResponse>(&endpoints::toggle_device("99"), Some(&secret("tok")))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.server_message(), Some("Device not found"));
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/automations"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let err = client
        .send::<serde_json::Value>(&endpoints::list_automations(), Some(&secret("tok")))
        .await
        .unwrap_err();
    assert!(err.is_transient());
    assert!(matches!(err, Error::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_bad_json_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client
        .send::<Vec<DeviceResponse>>(&endpoints::list_devices(), Some(&secret("tok")))
        .await
        .unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>oops</html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}
