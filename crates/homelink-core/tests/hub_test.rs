#![allow(clippy::unwrap_used)]
// Command routing, optimistic updates and polling against a mock hub.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use homelink_core::{
    Command, CommandResult, CoreError, EventKind, Hub, PollTier, RegistryEvent, SessionState,
};

use common::{
    config_for, device, hub_with, mount_automations, mount_devices, mount_rooms, quick_poll,
    signed_in, stored_session, thermostat, token,
};

/// A signed-in hub whose registry holds a lamp, a fan and a thermostat.
async fn seeded(server: &MockServer) -> Hub {
    let (hub, access) = signed_in(server).await;
    mount_devices(
        server,
        &access,
        json!([
            device("1", "Desk Lamp", "light", false),
            device("2", "Porch Light", "light", true),
            thermostat("3", "Hall Thermostat", 68.0),
        ]),
    )
    .await;
    mount_rooms(server, json!([{ "id": "r1", "name": "Office" }])).await;
    mount_automations(server, json!([])).await;

    let report = hub.refresh_all().await;
    assert!(report.devices && report.rooms && report.automations);
    hub
}

fn record_changes(hub: &Hub) -> (Arc<Mutex<Vec<bool>>>, homelink_core::Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let sub = hub
        .registry()
        .subscribe(EventKind::DeviceChanged, move |event| {
            if let RegistryEvent::DeviceChanged(device) = event {
                sink.lock().unwrap().push(device.is_on);
            }
        });
    (seen, sub)
}

// ── Device commands ─────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_commits_hub_state_and_records_activity() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/1/toggle"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(device("1", "Desk Lamp", "light", true)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (seen, _sub) = record_changes(&hub);
    let result = hub
        .execute(Command::ToggleDevice { id: "1".into() })
        .await
        .unwrap();

    let CommandResult::Device(toggled) = result else {
        panic!("expected a device result");
    };
    assert!(toggled.is_on);
    assert!(hub.registry().device("1").unwrap().is_on);
    assert!(!hub.registry().is_pending("1"));
    // Optimistic patch already matched the hub, so commit publishes nothing.
    assert_eq!(*seen.lock().unwrap(), vec![true]);

    let activity = hub.activity().entries();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].device_name, "Desk Lamp");
    assert_eq!(activity[0].action, "turned on");
}

#[tokio::test]
async fn test_failed_toggle_rolls_back() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/1/toggle"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "relay stuck" })))
        .expect(1)
        .mount(&server)
        .await;

    let (seen, _sub) = record_changes(&hub);
    let err = hub
        .execute(Command::ToggleDevice { id: "1".into() })
        .await
        .unwrap_err();

    assert!(err.is_network());
    assert_eq!(err.http_status(), Some(500));
    assert!(!hub.registry().device("1").unwrap().is_on);
    assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    assert!(hub.activity().entries().is_empty());
}

#[tokio::test]
async fn test_toggle_missing_on_hub_is_device_not_found() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/1/toggle"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Not found" })))
        .mount(&server)
        .await;

    let err = hub
        .execute(Command::ToggleDevice { id: "1".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DeviceNotFound { identifier } if identifier == "1"));
}

#[tokio::test]
async fn test_unknown_device_is_rejected_locally() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;

    let err = hub
        .execute(Command::ToggleDevice { id: "99".into() })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_set_temperature_records_activity() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/3/temperature"))
        .and(body_json(json!({ "temperature": 72.0 })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(thermostat("3", "Hall Thermostat", 72.0)),
        )
        .expect(1)
        .mount(&server)
        .await;

    hub.execute(Command::SetTemperature {
        id: "3".into(),
        value: 72.0,
    })
    .await
    .unwrap();

    assert_eq!(hub.registry().device("3").unwrap().temperature, Some(72.0));
    assert_eq!(hub.activity().entries()[0].action, "temperature set to 72°F");
}

#[tokio::test]
async fn test_temperature_on_light_is_validation_error() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/1/temperature"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = hub
        .execute(Command::SetTemperature {
            id: "1".into(),
            value: 70.0,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let err = hub
        .execute(Command::SetTemperature {
            id: "3".into(),
            value: f64::NAN,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn test_toggle_all_lights_merges_and_logs_each_light() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/toggle-all-lights"))
        .and(body_json(json!({ "desiredState": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            device("1", "Desk Lamp", "light", false),
            device("2", "Porch Light", "light", false),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let result = hub
        .execute(Command::ToggleAllLights { on: false })
        .await
        .unwrap();

    let CommandResult::Devices(lights) = result else {
        panic!("expected a device list");
    };
    assert_eq!(lights.len(), 2);
    assert!(!hub.registry().device("2").unwrap().is_on);
    let names: Vec<_> = hub
        .activity()
        .entries()
        .iter()
        .map(|e| e.device_name.clone())
        .collect();
    assert_eq!(names, vec!["Porch Light", "Desk Lamp"]);
}

#[tokio::test]
async fn test_toggle_by_name_matches_case_insensitively() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/devices/2/toggle"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(device("2", "Porch Light", "light", false)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let toggled = hub.toggle_device_by_name("porch").await.unwrap();
    assert_eq!(toggled.id, "2");
    assert!(!toggled.is_on);

    let err = hub.toggle_device_by_name("h").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

// ── Rooms and automations ───────────────────────────────────────────

#[tokio::test]
async fn test_add_room_refetches_rooms() {
    let server = MockServer::start().await;
    let (hub, _) = signed_in(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/rooms"))
        .and(body_json(json!({ "name": "Garage" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "r2" })))
        .expect(1)
        .mount(&server)
        .await;
    mount_rooms(&server, json!([{ "id": "r2", "name": "Garage" }])).await;

    hub.execute(Command::AddRoom {
        name: " Garage ".into(),
    })
    .await
    .unwrap();

    assert_eq!(hub.registry().room("r2").unwrap().name, "Garage");
    assert!(hub.activity().entries().is_empty());

    let err = hub
        .execute(Command::AddRoom { name: "  ".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
}

#[tokio::test]
async fn test_toggle_automation_logs_refetched_state() {
    let server = MockServer::start().await;
    let (hub, _) = signed_in(&server).await;

    Mock::given(method("POST"))
        .and(path("/api/automations/a1/toggle"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;
    mount_automations(
        &server,
        json!([{
            "id": "a1", "name": "Night mode", "type": "time",
            "condition": { "time": "22:00" }, "action": { "deviceId": "1" },
            "enabled": false,
        }]),
    )
    .await;

    let result = hub
        .execute(Command::ToggleAutomation { id: "a1".into() })
        .await
        .unwrap();

    let CommandResult::Automation(automation) = result else {
        panic!("expected an automation");
    };
    assert!(!automation.enabled);
    let entry = &hub.activity().entries()[0];
    assert_eq!(entry.device_name, "Automation");
    assert_eq!(entry.action, "Night mode disabled");
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_external_change_is_recorded() {
    let server = MockServer::start().await;
    let (hub, access) = signed_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([device("1", "Desk Lamp", "light", false)])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_devices(&server, &access, json!([device("1", "Desk Lamp", "light", true)])).await;

    hub.synchronizer().refresh_devices().await.unwrap();
    assert!(hub.activity().entries().is_empty());

    hub.synchronizer().refresh_devices().await.unwrap();
    let activity = hub.activity().entries();
    assert_eq!(activity.len(), 1);
    assert_eq!(activity[0].action, "turned on");
}

#[tokio::test]
async fn test_failed_poll_keeps_previous_data() {
    let server = MockServer::start().await;
    let (hub, _) = signed_in(&server).await;

    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([device("1", "Desk Lamp", "light", true)])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    mount_rooms(&server, json!([])).await;
    mount_automations(&server, json!([])).await;

    assert!(hub.refresh_all().await.devices);
    let report = hub.refresh_all().await;

    assert!(!report.devices);
    assert!(report.rooms && report.automations);
    assert_eq!(hub.registry().list().len(), 1);
    assert!(hub.session().has_session());
}

#[tokio::test]
async fn test_tick_outside_band_does_not_poll() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    quick_poll(&mut config);
    let access = token("tiers", 3600);
    let hub = hub_with(config, stored_session(&access));
    mount_devices(&server, &access, json!([])).await;
    mount_rooms(&server, json!([])).await;
    mount_automations(&server, json!([])).await;

    let sync = hub.synchronizer();
    assert_eq!(sync.current_tier(), PollTier::Burst);
    assert!(!sync.on_tick(PollTier::Idle).await);
    assert!(!sync.on_tick(PollTier::Active).await);
    assert!(sync.on_tick(PollTier::Burst).await);
    assert_eq!(sync.poll_count(), 1);

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(sync.current_tier(), PollTier::Idle);
    assert!(!sync.on_tick(PollTier::Burst).await);
    assert!(sync.on_tick(PollTier::Idle).await);

    sync.note_user_action();
    assert_eq!(sync.current_tier(), PollTier::Burst);
}

#[tokio::test]
async fn test_no_polling_without_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let hub = hub_with(config_for(&server), Arc::new(Default::default()));
    assert!(!hub.synchronizer().on_tick(PollTier::Burst).await);
}

#[tokio::test]
async fn test_started_hub_polls_then_stops() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    quick_poll(&mut config);
    let access = token("bg", 3600);
    let hub = hub_with(config, stored_session(&access));
    mount_devices(&server, &access, json!([device("1", "Desk Lamp", "light", true)])).await;
    mount_rooms(&server, json!([])).await;
    mount_automations(&server, json!([])).await;

    hub.start();
    assert!(hub.is_running());
    tokio::time::sleep(Duration::from_millis(100)).await;
    hub.stop().await;

    assert!(!hub.is_running());
    assert!(hub.synchronizer().poll_count() >= 1);
    assert_eq!(hub.registry().list().len(), 1);
}

#[tokio::test]
async fn test_logout_drops_synchronized_state() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;
    hub.activity().record("Desk Lamp", "turned on");

    hub.logout();

    assert_eq!(hub.session().state(), SessionState::Anonymous);
    assert!(hub.registry().list().is_empty());
    assert!(hub.registry().rooms().is_empty());
    assert!(hub.activity().entries().is_empty());
}

#[tokio::test]
async fn test_poll_returning_after_logout_is_discarded() {
    let server = MockServer::start().await;
    let (hub, _access) = signed_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([device("1", "Desk Lamp", "light", false)])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([device("1", "Desk Lamp", "light", true)]))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_rooms(&server, json!([])).await;
    mount_automations(&server, json!([])).await;
    assert!(hub.refresh_all().await.devices);

    let polling = hub.clone();
    let poll = tokio::spawn(async move { polling.refresh_all().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    hub.logout();
    let report = poll.await.unwrap();

    assert!(!report.devices);
    assert!(hub.registry().list().is_empty());
    assert_eq!(hub.registry().last_sync(), None);
    assert!(hub.activity().entries().is_empty());
}

#[tokio::test]
async fn test_toggle_finishing_after_logout_leaves_no_trace() {
    let server = MockServer::start().await;
    let hub = seeded(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/devices/1/toggle"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(device("1", "Desk Lamp", "light", true))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let toggling = hub.clone();
    let toggle = tokio::spawn(async move {
        toggling
            .execute(Command::ToggleDevice { id: "1".into() })
            .await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    hub.logout();
    toggle.await.unwrap().unwrap();

    assert!(hub.activity().entries().is_empty());
    assert!(hub.registry().list().is_empty());
}

#[tokio::test]
async fn test_dropping_a_started_hub_stops_its_timers() {
    let server = MockServer::start().await;
    let mut config = config_for(&server);
    quick_poll(&mut config);
    let access = token("drop", 3600);
    let hub = hub_with(config, stored_session(&access));
    mount_devices(&server, &access, json!([])).await;
    mount_rooms(&server, json!([])).await;
    mount_automations(&server, json!([])).await;

    let sync = hub.synchronizer().clone();
    hub.start();
    tokio::time::sleep(Duration::from_millis(80)).await;
    drop(hub);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let settled = sync.poll_count();
    assert!(settled >= 1);
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(sync.poll_count(), settled);
}
