//! The Web API backed device against a mock server.

use serde_json::json;
use spotify_playback_test::player::remote::{DeviceSelector, RemoteDevice, RemoteSdk};
use spotify_playback_test::player::sdk::{EventKind, PlaybackDevice, PlaybackSdk, PlayerEvent, PlayerOptions};
use spotify_playback_test::spotify::data::PlaybackApi;
use spotify_playback_test::spotify::AuthContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::time::{sleep, timeout};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// The same track, a little further along on every read.
struct AdvancingTrack {
    progress_ms: AtomicU64,
}

impl Respond for AdvancingTrack {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let progress_ms = self.progress_ms.fetch_add(20, Ordering::SeqCst);
        ResponseTemplate::new(200).set_body_json(json!({
            "is_playing": true,
            "progress_ms": progress_ms,
            "shuffle_state": false,
            "repeat_state": "off",
            "item": { "uri": "spotify:track:XYZ", "name": "Song", "duration_ms": 200000 }
        }))
    }
}

fn player(server: &MockServer, selector: DeviceSelector) -> RemoteDevice {
    let sdk = RemoteSdk::new(
        PlaybackApi::new(format!("{}/v1", server.uri())),
        selector,
        Duration::from_millis(20),
    );
    sdk.create_player(PlayerOptions {
        name: "test client".to_string(),
        get_oauth_token: AuthContext::new("ABC123").token_supplier(),
    })
}

fn record(device: &mut RemoteDevice) -> UnboundedReceiver<PlayerEvent> {
    let (tx, rx) = unbounded_channel();
    for kind in EventKind::ALL {
        let tx = tx.clone();
        device.add_listener(kind, Box::new(move |event| {
            let _ = tx.send(event.clone());
        }));
    }
    rx
}

async fn next_event(events: &mut UnboundedReceiver<PlayerEvent>) -> PlayerEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for a player event")
        .expect("event channel closed")
}

fn devices_body() -> serde_json::Value {
    json!({
        "devices": [
            { "id": "D0", "name": "Phone", "is_active": false, "type": "Smartphone", "volume_percent": 80 },
            { "id": "D1", "name": "Kitchen", "is_active": true, "type": "Speaker", "volume_percent": 50 }
        ]
    })
}

async fn mount_idle_player(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(204))
        .mount(server)
        .await;
}

#[tokio::test]
async fn listed_device_becomes_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .and(header("Authorization", "Bearer ABC123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    mount_idle_player(&server).await;

    let mut device = player(&server, DeviceSelector::Any);
    let mut events = record(&mut device);
    assert!(device.connect());
    assert!(!device.connect());

    assert_eq!(
        next_event(&mut events).await,
        PlayerEvent::Ready {
            device_id: "D1".to_string()
        }
    );
    device.disconnect();
    assert!(!device.is_connected());
}

#[tokio::test]
async fn named_device_is_selected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    mount_idle_player(&server).await;

    let mut device = player(&server, DeviceSelector::Named("phone".to_string()));
    let mut events = record(&mut device);
    device.connect();

    assert_eq!(
        next_event(&mut events).await,
        PlayerEvent::Ready {
            device_id: "D0".to_string()
        }
    );
}

#[tokio::test]
async fn playback_changes_are_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device": { "id": "D1", "name": "Kitchen", "is_active": true, "type": "Speaker", "volume_percent": 50 },
            "is_playing": true,
            "progress_ms": 1000,
            "shuffle_state": false,
            "repeat_state": "off",
            "item": { "uri": "spotify:track:XYZ", "name": "Song", "duration_ms": 200000 }
        })))
        .mount(&server)
        .await;

    let mut device = player(&server, DeviceSelector::Any);
    let mut events = record(&mut device);
    device.connect();

    assert_eq!(next_event(&mut events).await.kind(), EventKind::Ready);
    match next_event(&mut events).await {
        PlayerEvent::PlayerStateChanged(state) => {
            assert!(state.is_playing);
            assert_eq!(state.item.unwrap().uri, "spotify:track:XYZ");
        }
        other => panic!("expected a state change, got {:?}", other),
    }
}

#[tokio::test]
async fn progress_alone_is_not_a_state_change() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(AdvancingTrack {
            progress_ms: AtomicU64::new(0),
        })
        .mount(&server)
        .await;

    let mut device = player(&server, DeviceSelector::Any);
    let mut events = record(&mut device);
    device.connect();

    assert_eq!(next_event(&mut events).await.kind(), EventKind::Ready);
    assert_eq!(
        next_event(&mut events).await.kind(),
        EventKind::PlayerStateChanged
    );

    sleep(Duration::from_millis(300)).await;
    device.disconnect();

    let mut later = Vec::new();
    while let Ok(event) = events.try_recv() {
        later.push(event.kind());
    }
    assert!(
        !later.contains(&EventKind::PlayerStateChanged),
        "unexpected events: {:?}",
        later
    );
}

#[tokio::test]
async fn vanished_device_goes_not_ready() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devices": [] })))
        .mount(&server)
        .await;
    mount_idle_player(&server).await;

    let mut device = player(&server, DeviceSelector::Any);
    let mut events = record(&mut device);
    device.connect();

    assert_eq!(
        next_event(&mut events).await,
        PlayerEvent::Ready {
            device_id: "D1".to_string()
        }
    );
    assert_eq!(
        next_event(&mut events).await,
        PlayerEvent::NotReady {
            device_id: "D1".to_string()
        }
    );
}

#[tokio::test]
async fn rejected_token_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "status": 401, "message": "The access token expired" }
        })))
        .mount(&server)
        .await;

    let mut device = player(&server, DeviceSelector::Any);
    let mut events = record(&mut device);
    device.connect();

    assert_eq!(
        next_event(&mut events).await,
        PlayerEvent::AuthenticationError {
            message: "The access token expired".to_string()
        }
    );
}

#[tokio::test]
async fn free_account_is_an_account_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "status": 403, "message": "Player command failed: Premium required" }
        })))
        .mount(&server)
        .await;

    let mut device = player(&server, DeviceSelector::Any);
    let mut events = record(&mut device);
    device.connect();

    assert_eq!(next_event(&mut events).await.kind(), EventKind::AccountError);
}

#[tokio::test]
async fn failure_before_first_listing_is_an_initialization_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut device = player(&server, DeviceSelector::Any);
    let mut events = record(&mut device);
    device.connect();

    assert_eq!(
        next_event(&mut events).await.kind(),
        EventKind::InitializationError
    );
}

#[tokio::test]
async fn failed_state_read_is_a_playback_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(devices_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/me/player"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let mut device = player(&server, DeviceSelector::Any);
    let mut events = record(&mut device);
    device.connect();

    assert_eq!(next_event(&mut events).await.kind(), EventKind::Ready);
    assert_eq!(next_event(&mut events).await.kind(), EventKind::PlaybackError);
}
