#![allow(clippy::unwrap_used)]
// Integration tests for `CloudClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use heatlink_api::{CloudClient, CloudTransport, DeviceTypeCode, Error, StateWrite};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, CloudClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/", server.uri())).unwrap();
    let client = CloudClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

async fn setup_authed() -> (MockServer, CloudClient) {
    let (server, client) = setup().await;
    client.set_token(SecretString::from("test-token"));
    (server, client)
}

fn listing_envelope() -> serde_json::Value {
    json!([{
        "Name": "Home",
        "Structure": {
            "Devices": [{
                "DeviceID": 101,
                "BuildingID": 10,
                "DeviceName": "Living room",
                "Device": {
                    "DeviceType": 0,
                    "MacAddress": "aa:bb:cc:dd:ee:ff",
                    "SerialNumber": "2312000001",
                    "Units": [{"Model": "MSZ-AP25VG"}]
                }
            }],
            "Areas": [],
            "Floors": [{
                "Devices": [],
                "Areas": [{
                    "Devices": [{
                        "DeviceID": 102,
                        "BuildingID": 10,
                        "DeviceName": "Heat pump",
                        "Device": { "DeviceType": 1 }
                    }]
                }]
            }]
        }
    }])
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn login_success_stores_context_key() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/Login/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ErrorId": null,
            "LoginData": { "ContextKey": "ctx-abc123" }
        })))
        .mount(&server)
        .await;

    let password = SecretString::from("hunter2");
    client.login("user@example.com", &password).await.unwrap();
    assert!(client.has_token());
}

#[tokio::test]
async fn login_error_id_maps_to_auth_failed() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/Login/ClientLogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ErrorId": 1,
            "ErrorMessage": "Bad credentials"
        })))
        .mount(&server)
        .await;

    let password = SecretString::from("wrong");
    let result = client.login("user@example.com", &password).await;

    match result {
        Err(Error::AuthFailed { ref message }) => {
            assert!(message.contains("Bad credentials"), "got: {message}");
        }
        other => panic!("expected AuthFailed, got: {other:?}"),
    }
}

#[tokio::test]
async fn request_without_token_fails_before_hitting_network() {
    let (_server, client) = setup().await;
    let result = client.list_devices().await;
    assert!(matches!(result, Err(Error::AuthFailed { .. })));
}

// ── Device listing ──────────────────────────────────────────────────

#[tokio::test]
async fn list_devices_flattens_buildings() {
    let (server, client) = setup_authed().await;

    Mock::given(method("GET"))
        .and(path("/User/ListDevices"))
        .and(header("X-MitsContextKey", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_envelope()))
        .mount(&server)
        .await;

    let devices = client.list_devices().await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].device_id, 101);
    assert_eq!(devices[0].device_type, DeviceTypeCode::AirToAir);
    assert_eq!(devices[0].serial.as_deref(), Some("2312000001"));
    assert_eq!(devices[1].device_id, 102);
    assert_eq!(devices[1].device_type, DeviceTypeCode::AirToWater);
}

// ── State fetch ─────────────────────────────────────────────────────

#[tokio::test]
async fn get_state_passes_query_params() {
    let (server, client) = setup_authed().await;

    Mock::given(method("GET"))
        .and(path("/Device/Get"))
        .and(query_param("id", "101"))
        .and(query_param("buildingID", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "DeviceID": 101,
            "Power": true,
            "RoomTemperature": 20.5,
            "SetTemperature": 21.0,
            "Offline": false
        })))
        .mount(&server)
        .await;

    let state = client.get_state(101, 10).await.unwrap();
    assert_eq!(state.power, Some(true));
    assert_eq!(state.set_temperature, Some(21.0));
    assert_eq!(state.offline, Some(false));
}

// ── State writes ────────────────────────────────────────────────────

#[tokio::test]
async fn set_state_posts_to_family_endpoint() {
    let (server, client) = setup_authed().await;

    Mock::given(method("POST"))
        .and(path("/Device/SetAta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"DeviceID": 101})))
        .expect(1)
        .mount(&server)
        .await;

    let write = StateWrite {
        family: DeviceTypeCode::AirToAir,
        field: "SetTemperature".into(),
        value: json!(21.0),
        effective_flags: 0x04,
    };
    client.set_state(101, 10, &write).await.unwrap();
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn http_401_maps_to_auth_failed() {
    let (server, client) = setup_authed().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.list_devices().await;
    assert!(matches!(result, Err(Error::AuthFailed { .. })));
}

#[tokio::test]
async fn http_429_maps_to_rate_limited_with_retry_after() {
    let (server, client) = setup_authed().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .mount(&server)
        .await;

    let result = client.list_devices().await;
    match result {
        Err(Error::RateLimited { retry_after }) => {
            assert_eq!(retry_after, Some(std::time::Duration::from_secs(120)));
        }
        other => panic!("expected RateLimited, got: {other:?}"),
    }
}

#[tokio::test]
async fn garbage_body_maps_to_malformed_response() {
    let (server, client) = setup_authed().await;

    Mock::given(method("GET"))
        .and(path("/Device/Get"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.get_state(101, 10).await;
    match result {
        Err(Error::MalformedResponse { ref body, .. }) => {
            assert!(body.contains("maintenance"));
        }
        other => panic!("expected MalformedResponse, got: {other:?}"),
    }
}

#[tokio::test]
async fn http_500_maps_to_api_error_and_is_transient() {
    let (server, client) = setup_authed().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("down"))
        .mount(&server)
        .await;

    let err = client.list_devices().await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 503, .. }));
    assert!(err.is_transient());
}
