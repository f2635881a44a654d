#![allow(clippy::unwrap_used)]
// Integration tests for `FindClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stfind_api::{Endpoints, Error, FailureClass, FindClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FindClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = FindClient::with_client(reqwest::Client::new(), Endpoints::single(&base_url));
    (server, client)
}

fn session() -> SecretString {
    SecretString::from("sess-1".to_string())
}

async fn mount_csrf(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/chkLogin.do"))
        .and(header("cookie", "JSESSIONID=sess-1"))
        .respond_with(ResponseTemplate::new(200).insert_header("_csrf", "csrf-1"))
        .mount(server)
        .await;
}

// ── Session check ───────────────────────────────────────────────────

#[tokio::test]
async fn test_check_login_returns_csrf() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    let token = client.check_login(&session()).await.unwrap();
    assert_eq!(token, "csrf-1");
}

#[tokio::test]
async fn test_check_login_without_header_is_auth_invalid() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/chkLogin.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client.check_login(&session()).await;
    assert!(
        matches!(result, Err(Error::AuthInvalid { .. })),
        "expected AuthInvalid, got: {result:?}"
    );
}

#[tokio::test]
async fn test_csrf_is_cached_per_session() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/chkLogin.do"))
        .respond_with(ResponseTemplate::new(200).insert_header("_csrf", "csrf-1"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/device/getDeviceList.do"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deviceList": [] })))
        .expect(2)
        .mount(&server)
        .await;

    client.list_devices(&session()).await.unwrap();
    client.list_devices(&session()).await.unwrap();
}

// ── Devices ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/device/getDeviceList.do"))
        .and(query_param("_csrf", "csrf-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "deviceList": [
                {
                    "dvceID": "tag-1",
                    "modelName": "Keys",
                    "usrId": "user-1",
                    "deviceTypeCode": "TAG",
                    "icons": { "coloredIcon": "https://img.example/tag.png" }
                },
                {
                    "dvceID": "phone-1",
                    "modelName": "Anna&amp;#39;s S22",
                    "deviceTypeCode": "PHONE"
                }
            ]
        })))
        .mount(&server)
        .await;

    let devices = client.list_devices(&session()).await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].id, "tag-1");
    assert_eq!(devices[0].user_id.as_deref(), Some("user-1"));
    assert_eq!(
        devices[0].icons.as_ref().and_then(|i| i.colored_icon.as_deref()),
        Some("https://img.example/tag.png")
    );
    assert_eq!(devices[1].display_name(), "Anna's S22");
}

#[tokio::test]
async fn test_device_list_404_means_session_gone() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/device/getDeviceList.do"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.list_devices(&session()).await.unwrap_err();
    assert_eq!(err.class(), FailureClass::AuthInvalid);
}

#[tokio::test]
async fn test_device_operations() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/device/setLastSelect.do"))
        .and(body_partial_json(json!({ "dvceId": "tag-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "operation": [
                {
                    "oprnType": "LOCATION",
                    "latitude": "52.52",
                    "longitude": "13.40",
                    "extra": { "gpsUtcDt": "20240115103000" }
                },
                { "oprnType": "CHECK_CONNECTION", "battery": "FULL" }
            ]
        })))
        .mount(&server)
        .await;

    let ops = client.device_operations(&session(), "tag-1").await.unwrap();

    assert_eq!(ops.operation.len(), 2);
    assert_eq!(ops.operation[0].latitude, Some(52.52));
    assert_eq!(ops.operation[1].battery, Some(json!("FULL")));
}

#[tokio::test]
async fn test_logout_body_is_auth_invalid() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/device/setLastSelect.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Logout"))
        .mount(&server)
        .await;

    let err = client.device_operations(&session(), "tag-1").await.unwrap_err();
    assert!(err.is_auth_invalid(), "expected auth rejection, got: {err:?}");
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/device/setLastSelect.do"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client.device_operations(&session(), "tag-1").await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(err.status(), Some(503));
}

#[tokio::test]
async fn test_undecodable_body_is_permanent() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/device/setLastSelect.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.device_operations(&session(), "tag-1").await.unwrap_err();
    assert_eq!(err.class(), FailureClass::Permanent);
}

#[tokio::test]
async fn test_unauthorized_drops_cached_csrf() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/chkLogin.do"))
        .respond_with(ResponseTemplate::new(200).insert_header("_csrf", "csrf-1"))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/device/setLastSelect.do"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    for _ in 0..2 {
        let err = client.device_operations(&session(), "tag-1").await.unwrap_err();
        assert!(err.is_auth_invalid());
    }
}

// ── Operations ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_ring_sends_ring_operation() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/dm/addOperation.do"))
        .and(query_param("_csrf", "csrf-1"))
        .and(body_partial_json(json!({
            "dvceId": "tag-1",
            "operation": "RING",
            "status": "start",
            "usrId": "user-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .expect(1)
        .mount(&server)
        .await;

    client.ring(&session(), "tag-1", Some("user-1")).await.unwrap();
}

#[tokio::test]
async fn test_ring_rejected_is_permanent() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/dm/addOperation.do"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad device"))
        .mount(&server)
        .await;

    let err = client.ring(&session(), "nope", None).await.unwrap_err();
    assert!(
        matches!(err, Error::Request { status: 400, .. }),
        "expected Request error, got: {err:?}"
    );
}

#[tokio::test]
async fn test_location_update_request() {
    let (server, client) = setup().await;
    mount_csrf(&server).await;

    Mock::given(method("POST"))
        .and(path("/dm/addOperation.do"))
        .and(body_partial_json(json!({
            "dvceId": "tag-1",
            "operation": "CHECK_CONNECTION_WITH_LOCATION"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client
        .request_location_update(&session(), "tag-1", Some("user-1"))
        .await
        .unwrap();
}
