#![allow(clippy::unwrap_used)]
// Integration tests for the QR login handshake using wiremock.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde_json::json;
use url::Url;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use stfind_api::{ApprovalStatus, Endpoints, Error, LoginClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, LoginClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = LoginClient::new(
        Endpoints::single(&base_url),
        TransportConfig::new(Duration::from_secs(5)),
    );
    (server, client)
}

async fn mount_challenge(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInGate"))
        .and(query_param("client_id", "ntly6zvfpn"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInWithQrCode"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<script>var qr = "https://signin.samsung.com/key/Qk7ZpA";</script>"#,
        ))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInXhr"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "_csrf": { "token": "xhr-csrf" } })),
        )
        .mount(server)
        .await;
}

// ── Challenge ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_extracts_approval_uri() {
    let (server, client) = setup().await;
    mount_challenge(&server).await;

    let pending = client.start().await.unwrap();

    assert_eq!(pending.approval_uri(), "https://signin.samsung.com/key/Qk7ZpA");
    assert_eq!(pending.key(), "Qk7ZpA");
}

#[tokio::test]
async fn test_start_without_link_is_unavailable() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInGate"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInWithQrCode"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = client.start().await;
    assert!(
        matches!(result, Err(Error::AuthServiceUnavailable { .. })),
        "expected AuthServiceUnavailable, got: {result:?}"
    );
}

#[tokio::test]
async fn test_gate_failure_is_unavailable() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInGate"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = client.start().await.unwrap_err();
    assert!(matches!(err, Error::AuthServiceUnavailable { .. }));
}

// ── Approval ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_poll_reports_pending_then_approved() {
    let (server, client) = setup().await;
    mount_challenge(&server).await;

    Mock::given(method("POST"))
        .and(path("/accounts/v1/FMM2/signInWithQrCodeProc"))
        .and(header("x-csrf-token", "xhr-csrf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rtnCd": "POLLING" })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/accounts/v1/FMM2/signInWithQrCodeProc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rtnCd": "SUCCESS",
            "nextURL": "/accounts/v1/FMM2/signInComplete"
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let mut pending = client.start().await.unwrap();
    assert_eq!(pending.poll_status().await.unwrap(), ApprovalStatus::Pending);
    assert_eq!(
        pending.poll_status().await.unwrap(),
        ApprovalStatus::Approved {
            next_url: "/accounts/v1/FMM2/signInComplete".into()
        }
    );
}

#[tokio::test]
async fn test_poll_non_success_status_keeps_pending() {
    let (server, client) = setup().await;
    mount_challenge(&server).await;

    Mock::given(method("POST"))
        .and(path("/accounts/v1/FMM2/signInWithQrCodeProc"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut pending = client.start().await.unwrap();
    assert_eq!(pending.poll_status().await.unwrap(), ApprovalStatus::Pending);
}

#[tokio::test]
async fn test_missing_poll_csrf_is_unavailable() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInGate"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInWithQrCode"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("https://signin.samsung.com/key/abc'"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInXhr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let mut pending = client.start().await.unwrap();
    let err = pending.poll_status().await.unwrap_err();
    assert!(matches!(err, Error::AuthServiceUnavailable { .. }));
}

// ── Completion ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_complete_reads_session_cookie() {
    let (server, client) = setup().await;
    mount_challenge(&server).await;

    let redirect = format!("{}/login.do?code=abc&state=x", server.uri());
    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInComplete"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<script>window.location.href = '{redirect}';</script>"
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/login.do"))
        .and(query_param("code", "abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "JSESSIONID=find-session; Path=/; HttpOnly"),
        )
        .mount(&server)
        .await;

    let pending = client.start().await.unwrap();
    let token = pending
        .complete("/accounts/v1/FMM2/signInComplete")
        .await
        .unwrap();

    assert_eq!(token.expose_secret(), "find-session");
}

#[tokio::test]
async fn test_complete_without_cookie_fails() {
    let (server, client) = setup().await;
    mount_challenge(&server).await;

    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInComplete"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<html>no redirect here</html>"),
        )
        .mount(&server)
        .await;

    let pending = client.start().await.unwrap();
    let err = pending
        .complete("/accounts/v1/FMM2/signInComplete")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthServiceUnavailable { .. }));
}

#[tokio::test]
async fn test_success_without_next_url_is_unavailable() {
    let (server, client) = setup().await;
    mount_challenge(&server).await;

    Mock::given(method("POST"))
        .and(path("/accounts/v1/FMM2/signInWithQrCodeProc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "rtnCd": "SUCCESS" })))
        .mount(&server)
        .await;

    let mut pending = client.start().await.unwrap();
    let err = pending.poll_status().await.unwrap_err();
    assert!(
        matches!(err, Error::AuthServiceUnavailable { .. }),
        "expected AuthServiceUnavailable, got: {err:?}"
    );
}

#[tokio::test]
async fn test_complete_with_malformed_redirect_is_unavailable() {
    let (server, client) = setup().await;
    mount_challenge(&server).await;

    Mock::given(method("GET"))
        .and(path("/accounts/v1/FMM2/signInComplete"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<script>window.location.href = 'http://[::1/login.do';</script>",
        ))
        .mount(&server)
        .await;

    let pending = client.start().await.unwrap();
    let err = pending
        .complete("/accounts/v1/FMM2/signInComplete")
        .await
        .unwrap_err();
    assert!(
        matches!(err, Error::AuthServiceUnavailable { .. }),
        "expected AuthServiceUnavailable, got: {err:?}"
    );
}
