#![allow(clippy::unwrap_used)]
// Request pipeline and login lifecycle, driven through a scripted transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use url::Url;

use common::{ScriptedTransport, config};
use skyfly_core::{ApiRequest, ClientConfig, CoreError, Payload, Skybell};

const BASE: &str = "https://cloud.myskybell.com/api/v3/";

fn client(transport: &Arc<ScriptedTransport>, config: ClientConfig) -> Skybell {
    Skybell::with_transport(config, Arc::clone(transport) as Arc<dyn skyfly_core::Transport>)
        .unwrap()
}

fn base() -> Url {
    Url::parse(BASE).unwrap()
}

fn users_me() -> ApiRequest {
    ApiRequest::get(base().join("users/me/").unwrap())
}

// ── Login ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_without_credentials_fails_before_any_request() {
    let transport = Arc::new(ScriptedTransport::new());
    let skybell = client(
        &transport,
        ClientConfig {
            login_sleep: false,
            disable_cache: true,
            ..ClientConfig::default()
        },
    );

    let result = skybell.login(None, None).await;

    assert!(
        matches!(result, Err(ref e) if e.is_authentication()),
        "expected authentication error, got: {result:?}"
    );
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_login_sends_identity_and_stores_token() {
    let transport = Arc::new(ScriptedTransport::new().login_ok("fresh-token"));
    let skybell = client(&transport, config(base()));

    skybell.login(None, None).await.unwrap();

    let cache = skybell.cache();
    assert_eq!(cache.access_token(), "fresh-token");

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let login = &requests[0];
    assert_eq!(login.url.path(), "/api/v3/login/");
    assert_eq!(login.timeout, Duration::from_secs(30));
    assert!(login.headers.get("authorization").is_none());
    assert_eq!(login.headers["x-skybell-app-id"], cache.app_id());
    assert_eq!(login.headers["x-skybell-client-id"], cache.client_id());
    assert_eq!(
        login.json,
        Some(json!({
            "username": common::USERNAME,
            "password": common::PASSWORD,
            "appId": cache.app_id(),
            "token": cache.session_token(),
        }))
    );
}

#[tokio::test]
async fn test_login_arguments_replace_stored_credentials() {
    let transport = Arc::new(ScriptedTransport::new().login_ok("t"));
    let skybell = client(
        &transport,
        ClientConfig {
            login_sleep: false,
            disable_cache: true,
            ..ClientConfig::default()
        },
    );

    skybell
        .login(Some("other@test.com"), Some("otherpass"))
        .await
        .unwrap();

    let body = transport.requests()[0].json.clone().unwrap();
    assert_eq!(body["username"], "other@test.com");
    assert_eq!(body["password"], "otherpass");
}

#[tokio::test]
async fn test_rejected_login_is_authentication_error() {
    let transport =
        Arc::new(ScriptedTransport::new().respond(401, json!({ "message": "bad password" })));
    let skybell = client(&transport, config(base()));

    let err = skybell.login(None, None).await.unwrap_err();

    assert!(err.is_authentication());
    assert!(!skybell.cache().has_access_token());
    assert_eq!(transport.requests().len(), 1);
}

// ── Pipeline ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_request_logs_in_and_sends_bearer() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .login_ok("abc")
            .respond(200, json!({ "id": "u1" })),
    );
    let skybell = client(&transport, config(base()));

    let payload = skybell.send_request(users_me()).await.unwrap();

    assert_eq!(payload, Payload::Json(json!({ "id": "u1" })));
    assert_eq!(transport.paths(), ["/api/v3/login/", "/api/v3/users/me/"]);
    let request = &transport.requests()[1];
    assert_eq!(request.headers["authorization"], "Bearer abc");
    assert_eq!(request.headers["content-type"], "application/json");
    assert_eq!(request.headers["accept"], "*/*");
}

#[tokio::test]
async fn test_connection_failure_relogs_in_and_retries_once() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .login_ok("first")
            .fail_connection()
            .login_ok("second")
            .respond(200, json!({ "id": "u1" })),
    );
    let skybell = client(&transport, config(base()));

    let payload = skybell.send_request(users_me()).await.unwrap();

    assert_eq!(payload, Payload::Json(json!({ "id": "u1" })));
    assert_eq!(
        transport.paths(),
        [
            "/api/v3/login/",
            "/api/v3/users/me/",
            "/api/v3/login/",
            "/api/v3/users/me/",
        ]
    );
    assert_eq!(transport.requests()[3].headers["authorization"], "Bearer second");
    assert_eq!(skybell.cache().access_token(), "second");
}

#[tokio::test]
async fn test_retry_happens_only_once() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .login_ok("first")
            .fail_connection()
            .login_ok("second")
            .fail_connection(),
    );
    let skybell = client(&transport, config(base()));

    let err = skybell.send_request(users_me()).await.unwrap_err();

    assert!(
        matches!(err, CoreError::RequestFailed { ref url, .. } if url.ends_with("/users/me/")),
        "expected RequestFailed, got: {err:?}"
    );
    assert_eq!(transport.requests().len(), 4);
}

#[tokio::test]
async fn test_connection_failure_without_retry_surfaces_immediately() {
    let transport = Arc::new(ScriptedTransport::new().login_ok("t").fail_connection());
    let skybell = client(&transport, config(base()));

    let err = skybell
        .send_request(users_me().without_retry())
        .await
        .unwrap_err();

    assert!(matches!(err, CoreError::RequestFailed { .. }), "got: {err:?}");
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_timeout_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new().login_ok("t").fail_timeout());
    let skybell = client(&transport, config(base()));

    let err = skybell.send_request(users_me()).await.unwrap_err();

    assert!(
        matches!(err, CoreError::RequestFailed { ref url, .. } if url.ends_with("users/me/")),
        "got: {err:?}"
    );
    assert_eq!(transport.paths(), ["/api/v3/login/", "/api/v3/users/me/"]);
}

#[tokio::test]
async fn test_interrupted_body_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new().login_ok("t").fail_body());
    let skybell = client(&transport, config(base()));

    let err = skybell.send_request(users_me()).await.unwrap_err();

    assert!(matches!(err, CoreError::RequestFailed { .. }), "got: {err:?}");
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_asset_host_failure_is_image_fetch_error() {
    let transport = Arc::new(ScriptedTransport::new().login_ok("t").fail_connection());
    let skybell = client(&transport, config(base()));
    let image = Url::parse("https://media.example.com/snapshot.jpg").unwrap();

    let err = skybell
        .send_request(ApiRequest::get(image).without_retry())
        .await
        .unwrap_err();

    assert!(
        matches!(err, CoreError::ImageFetchFailed { ref url, .. } if url.contains("snapshot.jpg")),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_asset_requests_are_binary_and_unauthenticated() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .login_ok("t")
            .respond_bytes(b"\xff\xd8\xff\xe0jpeg"),
    );
    let skybell = client(&transport, config(base()));

    let image = skybell
        .session()
        .fetch_image("https://media.example.com/avatar.jpg")
        .await
        .unwrap();

    assert_eq!(&image[..], b"\xff\xd8\xff\xe0jpeg");
    let request = &transport.requests()[1];
    assert!(request.headers.get("authorization").is_none());
    assert!(request.headers.get("x-skybell-app-id").is_none());
}

#[tokio::test]
async fn test_error_status_is_not_retried() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .login_ok("t")
            .respond(500, json!("internal error")),
    );
    let skybell = client(&transport, config(base()));

    let err = skybell.send_request(users_me()).await.unwrap_err();

    assert!(matches!(err, CoreError::Api { status: 500, .. }), "got: {err:?}");
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_unauthorized_response_is_authentication_error() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .login_ok("t")
            .respond(401, Value::String("expired".into())),
    );
    let skybell = client(&transport, config(base()));

    let err = skybell.send_request(users_me()).await.unwrap_err();

    assert!(err.is_authentication());
    assert_eq!(transport.requests().len(), 2);
}

// ── Logout ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_logout_without_session_is_a_no_op() {
    let transport = Arc::new(ScriptedTransport::new());
    let mut skybell = client(&transport, config(base()));

    skybell.logout().await.unwrap();
    skybell.logout().await.unwrap();

    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_logout_keeps_identity_and_supplied_transport() {
    let transport = Arc::new(ScriptedTransport::new().login_ok("t"));
    let mut skybell = client(&transport, config(base()));
    skybell.login(None, None).await.unwrap();
    let before = skybell.cache();

    skybell.logout().await.unwrap();

    let after = skybell.cache();
    assert!(!after.has_access_token());
    assert_eq!(after.app_id(), before.app_id());
    assert_eq!(after.client_id(), before.client_id());
    assert_eq!(after.session_token(), before.session_token());
    assert!(!transport.is_closed(), "caller-supplied transport must stay open");
    assert_eq!(transport.requests().len(), 1, "no remote logout call");
}
