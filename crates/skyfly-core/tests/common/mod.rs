// Shared fixtures for the skyfly-core integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use skyfly_core::{ClientConfig, Skybell, Transport, TransportRequest, TransportResponse};

pub const DEVICE_ID: &str = "5f8ef594362f31000833d8c5";
pub const ACCESS_TOKEN: &str = "token123";
pub const USERNAME: &str = "test@test.com";
pub const PASSWORD: &str = "securepass";

// ── Configuration ───────────────────────────────────────────────────

pub fn api_base(server: &MockServer) -> Url {
    Url::parse(&format!("{}/api/v3/", server.uri())).unwrap()
}

/// Credentials, no login pause, in-memory cache.
pub fn config(api_base: Url) -> ClientConfig {
    ClientConfig {
        api_base,
        login_sleep: false,
        disable_cache: true,
        ..ClientConfig::with_credentials(USERNAME, PASSWORD)
    }
}

pub fn api_path(suffix: &str) -> String {
    format!("/api/v3/{suffix}")
}

pub fn device_path(suffix: &str) -> String {
    api_path(&format!("devices/{DEVICE_ID}/{suffix}"))
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn device_record(id: &str, acl: &str) -> Value {
    json!({
        "id": id,
        "name": "Front Door",
        "type": "skybell hd",
        "acl": acl,
        "status": "up",
        "user": "1234567890abcdef12345678",
        "location": { "lat": "-1.0", "lng": "1.0" },
        "uuid": "0123456789",
        "resourceId": "012345678901234567890123",
        "createdAt": "2020-10-20T14:35:00.745Z",
        "updatedAt": "2020-10-20T14:35:00.745Z"
    })
}

pub fn user_profile() -> Value {
    json!({
        "id": "1234567890abcdef12345678",
        "firstName": "First",
        "lastName": "Last",
        "createdAt": "2018-10-06T02:02:36.749Z"
    })
}

pub fn info() -> Value {
    json!({
        "mac": "ff:ff:ff:ff:ff:ff",
        "serialNo": "0123456789",
        "firmwareVersion": "7082",
        "essid": "wifi",
        "checkedInAt": "2020-03-31T04:13:37.000Z",
        "wifiLinkQuality": "98",
        "status": { "wifiLink": "poor" }
    })
}

pub fn settings() -> Value {
    json!({
        "do_not_disturb": "false",
        "do_not_ring": "false",
        "chime_level": "1",
        "motion_policy": "call",
        "motion_threshold": "32",
        "video_profile": "1",
        "green_r": "0",
        "green_g": "0",
        "green_b": "255",
        "led_intensity": "100"
    })
}

pub fn activity(id: &str, event: &str, created_at: &str, media: &str) -> Value {
    json!({
        "_id": format!("{id}_id"),
        "id": id,
        "event": event,
        "state": "ready",
        "videoState": "download:ready",
        "callId": format!("call_{id}"),
        "device": DEVICE_ID,
        "createdAt": created_at,
        "updatedAt": created_at,
        "media": media
    })
}

// ── Mock helpers ────────────────────────────────────────────────────

pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(api_path("login/")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "1234567890abcdef12345678",
            "access_token": ACCESS_TOKEN
        })))
        .mount(server)
        .await;
}

pub async fn mount_get(server: &MockServer, at: String, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_image(server: &MockServer, at: &str, bytes: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path(at.to_owned()))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes))
        .mount(server)
        .await;
}

/// Login, profile and a one-device listing.
pub async fn mount_account(server: &MockServer, acl: &str) {
    mount_login(server).await;
    mount_get(server, api_path("users/me/"), user_profile()).await;
    mount_get(server, api_path("devices/"), json!([device_record(DEVICE_ID, acl)])).await;
}

/// Initialized client over the mock API host.
pub async fn ready_client(server: &MockServer) -> Skybell {
    let mut skybell = Skybell::new(config(api_base(server))).unwrap();
    skybell.initialize().await.unwrap();
    skybell
}

// ── Scripted transport ──────────────────────────────────────────────

/// In-memory transport replaying a fixed script and recording requests.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<TransportResponse, skyfly_api::Error>>>,
    requests: Mutex<Vec<TransportRequest>>,
    closed: AtomicBool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, status: u16, body: Value) -> Self {
        self.script.lock().unwrap().push_back(Ok(TransportResponse {
            status,
            body: Bytes::from(body.to_string()),
        }));
        self
    }

    pub fn respond_bytes(self, body: &'static [u8]) -> Self {
        self.script.lock().unwrap().push_back(Ok(TransportResponse {
            status: 200,
            body: Bytes::from_static(body),
        }));
        self
    }

    pub fn fail_connection(self) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(skyfly_api::Error::Connection {
                url: "scripted".into(),
                message: "connection reset by peer".into(),
            }));
        self
    }

    pub fn fail_timeout(self) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(skyfly_api::Error::Timeout {
                url: "scripted".into(),
            }));
        self
    }

    pub fn fail_body(self) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(skyfly_api::Error::Body {
                url: "scripted".into(),
                message: "connection closed before message completed".into(),
            }));
        self
    }

    pub fn login_ok(self, token: &str) -> Self {
        self.respond(200, json!({ "access_token": token }))
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| request.url.path().to_owned())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, skyfly_api::Error> {
        self.requests.lock().unwrap().push(request);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(TransportResponse {
                    status: 599,
                    body: Bytes::from_static(b"unscripted request"),
                })
            })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
