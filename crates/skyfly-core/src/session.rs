// ── Session: authenticated request pipeline ──
//
// Owns the identity cache, the credentials and the transport handle.
// Devices hold an `Arc<Session>` as their only route to the network and
// to their persisted event ledger; the `Skybell` client owns the device
// registry on top of it.
//
// Locks are std mutexes and are never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use skyfly_api::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use skyfly_api::models::{Activity, LoginRequest, LoginResponse};
use skyfly_api::{
    CacheStore, Endpoints, IdentityCache, Method, Transport, TransportRequest, TransportResponse,
};
use tracing::{Span, debug, info, trace, warn};
use url::Url;

use crate::config::LOGIN_SLEEP;
use crate::error::CoreError;

const APP_ID_HEADER: &str = "x-skybell-app-id";
const CLIENT_ID_HEADER: &str = "x-skybell-client-id";

// ── Request / payload types ─────────────────────────────────────────

/// One call through the pipeline.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    /// Extra headers, sent in addition to the identity headers.
    pub headers: HeaderMap,
    pub json: Option<Value>,
    /// Answer a connection failure with one re-login and re-issue.
    pub retry: bool,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            json: None,
            retry: true,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url, json: Value) -> Self {
        Self::new(Method::POST, url).with_json(json)
    }

    pub fn patch(url: Url, json: Value) -> Self {
        Self::new(Method::PATCH, url).with_json(json)
    }

    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }
}

/// A successful response body: JSON from the API host, raw bytes from
/// anywhere else.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Binary(Bytes),
}

impl Payload {
    /// Decode a JSON payload into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, CoreError> {
        match self {
            Payload::Json(value) => Ok(serde_json::from_value(value)?),
            Payload::Binary(_) => Err(CoreError::Deserialization {
                message: "expected a JSON response, got a binary payload".into(),
            }),
        }
    }

    /// The raw body. JSON payloads are re-serialized.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Payload::Binary(bytes) => bytes,
            Payload::Json(value) => Bytes::from(value.to_string()),
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Credentials {
    username: Option<String>,
    password: Option<SecretString>,
}

/// Request and cache capability shared by the client and its devices.
pub struct Session {
    transport: Arc<dyn Transport>,
    /// Only an internally built transport is closed on logout.
    owns_transport: bool,
    endpoints: Endpoints,
    credentials: Mutex<Credentials>,
    cache: Mutex<IdentityCache>,
    store: CacheStore,
    login_sleep: Option<Duration>,
    timeout: Duration,
    span: Span,
}

/// Everything a `Session` is built from.
pub(crate) struct SessionParts {
    pub transport: Arc<dyn Transport>,
    pub owns_transport: bool,
    pub endpoints: Endpoints,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub store: CacheStore,
    pub login_sleep: bool,
    pub timeout: Duration,
    pub span: Span,
}

impl Session {
    pub(crate) fn new(parts: SessionParts) -> Self {
        Self {
            transport: parts.transport,
            owns_transport: parts.owns_transport,
            endpoints: parts.endpoints,
            credentials: Mutex::new(Credentials {
                username: parts.username,
                password: parts.password,
            }),
            cache: Mutex::new(IdentityCache::generate()),
            store: parts.store,
            login_sleep: parts.login_sleep.then_some(LOGIN_SLEEP),
            timeout: parts.timeout,
            span: parts.span,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Logging scope of the owning client.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn owns_transport(&self) -> bool {
        self.owns_transport
    }

    fn lock_cache(&self) -> MutexGuard<'_, IdentityCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_credentials(&self) -> MutexGuard<'_, Credentials> {
        self.credentials
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Identity cache ──────────────────────────────────────────────

    /// Snapshot of the identity cache.
    pub fn cache(&self) -> IdentityCache {
        self.lock_cache().clone()
    }

    /// Cached value for `key`, or `""` when absent.
    pub fn cache_value(&self, key: &str) -> String {
        self.lock_cache().get_str(key).to_owned()
    }

    pub fn has_access_token(&self) -> bool {
        self.lock_cache().has_access_token()
    }

    /// Deep-merge `patch` into the cache and persist the result.
    pub async fn update_cache(&self, patch: Map<String, Value>) -> Result<(), CoreError> {
        let snapshot = {
            let mut cache = self.lock_cache();
            cache.merge(patch);
            cache.clone()
        };
        self.store.save(&snapshot).await?;
        Ok(())
    }

    /// Merge the on-disk cache over the generated identity, then write
    /// the result back. Both steps are no-ops when caching is disabled.
    pub async fn load_cache(&self) -> Result<(), CoreError> {
        if let Some(persisted) = self.store.load().await? {
            debug!(path = ?self.store.path(), "merging persisted identity cache");
            self.lock_cache().merge(persisted);
        }
        let snapshot = self.cache();
        self.store.save(&snapshot).await?;
        Ok(())
    }

    /// The persisted event ledger of one device.
    pub fn device_events(&self, device_id: &str) -> BTreeMap<String, Activity> {
        self.lock_cache().device_events(device_id)
    }

    pub async fn store_device_events(
        &self,
        device_id: &str,
        events: &BTreeMap<String, Activity>,
    ) -> Result<(), CoreError> {
        self.update_cache(IdentityCache::events_patch(device_id, events))
            .await
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Log in, replacing the stored credentials with any given here.
    ///
    /// Fails with [`CoreError::Authentication`] before touching the
    /// network when either credential is still unknown.
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), CoreError> {
        let (username, password) = {
            let mut credentials = self.lock_credentials();
            if let Some(username) = username {
                credentials.username = Some(username.to_owned());
            }
            if let Some(password) = password {
                credentials.password = Some(SecretString::from(password.to_owned()));
            }
            match (&credentials.username, &credentials.password) {
                (Some(username), Some(password)) => (username.clone(), password.clone()),
                _ => {
                    return Err(CoreError::authentication(
                        "a username and password are required to log in",
                    ));
                }
            }
        };

        self.update_cache(IdentityCache::access_token_patch(""))
            .await?;

        let body = {
            let cache = self.lock_cache();
            serde_json::to_value(LoginRequest {
                username: &username,
                password: password.expose_secret(),
                app_id: cache.app_id(),
                token: cache.session_token(),
            })?
        };

        debug!(user = %username, "logging in");
        let request = ApiRequest::post(self.endpoints.login(), body).without_retry();
        let response: LoginResponse = self.dispatch(&request).await?.decode()?;

        self.update_cache(IdentityCache::access_token_patch(&response.access_token))
            .await?;

        if let Some(pause) = self.login_sleep {
            info!(secs = pause.as_secs(), "login successful, waiting before further calls");
            tokio::time::sleep(pause).await;
        } else {
            info!("login successful");
        }
        Ok(())
    }

    /// Drop the session token. Returns `true` when a session was active.
    ///
    /// No remote logout call is made. An internally built transport is
    /// closed; a caller-supplied one is left alone.
    pub async fn logout(&self) -> Result<bool, CoreError> {
        if !self.has_access_token() {
            debug!("logout without an active session");
            return Ok(false);
        }
        if self.owns_transport {
            self.transport.close().await;
        }
        self.update_cache(IdentityCache::access_token_patch(""))
            .await?;
        info!("logged out");
        Ok(true)
    }

    /// Close the transport if this session built it.
    pub async fn close(&self) {
        if self.owns_transport {
            self.transport.close().await;
        }
    }

    // ── Request pipeline ────────────────────────────────────────────

    /// Send a request, logging in first when no access token is held.
    ///
    /// A connection failure with `retry` set triggers exactly one fresh
    /// login and one re-issue of the same request. Timeouts and failed
    /// body reads are not retried.
    pub async fn send_request(&self, request: ApiRequest) -> Result<Payload, CoreError> {
        if request.url != self.endpoints.login() && !self.has_access_token() {
            self.login(None, None).await?;
        }

        match self.execute(&request).await {
            Ok(payload) => Ok(payload),
            Err(err) if err.is_connection() && request.retry => {
                warn!(url = %request.url, error = %err, "request failed, logging in again");
                self.login(None, None).await?;
                self.dispatch(&request).await
            }
            Err(err) => Err(self.failure(&request.url, err)),
        }
    }

    /// GET `url` and decode the JSON response.
    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CoreError> {
        self.send_request(ApiRequest::get(url)).await?.decode()
    }

    /// Download a media asset referenced by an API document.
    pub async fn fetch_image(&self, url: &str) -> Result<Bytes, CoreError> {
        let url = Url::parse(url).map_err(|e| CoreError::ImageFetchFailed {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(self.send_request(ApiRequest::get(url)).await?.into_bytes())
    }

    /// One attempt with no login side effects, failures mapped to domain errors.
    async fn dispatch(&self, request: &ApiRequest) -> Result<Payload, CoreError> {
        self.execute(request)
            .await
            .map_err(|err| self.failure(&request.url, err))
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Payload, skyfly_api::Error> {
        let is_api = self.endpoints.is_api_url(&request.url);
        let headers = self.headers_for(request, is_api)?;

        trace!(method = %request.method, url = %request.url, "dispatching request");
        let response = self
            .transport
            .request(TransportRequest {
                method: request.method.clone(),
                url: request.url.clone(),
                headers,
                json: request.json.clone(),
                timeout: self.timeout,
            })
            .await?;

        classify(is_api, response)
    }

    fn headers_for(
        &self,
        request: &ApiRequest,
        is_api: bool,
    ) -> Result<HeaderMap, skyfly_api::Error> {
        let mut headers = request.headers.clone();
        if !is_api {
            return Ok(headers);
        }

        let cache = self.lock_cache();
        if cache.has_access_token() {
            let mut bearer =
                header_value("authorization", &format!("Bearer {}", cache.access_token()))?;
            bearer.set_sensitive(true);
            headers.insert(AUTHORIZATION, bearer);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(APP_ID_HEADER, header_value(APP_ID_HEADER, cache.app_id())?);
        headers.insert(
            CLIENT_ID_HEADER,
            header_value(CLIENT_ID_HEADER, cache.client_id())?,
        );
        Ok(headers)
    }

    /// Attach URL context to a failed attempt. Transport failures become
    /// `RequestFailed` for the API host and `ImageFetchFailed` elsewhere.
    fn failure(&self, url: &Url, err: skyfly_api::Error) -> CoreError {
        if !err.is_transport_failure() {
            return err.into();
        }
        let reason = err.to_string();
        if self.endpoints.is_api_url(url) {
            CoreError::RequestFailed {
                url: url.to_string(),
                reason,
            }
        } else {
            CoreError::ImageFetchFailed {
                url: url.to_string(),
                reason,
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api_base", &self.endpoints.base().as_str())
            .field("owns_transport", &self.owns_transport)
            .field("cache_path", &self.store.path())
            .finish_non_exhaustive()
    }
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, skyfly_api::Error> {
    HeaderValue::from_str(value).map_err(|_| skyfly_api::Error::InvalidHeader { name })
}

/// Status classification: `< 400` succeeds, 401 is an authentication
/// failure, anything else at or above 400 is an API error. The body is
/// the error message in both failure cases.
fn classify(is_api: bool, response: TransportResponse) -> Result<Payload, skyfly_api::Error> {
    let TransportResponse { status, body } = response;

    if status < 400 {
        if !is_api {
            return Ok(Payload::Binary(body));
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload::Json(Value::Null));
        }
        return serde_json::from_slice(&body)
            .map(Payload::Json)
            .map_err(|e| skyfly_api::Error::Deserialization {
                message: e.to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
    }

    let message = String::from_utf8_lossy(&body).into_owned();
    if status == 401 {
        Err(skyfly_api::Error::Authentication { message })
    } else {
        Err(skyfly_api::Error::Api { status, message })
    }
}
