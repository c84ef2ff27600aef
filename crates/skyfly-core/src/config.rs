// ── Runtime client configuration ──
//
// Describes *how* a `Skybell` client authenticates and where it keeps its
// identity cache. Carries credential data but never reads config files;
// `skyfly-config` builds one of these from disk and environment.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use skyfly_api::CacheStore;
use skyfly_api::endpoints::DEFAULT_BASE_URL;
use url::Url;

/// Pause after a successful login before further calls are issued.
pub const LOGIN_SLEEP: Duration = Duration::from_secs(5);

/// Configuration for one client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Account e-mail used to log in.
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Log in during `initialize()` when both credentials are present.
    pub auto_login: bool,
    /// Fetch the per-device detail document on every discovery refresh.
    pub get_devices: bool,
    /// Identity cache location. Derived from the username when unset.
    pub cache_path: Option<PathBuf>,
    /// Keep the identity cache in memory only.
    pub disable_cache: bool,
    /// Wait [`LOGIN_SLEEP`] after each login.
    pub login_sleep: bool,
    /// Per-request ceiling.
    pub timeout: Duration,
    /// Root of the REST API. Any other origin is treated as an asset host.
    pub api_base: Url,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            auto_login: false,
            get_devices: false,
            cache_path: None,
            disable_cache: false,
            login_sleep: true,
            timeout: skyfly_api::REQUEST_TIMEOUT,
            api_base: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
        }
    }
}

impl ClientConfig {
    /// Credentials with auto-login enabled, everything else default.
    pub fn with_credentials(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(SecretString::from(password.into())),
            auto_login: true,
            ..Self::default()
        }
    }

    /// The cache file this configuration resolves to.
    ///
    /// `skybell_<username without dots>.json` when a username is known,
    /// `skybell.json` otherwise, both relative to the working directory.
    pub fn resolved_cache_path(&self) -> PathBuf {
        if let Some(path) = &self.cache_path {
            return path.clone();
        }
        match &self.username {
            Some(username) => PathBuf::from(format!("skybell_{}.json", username.replace('.', ""))),
            None => PathBuf::from("skybell.json"),
        }
    }

    pub(crate) fn cache_store(&self) -> CacheStore {
        if self.disable_cache {
            CacheStore::disabled()
        } else {
            CacheStore::new(self.resolved_cache_path())
        }
    }
}
