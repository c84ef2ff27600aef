// Identity cache
//
// Process-local key/value state persisted to a single JSON file: the
// generated app/client identifiers, the login session token, the current
// access token, and per-device cached sub-state (the event ledger).
//
// Identifiers are generated first and the on-disk copy is merged over
// them, so a restart reuses the persisted identity while fields missing
// from an older file keep their freshly generated defaults.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value, json};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::merge::deep_merge;
use crate::models::Activity;

pub const APP_ID: &str = "app_id";
pub const CLIENT_ID: &str = "client_id";
pub const TOKEN: &str = "token";
pub const ACCESS_TOKEN: &str = "access_token";
pub const DEVICES: &str = "devices";
/// Per-device slot holding the event ledger.
pub const EVENT: &str = "event";

/// In-memory identity cache. Pure data plus merge logic; persistence is
/// handled by [`CacheStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityCache {
    entries: Map<String, Value>,
}

impl Default for IdentityCache {
    fn default() -> Self {
        Self::generate()
    }
}

impl IdentityCache {
    /// Fresh cache with newly generated identifiers and no access token.
    pub fn generate() -> Self {
        let mut entries = Map::new();
        entries.insert(APP_ID.into(), Value::String(generate_id()));
        entries.insert(CLIENT_ID.into(), Value::String(generate_id()));
        entries.insert(TOKEN.into(), Value::String(generate_token()));
        entries.insert(ACCESS_TOKEN.into(), Value::String(String::new()));
        entries.insert(DEVICES.into(), Value::Object(Map::new()));
        Self { entries }
    }

    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// String value for `key`; empty when absent or not a string.
    pub fn get_str(&self, key: &str) -> &str {
        self.entries
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn app_id(&self) -> &str {
        self.get_str(APP_ID)
    }

    pub fn client_id(&self) -> &str {
        self.get_str(CLIENT_ID)
    }

    pub fn session_token(&self) -> &str {
        self.get_str(TOKEN)
    }

    pub fn access_token(&self) -> &str {
        self.get_str(ACCESS_TOKEN)
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token().is_empty()
    }

    /// Deep-merge a partial structure into the cache.
    pub fn merge(&mut self, patch: Map<String, Value>) {
        deep_merge(&mut self.entries, patch);
    }

    /// Cached sub-state for one device.
    pub fn device(&self, device_id: &str) -> Option<&Map<String, Value>> {
        self.entries
            .get(DEVICES)
            .and_then(Value::as_object)
            .and_then(|devices| devices.get(device_id))
            .and_then(Value::as_object)
    }

    /// The persisted event ledger for a device, keyed by event type.
    ///
    /// Entries that no longer decode as activity records are dropped.
    pub fn device_events(&self, device_id: &str) -> BTreeMap<String, Activity> {
        let Some(events) = self
            .device(device_id)
            .and_then(|slot| slot.get(EVENT))
            .and_then(Value::as_object)
        else {
            return BTreeMap::new();
        };

        events
            .iter()
            .filter_map(|(event, raw)| match serde_json::from_value(raw.clone()) {
                Ok(activity) => Some((event.clone(), activity)),
                Err(e) => {
                    warn!(device_id, event, error = %e, "dropping undecodable ledger entry");
                    None
                }
            })
            .collect()
    }

    /// Build the patch that stores `events` under a device's ledger slot.
    pub fn events_patch(device_id: &str, events: &BTreeMap<String, Activity>) -> Map<String, Value> {
        let ledger: Map<String, Value> = events
            .iter()
            .filter_map(|(event, activity)| {
                serde_json::to_value(activity)
                    .ok()
                    .map(|value| (event.clone(), value))
            })
            .collect();

        let mut patch = Map::new();
        patch.insert(
            DEVICES.into(),
            json!({ device_id: { EVENT: Value::Object(ledger) } }),
        );
        patch
    }

    /// Patch setting the access token.
    pub fn access_token_patch(token: &str) -> Map<String, Value> {
        let mut patch = Map::new();
        patch.insert(ACCESS_TOKEN.into(), Value::String(token.to_owned()));
        patch
    }

    /// Serialize the whole cache.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.entries)
    }
}

/// Random identifier for `app_id` / `client_id`.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// 32-character upper-case alphanumeric session token.
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

// ── File store ───────────────────────────────────────────────────────

/// Whole-file persistence for an [`IdentityCache`].
///
/// A store without a path is disabled: loads find nothing and saves are
/// no-ops.
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    path: Option<PathBuf>,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    /// Read the persisted cache, if any.
    ///
    /// An existing but empty file is deleted rather than parsed.
    pub async fn load(&self) -> Result<Option<Map<String, Value>>, Error> {
        let Some(path) = self.path.as_deref() else {
            return Ok(None);
        };

        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no cache file found");
                return Ok(None);
            }
            Err(e) => return Err(cache_error(path, &e)),
        };

        if metadata.len() == 0 {
            debug!(path = %path.display(), "cache file is empty, removing it");
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| cache_error(path, &e))?;
            return Ok(None);
        }

        debug!(path = %path.display(), "cache found");
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| cache_error(path, &e))?;

        match serde_json::from_slice::<Value>(&raw).map_err(|e| cache_error(path, &e))? {
            Value::Object(entries) => Ok(Some(entries)),
            other => Err(Error::Cache {
                path: path.display().to_string(),
                message: format!("expected a JSON object, found {other}"),
            }),
        }
    }

    /// Write the full cache. No-op when disabled.
    pub async fn save(&self, cache: &IdentityCache) -> Result<(), Error> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        let bytes = cache.to_bytes().map_err(|e| cache_error(path, &e))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| cache_error(path, &e))
    }
}

fn cache_error(path: &Path, err: &dyn std::fmt::Display) -> Error {
    Error::Cache {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn activity(id: &str, event: &str, created_at: &str) -> Activity {
        Activity {
            id: id.into(),
            event: event.into(),
            created_at: created_at.into(),
            ..Activity::default()
        }
    }

    #[test]
    fn generated_identity_is_populated() {
        let cache = IdentityCache::generate();
        assert!(!cache.app_id().is_empty());
        assert!(!cache.client_id().is_empty());
        assert_ne!(cache.app_id(), cache.client_id());
        assert_eq!(cache.session_token().len(), 32);
        assert!(
            cache
                .session_token()
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
        assert!(!cache.has_access_token());
    }

    #[test]
    fn get_str_defaults_to_empty() {
        let cache = IdentityCache::generate();
        assert_eq!(cache.get_str("missing"), "");
        assert_eq!(cache.get_str(DEVICES), "");
    }

    #[test]
    fn merge_preserves_identity_across_token_changes() {
        let mut cache = IdentityCache::generate();
        let app_id = cache.app_id().to_owned();

        cache.merge(IdentityCache::access_token_patch("superlongkey"));
        assert_eq!(cache.access_token(), "superlongkey");
        cache.merge(IdentityCache::access_token_patch(""));

        assert_eq!(cache.app_id(), app_id);
        assert!(!cache.has_access_token());
    }

    #[test]
    fn events_round_trip_through_device_slot() {
        let mut cache = IdentityCache::generate();
        let mut events = BTreeMap::new();
        events.insert(
            "device:sensor:motion".to_owned(),
            activity("a1", "device:sensor:motion", "2020-03-30T12:35:02.204Z"),
        );
        cache.merge(IdentityCache::events_patch("dev1", &events));

        let other = BTreeMap::from([(
            "device:sensor:button".to_owned(),
            activity("b1", "device:sensor:button", "2020-03-30T12:36:00.000Z"),
        )]);
        cache.merge(IdentityCache::events_patch("dev2", &other));

        assert_eq!(cache.device_events("dev1"), events);
        assert_eq!(cache.device_events("dev2"), other);
        assert!(cache.device_events("dev3").is_empty());
    }

    #[tokio::test]
    async fn disabled_store_is_inert() {
        let store = CacheStore::disabled();
        assert!(store.load().await.unwrap().is_none());
        store.save(&IdentityCache::generate()).await.unwrap();
        assert!(!store.is_enabled());
    }

    #[tokio::test]
    async fn persisted_identity_overrides_generated_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::new(dir.path().join("skybell.json"));

        let mut first = IdentityCache::generate();
        first.merge(object(json!({ "unknown_key": { "kept": true } })));
        store.save(&first).await.unwrap();

        // Simulate an older file that lacks client_id.
        let mut persisted = store.load().await.unwrap().unwrap();
        persisted.remove(CLIENT_ID);

        let mut second = IdentityCache::generate();
        let generated_client = second.client_id().to_owned();
        second.merge(persisted);

        assert_eq!(second.app_id(), first.app_id());
        assert_eq!(second.session_token(), first.session_token());
        assert_eq!(second.client_id(), generated_client);
        assert_eq!(second.get("unknown_key"), Some(&json!({ "kept": true })));
    }

    #[tokio::test]
    async fn empty_cache_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skybell.json");
        tokio::fs::write(&path, b"").await.unwrap();

        let store = CacheStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn non_object_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skybell.json");
        tokio::fs::write(&path, b"[1, 2]").await.unwrap();

        let result = CacheStore::new(&path).load().await;
        assert!(matches!(result, Err(Error::Cache { .. })), "got: {result:?}");
    }
}
