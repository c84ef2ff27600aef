// ── Skybell client ──
//
// Full lifecycle management for one SkyBell account: identity cache load,
// login, profile fetch and device discovery. Owns the device registry;
// devices share the session through an `Arc`.

use std::sync::Arc;

use indexmap::IndexMap;
use skyfly_api::models::{DeviceRecord, User};
use skyfly_api::{Endpoints, HttpTransport, IdentityCache, Transport, TransportConfig};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::ClientConfig;
use crate::device::{Device, DeviceUpdate};
use crate::error::CoreError;
use crate::session::{ApiRequest, Payload, Session, SessionParts};

/// Client for one SkyBell account.
///
/// ```no_run
/// # async fn demo() -> Result<(), skyfly_core::CoreError> {
/// use skyfly_core::{ClientConfig, Skybell};
///
/// let mut skybell = Skybell::new(ClientConfig::with_credentials("me@example.com", "secret"))?;
/// for device in skybell.initialize().await? {
///     println!("{}", device.desc());
/// }
/// # Ok(())
/// # }
/// ```
pub struct Skybell {
    config: ClientConfig,
    session: Arc<Session>,
    devices: IndexMap<String, Device>,
    user: Option<User>,
}

impl Skybell {
    /// Build a client with its own HTTP transport. The transport is closed
    /// on logout and on [`Skybell::close`].
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        let transport = HttpTransport::new(&TransportConfig {
            timeout: config.timeout,
            ..TransportConfig::default()
        })?;
        Self::build(config, Arc::new(transport), true)
    }

    /// Build a client on a caller-supplied transport, which is never closed
    /// by the client.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CoreError> {
        Self::build(config, transport, false)
    }

    fn build(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        owns_transport: bool,
    ) -> Result<Self, CoreError> {
        let endpoints = Endpoints::new(config.api_base.as_str())?;
        let span = info_span!(
            "skybell",
            user = config.username.as_deref().unwrap_or("<anonymous>")
        );
        let session = Session::new(SessionParts {
            transport,
            owns_transport,
            endpoints,
            username: config.username.clone(),
            password: config.password.clone(),
            store: config.cache_store(),
            login_sleep: config.login_sleep,
            timeout: config.timeout,
            span,
        });

        Ok(Self {
            config,
            session: Arc::new(session),
            devices: IndexMap::new(),
            user: None,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The request capability shared with every device.
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Snapshot of the identity cache.
    pub fn cache(&self) -> IdentityCache {
        self.session.cache()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Load the identity cache, log in when configured to, fetch the user
    /// profile and discover devices.
    pub async fn initialize(&mut self) -> Result<Vec<&mut Device>, CoreError> {
        let span = self.session.span().clone();
        async {
            self.session.load_cache().await?;

            let has_credentials =
                self.config.username.is_some() && self.config.password.is_some();
            if self.config.auto_login && has_credentials {
                self.session.login(None, None).await?;
            }

            let user: User = self
                .session
                .get_json(self.session.endpoints().users_me())
                .await?;
            debug!(user_id = %user.id, "fetched user profile");
            self.user = Some(user);
            Ok::<(), CoreError>(())
        }
        .instrument(span)
        .await?;

        self.get_devices(false).await
    }

    /// Log in with the stored credentials, or replace them first.
    pub async fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), CoreError> {
        self.session
            .login(username, password)
            .instrument(self.session.span().clone())
            .await
    }

    /// End the session: forget the access token and the device registry.
    /// A no-op without an active session.
    pub async fn logout(&mut self) -> Result<(), CoreError> {
        let was_active = self
            .session
            .logout()
            .instrument(self.session.span().clone())
            .await?;
        if was_active {
            self.devices.clear();
        }
        Ok(())
    }

    /// Release the transport if this client built it.
    pub async fn close(&self) {
        self.session.close().await;
    }

    /// Send a request through the authenticated pipeline.
    pub async fn send_request(&self, request: ApiRequest) -> Result<Payload, CoreError> {
        self.session
            .send_request(request)
            .instrument(self.session.span().clone())
            .await
    }

    // ── Discovery ───────────────────────────────────────────────────

    /// All registered devices, discovering them first when the registry
    /// is empty or `refresh` is set.
    ///
    /// Known devices are updated in place. Devices missing from a new
    /// listing stay registered.
    pub async fn get_devices(&mut self, refresh: bool) -> Result<Vec<&mut Device>, CoreError> {
        if refresh || self.devices.is_empty() {
            let span = self.session.span().clone();
            self.discover().instrument(span).await?;
        }
        Ok(self.devices.values_mut().collect())
    }

    async fn discover(&mut self) -> Result<(), CoreError> {
        info!("updating all devices");
        let records: Vec<DeviceRecord> = self
            .session
            .get_json::<Option<Vec<DeviceRecord>>>(self.session.endpoints().devices())
            .await?
            .unwrap_or_default();

        for record in records {
            if record.id.is_empty() {
                warn!("skipping device record without an id");
                continue;
            }
            if let Some(device) = self.devices.get_mut(&record.id) {
                device
                    .update(DeviceUpdate {
                        device: Some(record),
                        get_devices: self.config.get_devices,
                        ..DeviceUpdate::default()
                    })
                    .await?;
            } else {
                debug!(device_id = %record.id, "discovered device");
                let device = Device::new(record, Arc::clone(&self.session));
                self.devices.insert(device.device_id().to_owned(), device);
            }
        }
        Ok(())
    }

    /// One device by id, discovering devices first when none are known.
    ///
    /// `refresh` forces a full update unless discovery just ran.
    pub async fn get_device(
        &mut self,
        device_id: &str,
        refresh: bool,
    ) -> Result<&mut Device, CoreError> {
        let mut refresh = refresh;
        if self.devices.is_empty() {
            self.get_devices(false).await?;
            refresh = false;
        }

        let device = self
            .devices
            .get_mut(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                id: device_id.to_owned(),
            })?;
        if refresh {
            device.update(DeviceUpdate::default()).await?;
        }
        Ok(device)
    }

    /// Registered devices in discovery order, without network access.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.get(device_id)
    }

    // ── User profile ────────────────────────────────────────────────

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.id.as_str())
    }

    pub fn user_first_name(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.first_name.as_str())
    }

    pub fn user_last_name(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.last_name.as_str())
    }
}

impl std::fmt::Debug for Skybell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skybell")
            .field("session", &self.session)
            .field("devices", &self.devices.len())
            .finish_non_exhaustive()
    }
}
