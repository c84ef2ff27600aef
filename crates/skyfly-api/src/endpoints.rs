// SkyBell REST endpoint catalogue
//
// Path templates are relative to the API base (`/api/v3/`). `$DEVID$` and
// `$SUBSCRIPTIONID$` are substituted verbatim. The base URL is injectable
// so tests can point the whole surface at a mock server.

use url::Url;

use crate::error::Error;

/// Production API base.
pub const DEFAULT_BASE_URL: &str = "https://cloud.myskybell.com/api/v3/";

pub const DEVICE_ID_PLACEHOLDER: &str = "$DEVID$";
pub const SUBSCRIPTION_ID_PLACEHOLDER: &str = "$SUBSCRIPTIONID$";

pub const LOGIN_PATH: &str = "login/";
pub const LOGOUT_PATH: &str = "logout/";
pub const USERS_ME_PATH: &str = "users/me/";
pub const DEVICES_PATH: &str = "devices/";
pub const DEVICE_PATH: &str = "devices/$DEVID$/";
pub const DEVICE_ACTIVITIES_PATH: &str = "devices/$DEVID$/activities/";
pub const DEVICE_AVATAR_PATH: &str = "devices/$DEVID$/avatar/";
pub const DEVICE_INFO_PATH: &str = "devices/$DEVID$/info/";
pub const DEVICE_SETTINGS_PATH: &str = "devices/$DEVID$/settings/";
pub const SUBSCRIPTIONS_PATH: &str = "subscriptions?include=device,owner";
pub const SUBSCRIPTION_PATH: &str = "subscriptions/$SUBSCRIPTIONID$";
pub const SUBSCRIPTION_INFO_PATH: &str = "subscriptions/$SUBSCRIPTIONID$/info/";
pub const SUBSCRIPTION_SETTINGS_PATH: &str = "subscriptions/$SUBSCRIPTIONID$/settings/";

/// Resolves endpoint templates against an API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            base: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
        }
    }
}

impl Endpoints {
    /// Build from a base URL. A trailing slash is added when missing so
    /// relative joins keep the full base path.
    pub fn new(base: &str) -> Result<Self, Error> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// `true` when `url` targets the primary API host.
    ///
    /// Host identity is the URL origin (scheme, host, port); anything else
    /// is treated as an asset URL (avatar or activity media).
    pub fn is_api_url(&self, url: &Url) -> bool {
        url.origin() == self.base.origin()
    }

    /// Join a template onto the base after placeholder substitution.
    fn resolve(&self, template: &str, device_id: Option<&str>, subscription_id: Option<&str>) -> Url {
        let mut path = template.to_owned();
        if let Some(id) = device_id {
            path = path.replace(DEVICE_ID_PLACEHOLDER, id);
        }
        if let Some(id) = subscription_id {
            path = path.replace(SUBSCRIPTION_ID_PLACEHOLDER, id);
        }
        // Templates are static relative paths; ids are opaque hex strings.
        self.base
            .join(&path)
            .expect("path should be valid relative URL")
    }

    pub fn login(&self) -> Url {
        self.resolve(LOGIN_PATH, None, None)
    }

    pub fn logout(&self) -> Url {
        self.resolve(LOGOUT_PATH, None, None)
    }

    pub fn users_me(&self) -> Url {
        self.resolve(USERS_ME_PATH, None, None)
    }

    pub fn devices(&self) -> Url {
        self.resolve(DEVICES_PATH, None, None)
    }

    pub fn device(&self, device_id: &str) -> Url {
        self.resolve(DEVICE_PATH, Some(device_id), None)
    }

    pub fn device_activities(&self, device_id: &str) -> Url {
        self.resolve(DEVICE_ACTIVITIES_PATH, Some(device_id), None)
    }

    pub fn device_avatar(&self, device_id: &str) -> Url {
        self.resolve(DEVICE_AVATAR_PATH, Some(device_id), None)
    }

    pub fn device_info(&self, device_id: &str) -> Url {
        self.resolve(DEVICE_INFO_PATH, Some(device_id), None)
    }

    pub fn device_settings(&self, device_id: &str) -> Url {
        self.resolve(DEVICE_SETTINGS_PATH, Some(device_id), None)
    }

    pub fn subscriptions(&self) -> Url {
        self.resolve(SUBSCRIPTIONS_PATH, None, None)
    }

    pub fn subscription(&self, subscription_id: &str) -> Url {
        self.resolve(SUBSCRIPTION_PATH, None, Some(subscription_id))
    }

    pub fn subscription_info(&self, subscription_id: &str) -> Url {
        self.resolve(SUBSCRIPTION_INFO_PATH, None, Some(subscription_id))
    }

    pub fn subscription_settings(&self, subscription_id: &str) -> Url {
        self.resolve(SUBSCRIPTION_SETTINGS_PATH, None, Some(subscription_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_base_is_production() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.login().as_str(),
            "https://cloud.myskybell.com/api/v3/login/"
        );
    }

    #[test]
    fn device_templates_substitute_id() {
        let endpoints = Endpoints::default();
        assert_eq!(
            endpoints.device_settings("abc123").as_str(),
            "https://cloud.myskybell.com/api/v3/devices/abc123/settings/"
        );
        assert_eq!(
            endpoints.device_activities("abc123").path(),
            "/api/v3/devices/abc123/activities/"
        );
    }

    #[test]
    fn subscription_templates_keep_query() {
        let endpoints = Endpoints::default();
        let url = endpoints.subscriptions();
        assert_eq!(url.path(), "/api/v3/subscriptions");
        assert_eq!(url.query(), Some("include=device,owner"));
        assert_eq!(
            endpoints.subscription_info("sub1").path(),
            "/api/v3/subscriptions/sub1/info/"
        );
    }

    #[test]
    fn base_without_trailing_slash_is_normalized() {
        let endpoints = Endpoints::new("http://127.0.0.1:9000/api/v3").unwrap();
        assert_eq!(
            endpoints.devices().as_str(),
            "http://127.0.0.1:9000/api/v3/devices/"
        );
    }

    #[test]
    fn api_host_is_matched_by_origin() {
        let endpoints = Endpoints::new("http://127.0.0.1:9000/api/v3/").unwrap();
        assert!(endpoints.is_api_url(&Url::parse("http://127.0.0.1:9000/anything").unwrap()));
        assert!(!endpoints.is_api_url(&Url::parse("http://127.0.0.1:9001/a.jpg").unwrap()));
        assert!(
            !Endpoints::default().is_api_url(
                &Url::parse("https://v3-production-devices-avatar.s3-us-west-2.amazonaws.com/x.jpg")
                    .unwrap()
            )
        );
    }
}
