//! Runtime configuration for the store and the remote sync backend.
//!
//! Values come from `QUESTLOG_*` environment variables. Clients may load a
//! `.env` file first; this module only reads the process environment.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::sync::{HttpRemoteBackend, RemoteBackend, SyncCredentials};
use crate::util::{compact_text, is_http_url, normalize_text_option};
use crate::{Error, Result};

pub const ENV_REMOTE_URL: &str = "QUESTLOG_REMOTE_URL";
pub const ENV_API_KEY: &str = "QUESTLOG_API_KEY";
pub const ENV_ACCESS_TOKEN: &str = "QUESTLOG_ACCESS_TOKEN";
pub const ENV_USER_ID: &str = "QUESTLOG_USER_ID";
pub const ENV_DEVICE_ID: &str = "QUESTLOG_DEVICE_ID";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "QUESTLOG_HTTP_TIMEOUT_SECS";

const DEFAULT_DEVICE_ID: &str = "local-device";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Settings for the local store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Stamped as `origin_device_id` on tasks created on this device
    pub device_id: String,
}

impl StoreConfig {
    pub fn new(device_id: impl Into<String>) -> Self {
        let device_id = normalize_text_option(Some(device_id.into()))
            .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());
        Self { device_id }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::new(lookup(ENV_DEVICE_ID).unwrap_or_default())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_ID)
    }
}

/// Remote sync settings.
///
/// Every field is optional; a partially configured remote keeps the app
/// offline-only instead of failing.
#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub remote_url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub http_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            api_key: None,
            access_token: None,
            user_id: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("remote_url", &self.remote_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user_id", &self.user_id)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, validating what is present
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let http_timeout = match normalize_text_option(lookup(ENV_HTTP_TIMEOUT_SECS)) {
            Some(raw) => {
                let secs = raw.parse::<u64>().map_err(|_| {
                    Error::InvalidInput(format!(
                        "{ENV_HTTP_TIMEOUT_SECS} must be a whole number of seconds, got '{}'",
                        compact_text(&raw)
                    ))
                })?;
                Duration::from_secs(secs.max(1))
            }
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        };

        let config = Self {
            remote_url: normalize_text_option(lookup(ENV_REMOTE_URL)),
            api_key: normalize_text_option(lookup(ENV_API_KEY)),
            access_token: normalize_text_option(lookup(ENV_ACCESS_TOKEN)),
            user_id: normalize_text_option(lookup(ENV_USER_ID)),
            http_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if let Some(url) = self.remote_url.as_deref() {
            if !is_http_url(url) {
                return Err(Error::InvalidInput(format!(
                    "{ENV_REMOTE_URL} must start with http:// or https://, got '{}'",
                    compact_text(url)
                )));
            }
        }
        Ok(())
    }

    /// Whether every value needed to reach the remote is present
    pub const fn is_configured(&self) -> bool {
        self.remote_url.is_some()
            && self.api_key.is_some()
            && self.access_token.is_some()
            && self.user_id.is_some()
    }

    /// Names of the variables still missing, for diagnostics
    pub fn missing_variables(&self) -> Vec<&'static str> {
        [
            (ENV_REMOTE_URL, self.remote_url.is_none()),
            (ENV_API_KEY, self.api_key.is_none()),
            (ENV_ACCESS_TOKEN, self.access_token.is_none()),
            (ENV_USER_ID, self.user_id.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }

    /// Build per-cycle credentials; offline when anything is missing
    pub fn credentials(&self) -> Result<SyncCredentials> {
        let (Some(url), Some(api_key), Some(token), Some(user_id)) = (
            self.remote_url.as_deref(),
            self.api_key.as_deref(),
            self.access_token.as_deref(),
            self.user_id.as_deref(),
        ) else {
            tracing::debug!(
                "Remote sync not configured; missing {}",
                self.missing_variables().join(", ")
            );
            return Ok(SyncCredentials::offline());
        };

        let backend = HttpRemoteBackend::new(url, api_key, token, self.http_timeout)?;
        let client: Arc<dyn RemoteBackend> = Arc::new(backend);
        Ok(SyncCredentials::new(client, user_id))
    }
}
