//! Harness configuration
//!
//! Every value has a default matching the deployment the suites were written
//! against and can be overridden through `STADTWACHE_*` environment variables
//! (optionally loaded from a `.env` file).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};

// Default configuration values
pub const DEFAULT_API_URL: &str = "https://theme-overhaul-2.preview.emergentagent.com/api";
pub const DEFAULT_SOCKET_URL: &str = "https://theme-overhaul-2.preview.emergentagent.com";
pub const DEFAULT_SOCKET_PATH: &str = "/socket.io";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@stadtwache.sys";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;
pub const DEFAULT_JOIN_DELAY_MS: u64 = 1000;
pub const DEFAULT_EVENT_WAIT_MS: u64 = 3000;
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_CHANNEL: &str = "general";
pub const DEFAULT_SYNTHETIC_USER: &str = "test-user-123";

// Environment variable names
pub const API_URL_ENV: &str = "STADTWACHE_API_URL";
pub const SOCKET_URL_ENV: &str = "STADTWACHE_SOCKET_URL";
pub const SOCKET_PATH_ENV: &str = "STADTWACHE_SOCKET_PATH";
pub const REQUEST_TIMEOUT_ENV: &str = "STADTWACHE_REQUEST_TIMEOUT_SECS";
pub const ADMIN_EMAIL_ENV: &str = "STADTWACHE_ADMIN_EMAIL";
pub const ADMIN_PASSWORD_ENV: &str = "STADTWACHE_ADMIN_PASSWORD";
pub const SETTLE_DELAY_ENV: &str = "STADTWACHE_SETTLE_DELAY_MS";
pub const JOIN_DELAY_ENV: &str = "STADTWACHE_JOIN_DELAY_MS";
pub const EVENT_WAIT_ENV: &str = "STADTWACHE_EVENT_WAIT_MS";
pub const HANDSHAKE_TIMEOUT_ENV: &str = "STADTWACHE_HANDSHAKE_TIMEOUT_MS";
pub const CHANNEL_ENV: &str = "STADTWACHE_CHANNEL";
pub const SYNTHETIC_USER_ENV: &str = "STADTWACHE_SYNTHETIC_USER";

/// Full harness configuration
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// REST API settings
    pub api: ApiConfig,
    /// Real-time channel settings
    pub realtime: RealtimeConfig,
    /// Credentials of the bootstrap administrator
    pub credentials: AdminCredentials,
}

/// REST API settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL every relative path is appended to (no trailing slash)
    pub base_url: String,
    /// Fixed timeout applied to every request
    pub request_timeout: Duration,
}

/// Real-time channel settings
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Service origin, e.g. `https://host`
    pub origin: String,
    /// Socket.IO mount path
    pub path: String,
    /// Wait after the handshake before judging the connection
    pub settle_delay: Duration,
    /// Wait after each room join request
    pub join_delay: Duration,
    /// Wait for events after the synthetic message is sent
    pub event_wait: Duration,
    /// Upper bound for a single transport handshake
    pub handshake_timeout: Duration,
    /// Channel joined and written to
    pub channel: String,
    /// Identity used for the per-user room and as message sender
    pub synthetic_user: String,
}

/// Credentials used for bootstrap and login
#[derive(Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_SOCKET_URL.to_string(),
            path: DEFAULT_SOCKET_PATH.to_string(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            join_delay: Duration::from_millis(DEFAULT_JOIN_DELAY_MS),
            event_wait: Duration::from_millis(DEFAULT_EVENT_WAIT_MS),
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
            channel: DEFAULT_CHANNEL.to_string(),
            synthetic_user: DEFAULT_SYNTHETIC_USER.to_string(),
        }
    }
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            password: DEFAULT_ADMIN_PASSWORD.to_string(),
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            realtime: RealtimeConfig::default(),
            credentials: AdminCredentials::default(),
        }
    }
}

/// Load a `.env` file if one exists, returning its path
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

impl HarnessConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> HarnessResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> HarnessResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup(API_URL_ENV).unwrap_or(defaults.api.base_url);
        let base_url = validate_url(API_URL_ENV, &base_url)?;

        let origin = lookup(SOCKET_URL_ENV).unwrap_or(defaults.realtime.origin);
        let origin = validate_url(SOCKET_URL_ENV, &origin)?;

        let path = lookup(SOCKET_PATH_ENV).unwrap_or(defaults.realtime.path);
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };

        let config = Self {
            api: ApiConfig {
                base_url,
                request_timeout: Duration::from_secs(parse_or(
                    &lookup,
                    REQUEST_TIMEOUT_ENV,
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )?),
            },
            realtime: RealtimeConfig {
                origin,
                path,
                settle_delay: millis_or(&lookup, SETTLE_DELAY_ENV, DEFAULT_SETTLE_DELAY_MS)?,
                join_delay: millis_or(&lookup, JOIN_DELAY_ENV, DEFAULT_JOIN_DELAY_MS)?,
                event_wait: millis_or(&lookup, EVENT_WAIT_ENV, DEFAULT_EVENT_WAIT_MS)?,
                handshake_timeout: millis_or(
                    &lookup,
                    HANDSHAKE_TIMEOUT_ENV,
                    DEFAULT_HANDSHAKE_TIMEOUT_MS,
                )?,
                channel: lookup(CHANNEL_ENV).unwrap_or(defaults.realtime.channel),
                synthetic_user: lookup(SYNTHETIC_USER_ENV)
                    .unwrap_or(defaults.realtime.synthetic_user),
            },
            credentials: AdminCredentials {
                email: lookup(ADMIN_EMAIL_ENV).unwrap_or(defaults.credentials.email),
                password: lookup(ADMIN_PASSWORD_ENV).unwrap_or(defaults.credentials.password),
            },
        };

        debug!(
            api = %config.api.base_url,
            socket = %config.realtime.origin,
            "Loaded harness configuration"
        );
        Ok(config)
    }
}

/// Check that a URL parses and strip any trailing slash
fn validate_url(key: &str, value: &str) -> HarnessResult<String> {
    let trimmed = value.trim().trim_end_matches('/');
    Url::parse(trimmed).map_err(|e| HarnessError::ConfigInvalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    Ok(trimmed.to_string())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> HarnessResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| HarnessError::ConfigInvalid {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: u64) -> HarnessResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default).map(Duration::from_millis)
}
