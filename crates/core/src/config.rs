//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloud API client configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the cloud JSON API (token and dispatcher requests).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Timeout for receiving a response head, and for each body chunk.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Optional proxy URL applied to all requests.
    #[serde(default)]
    pub proxy: Option<String>,
}

fn default_api_base_url() -> String {
    "https://cloud.mail.ru/api/v2".to_string()
}

fn default_user_agent() -> String {
    format!("cirrus/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            proxy: None,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate client configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout_secs == 0 {
            return Err("client.request_timeout_secs must be at least 1".to_string());
        }
        url::Url::parse(&self.api_base_url)
            .map_err(|e| format!("client.api_base_url is not a valid URL: {e}"))?;
        if let Some(proxy) = &self.proxy {
            url::Url::parse(proxy).map_err(|e| format!("client.proxy is not a valid URL: {e}"))?;
        }
        Ok(())
    }
}

/// Authenticated session handed over by the login flow.
///
/// Logging in is out of scope; the session cookie of an existing login is
/// supplied here instead.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account login (e-mail), used as the registry key and in logs.
    pub login: Option<String>,
    /// Raw `Cookie` header value of an authenticated session.
    /// WARNING: Prefer CIRRUS_ACCOUNT__SESSION_COOKIE over storing it in a file.
    pub session_cookie: Option<String>,
    /// Domain the session cookies are sent to. Defaults to the parent domain
    /// of the API host so shard hosts under it receive them too.
    pub cookie_domain: Option<String>,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("login", &self.login)
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "<redacted>"),
            )
            .field("cookie_domain", &self.cookie_domain)
            .finish()
    }
}

impl AccountConfig {
    /// Returns `(login, cookie)` or a description of what is missing.
    pub fn credentials(&self) -> Result<(&str, &str), String> {
        let login = self
            .login
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| "account.login is not set".to_string())?;
        let cookie = self
            .session_cookie
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| "account.session_cookie is not set".to_string())?;
        Ok((login, cookie))
    }
}

/// Lifetimes of the per-account caches.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Auth token lifetime (default: 23 hours).
    #[serde(default = "default_auth_token_ttl_secs")]
    pub auth_token_ttl_secs: u64,
    /// Download token lifetime (default: 20 minutes).
    #[serde(default = "default_download_token_ttl_secs")]
    pub download_token_ttl_secs: u64,
    /// Shard directory refresh interval (default: 30 minutes).
    #[serde(default = "default_shard_directory_ttl_secs")]
    pub shard_directory_ttl_secs: u64,
}

fn default_auth_token_ttl_secs() -> u64 {
    23 * 60 * 60
}

fn default_download_token_ttl_secs() -> u64 {
    20 * 60
}

fn default_shard_directory_ttl_secs() -> u64 {
    30 * 60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            auth_token_ttl_secs: default_auth_token_ttl_secs(),
            download_token_ttl_secs: default_download_token_ttl_secs(),
            shard_directory_ttl_secs: default_shard_directory_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn auth_token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth_token_ttl_secs)
    }

    pub fn download_token_ttl(&self) -> Duration {
        Duration::from_secs(self.download_token_ttl_secs)
    }

    pub fn shard_directory_ttl(&self) -> Duration {
        Duration::from_secs(self.shard_directory_ttl_secs)
    }

    /// Validate cache configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("cache.auth_token_ttl_secs", self.auth_token_ttl_secs),
            ("cache.download_token_ttl_secs", self.download_token_ttl_secs),
            ("cache.shard_directory_ttl_secs", self.shard_directory_ttl_secs),
        ] {
            if value == 0 {
                return Err(format!("{name} must be at least 1"));
            }
        }
        Ok(())
    }
}

/// Shard failover policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShardConfig {
    /// How long a failed shard stays banned (default: 2 minutes).
    #[serde(default = "default_ban_window_secs")]
    pub ban_window_secs: u64,
    /// Resolution attempts before falling back to a possibly banned shard.
    #[serde(default = "default_resolve_attempts")]
    pub resolve_attempts: u32,
    /// Delay growth per attempt; attempt `n` waits `n * backoff_step_ms`.
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,
}

fn default_ban_window_secs() -> u64 {
    120
}

fn default_resolve_attempts() -> u32 {
    10
}

fn default_backoff_step_ms() -> u64 {
    80
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            ban_window_secs: default_ban_window_secs(),
            resolve_attempts: default_resolve_attempts(),
            backoff_step_ms: default_backoff_step_ms(),
        }
    }
}

impl ShardConfig {
    pub fn ban_window(&self) -> Duration {
        Duration::from_secs(self.ban_window_secs)
    }

    pub fn backoff_step(&self) -> Duration {
        Duration::from_millis(self.backoff_step_ms)
    }

    /// Validate shard configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.resolve_attempts == 0 {
            return Err("shards.resolve_attempts must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Per-stream settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Ring buffer capacity in bytes (default: 64 KiB).
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Retries per segment after the first failed attempt (default: 3).
    #[serde(default = "default_segment_retries")]
    pub segment_retries: u32,
}

fn default_buffer_capacity() -> usize {
    64 * 1024
}

fn default_segment_retries() -> u32 {
    3
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            segment_retries: default_segment_retries(),
        }
    }
}

impl StreamConfig {
    /// Validate stream configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_capacity == 0 {
            return Err("stream.buffer_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub shards: ShardConfig,
    #[serde(default)]
    pub stream: StreamConfig,
}

impl AppConfig {
    /// Validate every section. Account credentials are checked when an
    /// account is created, not here.
    pub fn validate(&self) -> crate::Result<()> {
        self.client.validate().map_err(crate::Error::Config)?;
        self.cache.validate().map_err(crate::Error::Config)?;
        self.shards.validate().map_err(crate::Error::Config)?;
        self.stream.validate().map_err(crate::Error::Config)?;
        Ok(())
    }
}
