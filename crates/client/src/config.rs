//! Client configuration (API location, credentials, timeouts).

use std::fmt;
use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_API_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_PAGE_SIZE: u32 = 50;

pub const ENV_API_URL: &str = "SHOPFLOOR_API_URL";
pub const ENV_AUTH_TOKEN: &str = "SHOPFLOOR_AUTH_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "SHOPFLOOR_HTTP_TIMEOUT_SECS";
pub const ENV_PAGE_SIZE: &str = "SHOPFLOOR_PAGE_SIZE";

#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the API, without a trailing slash.
    pub api_url: String,
    /// Bearer token sent with every request, if set.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `limit` used when fetching a catalog page.
    pub page_size: u32,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup` (key → value).
    ///
    /// Unset or blank keys fall back to defaults; malformed numbers are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self::new(get(ENV_API_URL).unwrap_or_else(|| DEFAULT_API_URL.to_string()));

        if let Some(token) = get(ENV_AUTH_TOKEN) {
            config = config.with_token(token);
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|e| ClientError::Config(format!("{ENV_TIMEOUT_SECS}={raw}: {e}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(raw) = get(ENV_PAGE_SIZE) {
            let size: u32 = raw
                .trim()
                .parse()
                .map_err(|e| ClientError::Config(format!("{ENV_PAGE_SIZE}={raw}: {e}")))?;
            config = config.with_page_size(size);
        }

        Ok(config)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_url", &self.api_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("page_size", &self.page_size)
            .finish()
    }
}
