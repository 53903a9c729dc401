//! Client configuration.
//!
//! [`ClientConfig`] is a plain struct; nothing in the crate reads the
//! environment except [`ClientConfig::from_env`].

use std::time::Duration;

use crate::error::ApiError;

pub const URL_VAR: &str = "TIMETAGGER_URL";
pub const API_KEY_VAR: &str = "TIMETAGGER_API_KEY";
pub const TIMEOUT_VAR: &str = "TIMETAGGER_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to talk to one TimeTagger server.
#[derive(Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://host/timetagger/api/v2/`.
    pub base_url: String,
    /// Sent as the `authtoken` header on every request.
    pub api_key: String,
    pub timeout: Duration,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Reads `TIMETAGGER_URL`, `TIMETAGGER_API_KEY` and the optional
    /// `TIMETAGGER_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) with a caller-supplied lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ApiError::Config(format!("{name} is not set")))
        };
        let base_url = required(URL_VAR)?;
        let api_key = required(API_KEY_VAR)?;

        let timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ApiError::Config(format!("{TIMEOUT_VAR} must be whole seconds, got {raw:?}"))
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            base_url,
            api_key,
            timeout,
        })
    }
}
