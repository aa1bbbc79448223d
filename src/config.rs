use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::error::{errors, ApiResult};

// Default configuration values
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
const DEFAULT_LOGIN_ROUTE: &str = "/";
const TOKEN_STORE_FILENAME: &str = "vitatwin.secure.json";

/// Client configuration for the VitaTwin access layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base endpoint every relative path is appended to
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// File backing the durable token store
    #[serde(default = "default_token_store_path")]
    pub token_store_path: PathBuf,
    /// Transport timeout; unset means no timeout at this layer
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: Option<u64>,
    /// Route reported in the session-invalidated event
    #[serde(default = "default_login_route")]
    pub login_route: String,
}

// Default functions
fn default_api_base() -> String {
    ["VITATWIN_API_BASE", "VITE_API_BASE"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|val| val.trim().to_string())
        .find(|val| !val.is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

fn default_token_store_path() -> PathBuf {
    if let Ok(path) = std::env::var("VITATWIN_TOKEN_STORE") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    match dirs::config_dir() {
        Some(dir) => dir.join("vitatwin").join(TOKEN_STORE_FILENAME),
        None => PathBuf::from(TOKEN_STORE_FILENAME),
    }
}

fn default_request_timeout() -> Option<u64> {
    std::env::var("VITATWIN_REQUEST_TIMEOUT")
        .ok()
        .and_then(|val| val.parse().ok())
        .filter(|secs| *secs > 0)
}

fn default_login_route() -> String {
    DEFAULT_LOGIN_ROUTE.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_store_path: default_token_store_path(),
            request_timeout_secs: default_request_timeout(),
            login_route: default_login_route(),
        }
    }
}

impl ClientConfig {
    /// Build the configuration from the process environment and validate it.
    ///
    /// Does not read `.env`; the binary loads it once at startup.
    pub fn from_env() -> ApiResult<Self> {
        let config = Self::default();
        config.validate()?;
        debug!(api_base = %config.api_base, "Loaded client configuration");
        Ok(config)
    }

    /// Override the base endpoint
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Override the durable token store location
    pub fn with_token_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_store_path = path.into();
        self
    }

    /// Check that the base endpoint is an absolute http(s) URL
    pub fn validate(&self) -> ApiResult<()> {
        let url = reqwest::Url::parse(self.api_base.trim())
            .map_err(|e| errors::config_invalid("api_base", e.to_string()))?;

        match url.scheme() {
            "http" | "https" => Ok(()),
            other => Err(errors::config_invalid(
                "api_base",
                format!("unsupported scheme '{}'", other),
            )),
        }
    }

    /// Base endpoint without a trailing slash
    pub fn base_url(&self) -> String {
        self.api_base.trim().trim_end_matches('/').to_string()
    }

    /// Transport timeout, if configured
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
