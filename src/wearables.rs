use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::{read_json, ApiClient, RequestOptions, SimpleHttpResponse};
use crate::error::{errors, ApiResult};

/// Signals requested when the caller does not name any
pub const DEFAULT_SYNC_SIGNALS: [&str; 3] = ["activity_steps", "heart_rate", "sleep_duration"];

/// Connection state of one wearable provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: String,
    #[serde(default)]
    pub connected_at: Option<String>,
    #[serde(default)]
    pub last_sync_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub provider: String,
    /// Where the user authorizes the provider, if it needs a browser step
    #[serde(default)]
    pub connect_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub provider: String,
    #[serde(default)]
    pub last_synced_at: Option<String>,
    #[serde(default)]
    pub health_state: Map<String, Value>,
}

#[derive(Serialize)]
struct ConnectRequest<'a> {
    provider: &'a str,
}

#[derive(Serialize)]
struct SyncRequest<'a> {
    provider: &'a str,
    signals: &'a [String],
}

/// Wearable connection and sync endpoints
#[derive(Clone)]
pub struct WearablesApi {
    api: ApiClient,
}

impl WearablesApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Connected providers and their last sync
    pub async fn status(&self) -> ApiResult<Vec<ProviderStatus>> {
        let response = self.api.fetch("/wearables/status", RequestOptions::get()).await?;
        expect_success(&response, "Unable to load wearable status")?;
        read_json(&response)
    }

    /// Start connecting `provider`
    pub async fn connect(&self, provider: &str) -> ApiResult<ConnectResponse> {
        let response = self
            .api
            .post_json("/wearables/connect", &ConnectRequest { provider })
            .await?;
        expect_success(&response, &format!("Unable to connect {}", provider))?;
        read_json(&response)
    }

    /// Pull `signals` from `provider`; an empty list requests the defaults
    pub async fn sync(&self, provider: &str, signals: &[String]) -> ApiResult<SyncResponse> {
        let defaults: Vec<String>;
        let signals = if signals.is_empty() {
            defaults = DEFAULT_SYNC_SIGNALS.iter().map(|s| s.to_string()).collect();
            defaults.as_slice()
        } else {
            signals
        };

        debug!(provider, signals = ?signals, "Syncing wearable data");
        let response = self
            .api
            .post_json("/wearables/sync", &SyncRequest { provider, signals })
            .await?;
        expect_success(&response, "Unable to sync")?;
        read_json(&response)
    }
}

fn expect_success(response: &SimpleHttpResponse, message: &str) -> ApiResult<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(errors::http_failure(response.status(), message))
    }
}
