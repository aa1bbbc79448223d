//! Session- and consent-aware access layer for the VitaTwin API.
//!
//! [`VitaTwinClient`] wires the pieces together: a durable [`TokenStore`], an
//! [`ApiClient`] that attaches the token and classifies responses, the
//! [`SessionEvents`] channel that replaces navigation on session loss, and the
//! feature clients built on top (auth, consent, wearables and the twin's
//! summary and chat).

use std::sync::Arc;

use tracing::info;

// Export modules
pub mod api;
pub mod auth;
pub mod config;
pub mod consent;
pub mod error;
pub mod events;
pub mod twin;
pub mod wearables;

#[cfg(test)]
mod tests;

pub use api::{ApiClient, HttpClient, HttpMethod, RequestOptions, ReqwestHttpClient, SimpleHttpResponse};
pub use auth::{AuthService, FileStore, KeyValueStore, MemoryStore, TokenStore};
pub use config::ClientConfig;
pub use consent::{ConsentApi, ConsentDecision, ConsentFlow, ConsentPrompt, PendingRetry, RecoveryOutcome};
pub use error::{ApiError, ApiResult, ErrorKind};
pub use events::{SessionEvent, SessionEventKind, SessionEvents};
pub use twin::{HealthSnapshot, TwinApi, TwinSummary};
pub use wearables::WearablesApi;

/// Fully wired client
#[derive(Clone)]
pub struct VitaTwinClient {
    pub config: ClientConfig,
    pub tokens: Arc<TokenStore>,
    pub events: SessionEvents,
    pub api: ApiClient,
    pub auth: AuthService,
    pub consent: ConsentApi,
    pub wearables: WearablesApi,
    pub twin: TwinApi,
}

impl VitaTwinClient {
    /// Build a client with the reqwest transport and a file-backed token store
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let http = ReqwestHttpClient::with_timeout(config.request_timeout())
            .map_err(|e| error::errors::config_invalid("request_timeout_secs", e.to_string()))?;
        let storage = Arc::new(FileStore::new(config.token_store_path.clone()));

        info!(
            api_base = %config.base_url(),
            token_store = %config.token_store_path.display(),
            "Creating VitaTwin client"
        );
        Ok(Self::with_parts(config, Arc::new(http), storage))
    }

    /// Build a client over an arbitrary transport and durable store
    pub fn with_parts(
        config: ClientConfig,
        http: Arc<dyn HttpClient>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        let tokens = Arc::new(TokenStore::new(storage));
        let events = SessionEvents::new();
        let api = ApiClient::new(&config, http, Arc::clone(&tokens), events.clone());

        Self {
            auth: AuthService::new(api.clone()),
            consent: ConsentApi::new(api.clone()),
            wearables: WearablesApi::new(api.clone()),
            twin: TwinApi::new(api.clone()),
            config,
            tokens,
            events,
            api,
        }
    }

    /// Consent flow that asks `prompt` when an operation needs consent
    pub fn consent_flow(&self, prompt: Arc<dyn ConsentPrompt>) -> ConsentFlow {
        ConsentFlow::new(self.consent.clone(), prompt)
    }
}
