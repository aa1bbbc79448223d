//! Consent collection and the recovery convention for consent escalations.
//!
//! Call sites that can hit a consent escalation go through
//! [`ConsentFlow::run`] (or catch [`ApiError::ConsentRequired`] themselves and
//! call [`ConsentFlow::recover`]). The flow seeds a [`ConsentPrompt`] with the
//! required scopes, grants what the user picked, and only then re-runs the
//! original operation, once.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::api::ApiClient;
use crate::error::{errors, ApiError, ApiResult};

pub mod flow;
pub mod retry;

pub use flow::{ConsentFlow, RecoveryOutcome};
pub use retry::PendingRetry;

/// Everything the product recommends granting in one go
pub const FULL_RECOMMENDED_SCOPES: [&str; 7] = [
    "wearables_connect",
    "wearables_sync",
    "chat_history",
    "memory_personalization",
    "steps_activity_data",
    "heart_rate_data",
    "sleep_data",
];

pub fn full_recommended_scopes() -> Vec<String> {
    FULL_RECOMMENDED_SCOPES.iter().map(|s| s.to_string()).collect()
}

/// Scopes to pre-select in the prompt: the required ones without duplicates,
/// or the full recommended set when the server named none.
pub fn seed_scopes(required_scopes: &[String]) -> Vec<String> {
    if required_scopes.is_empty() {
        return full_recommended_scopes();
    }

    let mut seen = HashSet::new();
    required_scopes
        .iter()
        .filter(|scope| seen.insert(scope.as_str()))
        .cloned()
        .collect()
}

/// What the user chose in the consent prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentDecision {
    /// Rejected or closed the prompt
    Declined,
    /// Granted the full recommended set
    AcceptAll,
    /// Granted exactly these scopes
    Custom(Vec<String>),
}

/// The consent-collection UI
#[async_trait]
pub trait ConsentPrompt: Send + Sync {
    /// Ask the user about `scopes` (never empty)
    async fn ask(&self, scopes: &[String]) -> ConsentDecision;
}

#[derive(Serialize)]
struct GrantRequest<'a> {
    scopes: &'a [String],
}

/// Server-side consent endpoints
#[derive(Clone)]
pub struct ConsentApi {
    api: ApiClient,
}

impl ConsentApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Grant `scopes` in one request
    pub async fn grant_scopes(&self, scopes: &[String]) -> ApiResult<()> {
        if scopes.is_empty() {
            return Err(ApiError::Validation(
                "Select at least one option to continue.".into(),
            ));
        }

        let response = self
            .api
            .post_json("/consent/grant-bulk", &GrantRequest { scopes })
            .await?;
        if !response.is_success() {
            return Err(errors::http_failure(
                response.status(),
                format!("Consent update failed ({})", response.status()),
            ));
        }

        info!(scopes = ?scopes, "Consent granted");
        Ok(())
    }

    /// Current scope -> granted map
    pub async fn list(&self) -> ApiResult<BTreeMap<String, bool>> {
        self.api.get_json("/consent").await
    }
}
