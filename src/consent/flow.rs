use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info};

use crate::consent::{full_recommended_scopes, seed_scopes, ConsentApi, ConsentDecision, ConsentPrompt, PendingRetry};
use crate::error::{ApiError, ApiResult};

/// Result of an operation run under the consent convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome<T> {
    /// Succeeded on the first attempt
    Completed(T),
    /// Succeeded on the retry after a consent grant
    Retried(T),
    /// The user declined; the operation was not retried
    Declined,
}

impl<T> RecoveryOutcome<T> {
    /// The operation's value, if it ran to completion
    pub fn into_value(self) -> Option<T> {
        match self {
            RecoveryOutcome::Completed(value) | RecoveryOutcome::Retried(value) => Some(value),
            RecoveryOutcome::Declined => None,
        }
    }
}

/// Drives the prompt -> grant -> retry sequence
#[derive(Clone)]
pub struct ConsentFlow {
    consent: ConsentApi,
    prompt: Arc<dyn ConsentPrompt>,
}

impl ConsentFlow {
    pub fn new(consent: ConsentApi, prompt: Arc<dyn ConsentPrompt>) -> Self {
        Self { consent, prompt }
    }

    /// Handle a consent escalation that carried `required_scopes`.
    ///
    /// The retry runs once, and only after the server accepted the grant. A
    /// decline returns [`RecoveryOutcome::Declined`]; a failed grant returns
    /// the grant error. In both cases the retry is dropped unrun.
    pub async fn recover<T: Send + 'static>(
        &self,
        required_scopes: &[String],
        retry: PendingRetry<T>,
    ) -> ApiResult<RecoveryOutcome<T>> {
        let seeded = seed_scopes(required_scopes);

        let scopes = match self.prompt.ask(&seeded).await {
            ConsentDecision::Declined => {
                info!("Consent declined, not retrying");
                return Ok(RecoveryOutcome::Declined);
            }
            ConsentDecision::AcceptAll => full_recommended_scopes(),
            ConsentDecision::Custom(scopes) => scopes,
        };

        self.consent.grant_scopes(&scopes).await?;
        retry.invoke().await.map(RecoveryOutcome::Retried)
    }

    /// Run `action`; on a consent escalation, recover and re-run it once
    pub async fn run<T, F, Fut>(&self, action: F) -> ApiResult<RecoveryOutcome<T>>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<T>> + Send + 'static,
    {
        let action = Arc::new(action);

        match (*action)().await {
            Ok(value) => Ok(RecoveryOutcome::Completed(value)),
            Err(ApiError::ConsentRequired {
                required_scopes, ..
            }) => {
                debug!(scopes = ?required_scopes, "Operation needs consent");
                let again = Arc::clone(&action);
                let retry = PendingRetry::new(move || (*again)());
                self.recover(&required_scopes, retry).await
            }
            Err(e) => Err(e),
        }
    }
}
