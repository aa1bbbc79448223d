//! Tests for the consent recovery convention

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use super::{mock_client, url, ScriptedPrompt};
use crate::api::RequestOptions;
use crate::consent::{ConsentDecision, PendingRetry, RecoveryOutcome, FULL_RECOMMENDED_SCOPES};
use crate::error::{ApiError, ErrorKind};
use crate::VitaTwinClient;

const CONSENT_BODY: &str = r#"{"detail":{"error":"consent_required","required_scopes":["wearables_sync","sleep_data","wearables_sync"],"message":"Please grant consent to continue."}}"#;

/// Action that fetches `/wearables/sync` and counts its attempts
fn counting_sync(
    client: &VitaTwinClient,
    attempts: &Arc<AtomicUsize>,
) -> impl Fn() -> BoxFuture<'static, crate::ApiResult<u16>> + Send + Sync + 'static {
    let api = client.api.clone();
    let attempts = Arc::clone(attempts);
    move || {
        let api = api.clone();
        let attempts = Arc::clone(&attempts);
        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            let response = api
                .fetch("/wearables/sync", RequestOptions::post().body("{}"))
                .await?;
            Ok::<_, ApiError>(response.status())
        }
        .boxed()
    }
}

fn granted_scopes(http: &crate::api::http_client::mock::MockHttpClient) -> Vec<Vec<String>> {
    http.requests_to(&url("/consent/grant-bulk"))
        .into_iter()
        .map(|request| {
            let body: serde_json::Value =
                serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
            serde_json::from_value(body["scopes"].clone()).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_grant_then_retry_once() {
    let (client, http) = mock_client();
    http.mock_response(url("/wearables/sync"), 403, CONSENT_BODY);
    http.mock_response(url("/wearables/sync"), 200, "{}");
    http.mock_response(url("/consent/grant-bulk"), 200, "{}");

    let prompt = ScriptedPrompt::new(ConsentDecision::Custom(vec![
        "wearables_sync".to_string(),
        "sleep_data".to_string(),
    ]));
    let flow = client.consent_flow(prompt.clone());
    let attempts = Arc::new(AtomicUsize::new(0));

    let outcome = flow.run(counting_sync(&client, &attempts)).await.unwrap();

    assert_eq!(outcome, RecoveryOutcome::Retried(200));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    // The prompt saw the required scopes once each, in order
    assert_eq!(prompt.shown(), vec![vec!["wearables_sync", "sleep_data"]]);
    assert_eq!(granted_scopes(&http), vec![vec!["wearables_sync", "sleep_data"]]);
}

#[tokio::test]
async fn test_empty_scope_list_seeds_recommended_defaults() {
    let (client, http) = mock_client();
    http.mock_response(url("/wearables/sync"), 403, r#"{"code":"consent_required"}"#);
    http.mock_response(url("/wearables/sync"), 200, "{}");
    http.mock_response(url("/consent/grant-bulk"), 200, "{}");

    let prompt = ScriptedPrompt::new(ConsentDecision::AcceptAll);
    let flow = client.consent_flow(prompt.clone());
    let attempts = Arc::new(AtomicUsize::new(0));

    flow.run(counting_sync(&client, &attempts)).await.unwrap();

    let shown = prompt.shown();
    assert_eq!(shown.len(), 1);
    assert!(!shown[0].is_empty());
    assert_eq!(shown[0], FULL_RECOMMENDED_SCOPES.to_vec());
    assert_eq!(granted_scopes(&http), vec![FULL_RECOMMENDED_SCOPES.to_vec()]);
}

#[tokio::test]
async fn test_decline_never_grants_or_retries() {
    let (client, http) = mock_client();
    http.mock_response(url("/wearables/sync"), 403, CONSENT_BODY);

    let flow = client.consent_flow(ScriptedPrompt::new(ConsentDecision::Declined));
    let attempts = Arc::new(AtomicUsize::new(0));

    let outcome = flow.run(counting_sync(&client, &attempts)).await.unwrap();

    assert_eq!(outcome, RecoveryOutcome::Declined);
    assert_eq!(outcome.into_value(), None);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(http.requests_to(&url("/consent/grant-bulk")).is_empty());
}

#[tokio::test]
async fn test_failed_grant_surfaces_message_and_skips_retry() {
    let (client, http) = mock_client();
    http.mock_response(url("/wearables/sync"), 403, CONSENT_BODY);
    http.mock_response(url("/consent/grant-bulk"), 500, "oops");

    let flow = client.consent_flow(ScriptedPrompt::new(ConsentDecision::AcceptAll));
    let attempts = Arc::new(AtomicUsize::new(0));

    let err = flow.run(counting_sync(&client, &attempts)).await.unwrap_err();

    assert_eq!(err.to_string(), "Consent update failed (500)");
    assert_eq!(err.kind(), ErrorKind::Other);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_custom_choice_is_rejected_locally() {
    let (client, http) = mock_client();
    http.mock_response(url("/wearables/sync"), 403, CONSENT_BODY);

    let flow = client.consent_flow(ScriptedPrompt::new(ConsentDecision::Custom(vec![])));
    let attempts = Arc::new(AtomicUsize::new(0));

    let err = flow.run(counting_sync(&client, &attempts)).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Validation("Select at least one option to continue.".into())
    );
    assert!(http.requests_to(&url("/consent/grant-bulk")).is_empty());
}

#[tokio::test]
async fn test_second_escalation_after_grant_is_not_looped() {
    let (client, http) = mock_client();
    http.mock_response(url("/wearables/sync"), 403, CONSENT_BODY);
    http.mock_response(url("/consent/grant-bulk"), 200, "{}");

    let prompt = ScriptedPrompt::new(ConsentDecision::AcceptAll);
    let flow = client.consent_flow(prompt.clone());
    let attempts = Arc::new(AtomicUsize::new(0));

    let err = flow.run(counting_sync(&client, &attempts)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConsentRequired);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(prompt.shown().len(), 1);
}

#[tokio::test]
async fn test_success_and_unauthorized_bypass_the_prompt() {
    let (client, http) = mock_client();
    http.mock_response(url("/wearables/sync"), 200, "{}");
    let prompt = ScriptedPrompt::new(ConsentDecision::AcceptAll);
    let flow = client.consent_flow(prompt.clone());
    let attempts = Arc::new(AtomicUsize::new(0));

    let outcome = flow.run(counting_sync(&client, &attempts)).await.unwrap();
    assert_eq!(outcome, RecoveryOutcome::Completed(200));

    let (client, http) = mock_client();
    http.mock_response(url("/wearables/sync"), 401, "");
    let flow = client.consent_flow(prompt.clone());

    let err = flow.run(counting_sync(&client, &attempts)).await.unwrap_err();
    assert_eq!(err, ApiError::Unauthorized);
    assert!(prompt.shown().is_empty());
}

#[tokio::test]
async fn test_recover_with_caller_supplied_retry() {
    let (client, http) = mock_client();
    http.mock_response(url("/consent/grant-bulk"), 200, "{}");
    let flow = client.consent_flow(ScriptedPrompt::new(ConsentDecision::AcceptAll));

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let retry = PendingRetry::new(move || async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok("reloaded")
    });

    let outcome = flow
        .recover(&["chat_history".to_string()], retry)
        .await
        .unwrap();

    assert_eq!(outcome, RecoveryOutcome::Retried("reloaded"));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
