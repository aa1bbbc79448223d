//! Request shaping and consent recovery over HTTP

use mockito::Matcher;
use serde_json::json;
use vitatwin_client::{
    ApiError, ConsentDecision, ErrorKind, RecoveryOutcome, RequestOptions,
};

use crate::test_harness::{client_for, FixedPrompt, TestContext};

#[tokio::test]
async fn sends_bearer_and_json_content_type() {
    let mut ctx = TestContext::new().await;
    ctx.client.tokens.set("abc123").await;

    let mock = ctx
        .server
        .mock("POST", "/wearables/connect")
        .match_header("authorization", "Bearer abc123")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"provider": "fitbit"})))
        .with_status(200)
        .with_body(r#"{"provider":"fitbit","connect_url":"https://fitbit.example/authorize"}"#)
        .expect(1)
        .create_async()
        .await;

    let connected = ctx.client.wearables.connect("fitbit").await.unwrap();

    assert_eq!(
        connected.connect_url.as_deref(),
        Some("https://fitbit.example/authorize")
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn omits_authorization_without_a_session() {
    let mut ctx = TestContext::new().await;

    let mock = ctx
        .server
        .mock("GET", "/consent")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body(r#"{"sleep_data":true,"chat_history":false}"#)
        .expect(1)
        .create_async()
        .await;

    let scopes = ctx.client.consent.list().await.unwrap();

    assert_eq!(scopes.get("sleep_data"), Some(&true));
    assert_eq!(scopes.get("chat_history"), Some(&false));
    mock.assert_async().await;
}

#[tokio::test]
async fn consent_escalation_grants_then_retries_once() {
    let mut ctx = TestContext::new().await;
    ctx.client.tokens.set("abc").await;

    let first_attempt = ctx
        .server
        .mock("POST", "/wearables/sync")
        .with_status(403)
        .with_body(
            r#"{"detail":{"error":"consent_required","required_scopes":["wearables_sync"],"message":"Consent required"}}"#,
        )
        .expect(1)
        .create_async()
        .await;
    let grant = ctx
        .server
        .mock("POST", "/consent/grant-bulk")
        .match_body(Matcher::Json(json!({"scopes": ["wearables_sync"]})))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let retry = ctx
        .server
        .mock("POST", "/wearables/sync")
        .with_status(200)
        .with_body(r#"{"provider":"fitbit","health_state":{"sleep_duration":7.5}}"#)
        .expect(1)
        .create_async()
        .await;

    let prompt = FixedPrompt::new(ConsentDecision::Custom(vec!["wearables_sync".into()]));
    let flow = ctx.client.consent_flow(prompt.clone());
    let wearables = ctx.client.wearables.clone();

    let outcome = flow
        .run(move || {
            let wearables = wearables.clone();
            async move { wearables.sync("fitbit", &[]).await }
        })
        .await
        .unwrap();

    let synced = match outcome {
        RecoveryOutcome::Retried(synced) => synced,
        other => panic!("expected retried sync, got {:?}", other),
    };
    assert_eq!(synced.health_state["sleep_duration"], 7.5);
    assert_eq!(prompt.times_asked(), 1);

    first_attempt.assert_async().await;
    grant.assert_async().await;
    retry.assert_async().await;
}

#[tokio::test]
async fn unrelated_forbidden_is_left_to_the_caller() {
    let mut ctx = TestContext::new().await;

    let mock = ctx
        .server
        .mock("GET", "/admin")
        .with_status(403)
        .with_body(r#"{"detail":"Not enough privileges"}"#)
        .create_async()
        .await;

    let response = ctx
        .client
        .api
        .fetch("/admin", RequestOptions::get())
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    assert!(ctx.client.tokens.get().await.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    // Nothing listens on port 1
    let dir = tempfile::tempdir().unwrap();
    let client = client_for("http://127.0.0.1:1", &dir.path().join("vitatwin.secure.json"));

    let err = client
        .api
        .fetch("/wearables/status", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Network { .. }));
    assert_eq!(err.kind(), ErrorKind::Other);
}
