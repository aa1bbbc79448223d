//! Session lifecycle across the real transport and token file

use mockito::Matcher;
use serde_json::json;
use vitatwin_client::{ApiError, RequestOptions, SessionEventKind};

use crate::test_harness::TestContext;

#[tokio::test]
async fn login_persists_token_across_restart() {
    let mut ctx = TestContext::new().await;

    let login = ctx
        .server
        .mock("POST", "/auth/login")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::PartialJson(
            json!({"email": "ada@example.com", "password": "hunter2"}),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"persisted-token","token_type":"bearer"}"#)
        .expect(1)
        .create_async()
        .await;

    let status = ctx
        .server
        .mock("GET", "/wearables/status")
        .match_header("authorization", "Bearer persisted-token")
        .with_status(200)
        .with_body("[]")
        .expect(1)
        .create_async()
        .await;

    ctx.client
        .auth
        .login("ada@example.com", "hunter2")
        .await
        .unwrap();
    assert_eq!(ctx.stored_entries()["vt_access_token"], "persisted-token");

    let restarted = ctx.restarted_client();
    assert!(restarted.auth.is_authenticated().await);
    let providers = restarted.wearables.status().await.unwrap();
    assert!(providers.is_empty());

    login.assert_async().await;
    status.assert_async().await;
}

#[tokio::test]
async fn unauthorized_response_wipes_durable_token() {
    let mut ctx = TestContext::new().await;
    ctx.client.tokens.set("expired").await;
    let mut events = ctx.client.events.subscribe();

    let chats = ctx
        .server
        .mock("GET", "/chats")
        .match_header("authorization", "Bearer expired")
        .with_status(401)
        .with_body(r#"{"detail":"Token expired"}"#)
        .expect(1)
        .create_async()
        .await;

    let err = ctx
        .client
        .api
        .fetch("/chats", RequestOptions::get())
        .await
        .unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert_eq!(ctx.client.tokens.get().await, None);
    assert_eq!(ctx.restarted_client().tokens.get().await, None);
    assert!(ctx.stored_entries().get("vt_access_token").is_none());

    let event = events.try_recv().unwrap();
    assert!(event.is_invalidation());
    assert_eq!(
        event.kind,
        SessionEventKind::Invalidated {
            redirect_to: "/".into()
        }
    );

    chats.assert_async().await;
}

#[tokio::test]
async fn logout_clears_even_when_server_errors() {
    let mut ctx = TestContext::new().await;
    ctx.client.tokens.set("abc").await;

    let logout = ctx
        .server
        .mock("POST", "/auth/logout")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    ctx.client.auth.logout().await;

    assert!(!ctx.client.auth.is_authenticated().await);
    assert!(!ctx.restarted_client().auth.is_authenticated().await);
    logout.assert_async().await;
}
