//! Session lifecycle against a mock GraphQL server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use sigil_client::{Profile, RetryPolicy, SignInInput, SignUpInput, UserId};
use sigil_session::{
    CachedResult, FetchPolicy, LogoutOutcome, QueryKey, SessionContext, SessionError,
    SessionEvent, SessionState, SignOutReason, Tier, UnavailableStore,
};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn context(server: &MockServer, dir: &TempDir) -> SessionContext {
    SessionContext::builder()
        .base_url(server.uri())
        .data_dir(dir.path())
        .retry(RetryPolicy::none())
        .build()
        .unwrap()
}

fn user_a() -> Profile {
    Profile::new(UserId::Int(1), "A")
}

async fn mount_sign_in(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "SignIn"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"signIn": {"accessToken": token, "user": {"id": 1, "name": "A"}}}
        })))
        .mount(server)
        .await;
}

async fn operations_received(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter_map(|r| serde_json::from_slice::<Value>(&r.body).ok())
        .filter_map(|body| body["operationName"].as_str().map(String::from))
        .collect()
}

#[tokio::test]
async fn test_sign_in_stores_token_and_profile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "SignIn",
            "variables": {"input": {"username": "a@b.com", "password": "x"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"signIn": {"accessToken": "tok1", "user": {"id": 1, "name": "A"}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    let manager = ctx.manager();
    let mut events = manager.subscribe();

    let profile = manager
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap();

    assert_eq!(profile, Some(user_a()));
    assert!(manager.has_session());
    assert_eq!(manager.state(), SessionState::Authenticated);
    assert_eq!(manager.current_profile(), Some(user_a()));
    assert_eq!(
        manager.headers().get("authorization").map(String::as_str),
        Some("tok1")
    );
    assert_eq!(ctx.tokens().active_tier(), Some(Tier::Durable));
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignedIn {
            profile: Some(user_a())
        }
    );
}

#[tokio::test]
async fn test_failed_sign_in_stores_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "Invalid credentials", "extensions": {"code": "BAD_USER_INPUT"}}]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);

    let err = ctx
        .manager()
        .sign_in(&SignInInput::new("a@b.com", "wrong"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Remote(_)));
    assert_eq!(err.user_message(), "Invalid credentials");
    assert!(!ctx.manager().has_session());
    assert_eq!(ctx.manager().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_sign_in_without_token_is_missing_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"signIn": {"accessToken": null, "user": {"id": 1, "name": "A"}}}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);

    let err = ctx
        .manager()
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::MissingToken));
    assert!(!ctx.manager().has_session());
    assert!(ctx.manager().current_profile().is_none());
}

#[tokio::test]
async fn test_sign_up_starts_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "operationName": "SignUp",
            "variables": {"input": {"email": "a@b.com", "username": "a", "password": "x"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"signUp": {"accessToken": "tok1", "user": {"id": "u-1", "username": "a"}}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);

    let profile = ctx
        .manager()
        .sign_up(&SignUpInput::new("a@b.com", "a", "x"), false)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(profile.id, UserId::Str("u-1".to_string()));
    assert_eq!(ctx.tokens().active_tier(), Some(Tier::Ephemeral));
    assert_eq!(ctx.manager().current_profile(), Some(profile));
}

#[tokio::test]
async fn test_logout_clears_even_when_remote_fails() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "Logout"})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    let manager = ctx.manager();
    manager
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap();
    ctx.cache()
        .put(&sigil_client::AuthApi::me_request(), CachedResult::Data(json!({"me": null})))
        .await;
    let mut events = manager.subscribe();

    let outcome = manager.logout().await.unwrap();

    assert_eq!(outcome, LogoutOutcome::LocalOnly);
    assert!(!manager.has_session());
    assert!(ctx.cache().is_empty().await);
    assert_eq!(manager.state(), SessionState::Anonymous);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignedOut {
            reason: SignOutReason::Logout
        }
    );
}

#[tokio::test]
async fn test_logout_confirmed() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "Logout"})))
        .and(header("authorization", "tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"logout": {"success": true}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    ctx.manager()
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap();

    assert_eq!(ctx.manager().logout().await.unwrap(), LogoutOutcome::Confirmed);
    assert!(!ctx.manager().has_session());

    // Logging out again is harmless
    ctx.manager().logout().await.unwrap();
    assert!(!ctx.manager().has_session());
}

#[tokio::test]
async fn test_unauthenticated_response_tears_down_without_logout_call() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "Me"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{"message": "jwt expired", "extensions": {"code": "UNAUTHENTICATED"}}]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    let manager = ctx.manager();
    manager
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap();
    ctx.cache()
        .put(
            &sigil_client::GraphQLRequest::new("Items", "query Items { items { id } }"),
            CachedResult::Data(json!({"items": []})),
        )
        .await;
    let mut events = manager.subscribe();

    let err = manager.me(FetchPolicy::NetworkOnly).await.unwrap_err();

    assert!(matches!(err, SessionError::Unauthenticated(ref m) if m == "jwt expired"));
    assert!(!manager.has_session());
    assert!(manager.current_profile().is_none());
    assert!(ctx.cache().is_empty().await);
    assert_eq!(manager.state(), SessionState::Anonymous);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignedOut {
            reason: SignOutReason::Unauthenticated
        }
    );
    assert!(!operations_received(&server).await.contains(&"Logout".to_string()));
}

#[tokio::test]
async fn test_identity_queries_refetched_with_new_token() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "Me"})))
        .and(header("authorization", "tok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"me": {"id": 1, "name": "A"}}
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "Me"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"me": null}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    let manager = ctx.manager();

    // Anonymous identity lands in the cache first
    assert!(manager.me(FetchPolicy::CacheFirst).await.unwrap().is_none());

    manager
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap();

    // The refetch ran after the token was stored
    assert_eq!(manager.me(FetchPolicy::CacheOnly).await.unwrap(), Some(user_a()));
    assert_eq!(operations_received(&server).await, ["Me", "SignIn", "Me"]);
}

#[tokio::test]
async fn test_refetch_failure_does_not_roll_back_sign_in() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "Me"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{"message": "resolver exploded"}]
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    ctx.cache()
        .put(&sigil_client::AuthApi::me_request(), CachedResult::Data(json!({"me": null})))
        .await;

    ctx.manager()
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap();

    assert!(ctx.manager().has_session());
    let key = QueryKey::for_request(&sigil_client::AuthApi::me_request());
    assert_eq!(
        ctx.cache().peek(&key).await,
        Some(CachedResult::Error("resolver exploded".to_string()))
    );
}

#[tokio::test]
async fn test_overlapping_operations_are_busy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({
                    "data": {"signIn": {"accessToken": "tok1", "user": {"id": 1, "name": "A"}}}
                }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    let manager = ctx.manager();
    let input = SignInInput::new("a@b.com", "x");

    let (first, second) = tokio::join!(manager.sign_in(&input, true), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.logout().await
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(SessionError::Busy)));
    assert!(manager.has_session());
}

#[tokio::test]
async fn test_durable_session_survives_restart() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    let dir = tempfile::tempdir().unwrap();

    {
        let ctx = context(&server, &dir);
        ctx.manager()
            .sign_in(&SignInInput::new("a@b.com", "x"), true)
            .await
            .unwrap();
        ctx.end_session();
    }

    let restarted = context(&server, &dir);
    assert!(restarted.manager().has_session());
    assert_eq!(restarted.manager().state(), SessionState::Authenticated);
    assert_eq!(restarted.manager().current_profile(), Some(user_a()));
}

#[tokio::test]
async fn test_ephemeral_session_ends_with_host_session() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);

    ctx.manager()
        .sign_in(&SignInInput::new("a@b.com", "x"), false)
        .await
        .unwrap();
    assert_eq!(ctx.tokens().active_tier(), Some(Tier::Ephemeral));

    ctx.end_session();
    assert!(!ctx.manager().has_session());
    assert!(!context(&server, &dir).manager().has_session());

    let mut events = ctx.manager().subscribe();
    assert!(!ctx.manager().require_session().await);
    assert_eq!(
        events.recv().await.unwrap(),
        SessionEvent::SignedOut {
            reason: SignOutReason::LoginRequired
        }
    );
    assert_eq!(events.recv().await.unwrap(), SessionEvent::LoginRequired);
}

#[tokio::test]
async fn test_switching_tiers_drops_previous_token() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    let input = SignInInput::new("a@b.com", "x");

    ctx.manager().sign_in(&input, true).await.unwrap();
    ctx.manager().sign_in(&input, false).await.unwrap();
    ctx.end_session();

    // The remembered token did not outlive the non-remembered sign-in
    assert!(!ctx.manager().has_session());
    assert!(!context(&server, &dir).manager().has_session());
}

#[tokio::test]
async fn test_refused_storage_leaves_no_session() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;

    let ctx = SessionContext::builder()
        .base_url(server.uri())
        .durable(Arc::new(UnavailableStore))
        .retry(RetryPolicy::none())
        .build()
        .unwrap();

    let err = ctx
        .manager()
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Storage(_)));
    assert!(!ctx.manager().has_session());
    assert_eq!(ctx.manager().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn test_logout_during_query_leaves_cache_empty() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "Me"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"me": {"id": 1, "name": "A"}}}))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({"operationName": "Logout"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"logout": {"success": true}}
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let ctx = context(&server, &dir);
    let manager = ctx.manager();
    manager
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap();

    let (me, logout) = tokio::join!(manager.me(FetchPolicy::NetworkOnly), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.logout().await
    });

    assert_eq!(me.unwrap(), Some(user_a()));
    assert_eq!(logout.unwrap(), LogoutOutcome::Confirmed);
    assert!(!manager.has_session());
    assert!(ctx.cache().is_empty().await);
    assert_eq!(manager.me(FetchPolicy::CacheOnly).await.unwrap(), None);
}

#[tokio::test]
async fn test_corrupt_credentials_file_does_not_block_sign_in() {
    let server = MockServer::start().await;
    mount_sign_in(&server, "tok1").await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("credentials.json"), "{truncated").unwrap();

    let ctx = context(&server, &dir);
    assert!(!ctx.manager().has_session());

    ctx.manager()
        .sign_in(&SignInInput::new("a@b.com", "x"), true)
        .await
        .unwrap();
    assert_eq!(ctx.tokens().active_tier(), Some(Tier::Durable));
    ctx.end_session();

    let restarted = context(&server, &dir);
    assert!(restarted.manager().has_session());
    assert_eq!(restarted.manager().current_profile(), Some(user_a()));
}
