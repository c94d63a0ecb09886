//! Integration tests for the HTTP identity backend
//!
//! Exercises the auth endpoints and the row API against a mock server:
//! status-to-taxonomy mapping, duplicate-signup detection, and the filtered
//! claim/delete guards.

use stayport_core::{IdentityBackend, InsertOutcome, SignUpMetadata, SignUpOutcome};
use stayport_domain::{AuthError, AuthEvent, UserRole};
use stayport_infra::{BackendConfig, HttpIdentityBackend};
use wiremock::matchers::{body_json_string, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> HttpIdentityBackend {
    HttpIdentityBackend::new(BackendConfig {
        base_url: server.uri(),
        api_key: "test-anon-key".into(),
    })
}

fn token_grant_body(user_id: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": format!("access-{user_id}"),
        "refresh_token": format!("refresh-{user_id}"),
        "expires_in": 3600,
        "token_type": "bearer",
        "user": { "id": user_id, "email": "hotel@example.com" }
    })
}

fn profile_row(user_id: &str, role: &str) -> serde_json::Value {
    serde_json::json!({
        "id": user_id,
        "email": "hotel@example.com",
        "role": role,
        "full_name": "Grand Hotel",
        "phone": null,
        "avatar_url": null,
        "status": "ACTIVE",
        "language": "en",
        "created_at": "2026-01-10T09:00:00Z",
        "updated_at": "2026-01-10T09:00:00Z"
    })
}

#[tokio::test]
async fn sign_in_parses_the_session_and_emits_an_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_grant_body("user-1")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut events = backend.subscribe();

    let outcome = backend
        .sign_in_with_password("hotel@example.com", "secret")
        .await
        .expect("sign in");

    assert_eq!(outcome.user_id, "user-1");
    assert_eq!(outcome.session.access_token, "access-user-1");
    assert!(outcome.session.expires_at.is_some());
    assert_eq!(backend.get_session().await, Some(outcome.session.clone()));

    match events.try_recv().expect("event emitted") {
        AuthEvent::SignedIn { user_id, .. } => assert_eq!(user_id, "user-1"),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn auth_failures_map_to_the_taxonomy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend.sign_in_with_password("a@b.c", "wrong").await.expect_err("rejected");
    assert_eq!(err, AuthError::InvalidCredentials);
    assert!(backend.get_session().await.is_none());
}

#[tokio::test]
async fn rate_limited_sign_in_is_reported_as_such() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "msg": "Rate limit exceeded"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let err = backend.sign_in_with_password("a@b.c", "pw").await.expect_err("limited");
    assert_eq!(err, AuthError::RateLimit);
}

#[tokio::test]
async fn duplicate_signup_is_a_typed_outcome_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "code": 422,
            "error_code": "user_already_exists",
            "msg": "User already registered"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let outcome = backend
        .sign_up("ext@identities.test", "secret", SignUpMetadata::default())
        .await
        .expect("typed outcome");
    assert_eq!(outcome, SignUpOutcome::AlreadyExists);
}

#[tokio::test]
async fn signup_metadata_reaches_the_wire() {
    let server = MockServer::start().await;
    let expected = serde_json::json!({
        "email": "ext@identities.test",
        "password": "secret",
        "data": {
            "role": "STAFF",
            "full_name": "Chat Nickname",
            "external_id": "U100",
            "invite_record_id": "invite-1"
        }
    });
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(body_json_string(expected.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_grant_body("user-2")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let outcome = backend
        .sign_up(
            "ext@identities.test",
            "secret",
            SignUpMetadata {
                role: Some(UserRole::Staff),
                full_name: Some("Chat Nickname".into()),
                external_id: Some("U100".into()),
                invite_record_id: Some("invite-1".into()),
            },
        )
        .await
        .expect("sign up");
    assert!(matches!(outcome, SignUpOutcome::Created(_)));
}

#[tokio::test]
async fn fetch_profile_reads_the_filtered_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("id", "eq.user-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!([profile_row("user-1", "HOTEL")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let profile = backend.fetch_profile("user-1").await.expect("fetch").expect("row present");
    assert_eq!(profile.id, "user-1");
    assert_eq!(profile.role, UserRole::Hotel);
}

#[tokio::test]
async fn missing_profile_row_is_none_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    assert!(backend.fetch_profile("ghost").await.expect("fetch").is_none());
}

#[tokio::test]
async fn insert_conflict_reports_a_duplicate_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/profiles"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let profile: stayport_domain::Profile =
        serde_json::from_value(profile_row("user-1", "HOTEL")).expect("fixture");
    let outcome = backend.insert_profile(&profile).await.expect("typed outcome");
    assert_eq!(outcome, InsertOutcome::DuplicateKey);
}

#[tokio::test]
async fn claim_invite_only_touches_unclaimed_rows() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/staff_invites"))
        .and(query_param("id", "eq.invite-1"))
        .and(query_param("owner_ref", "is.null"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
            "id": "invite-1",
            "name": "Sato Yuki",
            "external_id": null,
            "owner_ref": "user-1",
            "created_at": "2026-01-10T09:00:00Z"
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    assert!(backend.claim_invite("invite-1", "user-1").await.expect("claim"));
}

#[tokio::test]
async fn losing_a_claim_race_returns_false() {
    let server = MockServer::start().await;
    // The filtered PATCH matches no rows once someone else claimed it.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/staff_invites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    assert!(!backend.claim_invite("invite-1", "user-2").await.expect("claim"));
}

#[tokio::test]
async fn delete_invite_is_ownership_scoped() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/staff_invites"))
        .and(query_param("id", "eq.auto-1"))
        .and(query_param("owner_ref", "eq.user-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    backend.delete_invite("auto-1", "user-1").await.expect("delete");
}

#[tokio::test]
async fn sign_out_clears_the_local_scope_even_when_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_grant_body("user-1")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "msg": "internal error"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    backend.sign_in_with_password("hotel@example.com", "secret").await.expect("sign in");

    let err = backend.sign_out().await.expect_err("backend rejected");
    assert!(matches!(err, AuthError::Backend(_)));
    assert!(backend.get_session().await.is_none(), "local scope dropped regardless");
}

#[tokio::test]
async fn refresh_failure_emits_the_refresh_failed_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let mut events = backend.subscribe();

    backend.refresh_session("stale-token").await.expect_err("refresh rejected");
    assert_eq!(events.try_recv().expect("event"), AuthEvent::TokenRefreshFailed);
}
