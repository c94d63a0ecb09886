//! Integration tests for the application surface
//!
//! Wires the composition root around the in-memory backend and drives the
//! handle the way a UI shell would: bootstrap, login, role predicates,
//! event forwarding, and the external-identity path.

use std::sync::Arc;
use std::time::Duration;

use stayport_app::{AppContext, BackendSettings, Tenant, TenantConfig};
use stayport_core::testing::{invite_fixture, profile_fixture, MockIdentityBackend};
use stayport_domain::{AuthEvent, Credentials, LinkRequest, UserRole};
use tempfile::TempDir;

fn tenant_config(tenant: Tenant, storage_dir: &TempDir) -> TenantConfig {
    TenantConfig {
        tenant,
        backend: BackendSettings {
            base_url: "http://localhost:0".into(),
            api_key: "test-key".into(),
            link_pepper: "test-pepper".into(),
            link_email_domain: "identities.stayport.test".into(),
        },
        storage_dir: storage_dir.path().to_path_buf(),
        login_path: "/login".into(),
    }
}

fn build(tenant: Tenant) -> (Arc<AppContext>, Arc<MockIdentityBackend>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let backend = Arc::new(MockIdentityBackend::new());
    let ctx = AppContext::build_with_backend(tenant_config(tenant, &dir), backend.clone());
    (ctx, backend, dir)
}

#[tokio::test]
async fn handle_drives_a_full_login_cycle() {
    let (ctx, backend, _dir) = build(Tenant::Hotel);
    backend.add_account("hotel@example.com", "secret", "user-1");
    backend.add_profile(profile_fixture("user-1", UserRole::Hotel));

    let _listener = ctx.initialize().await;
    let handle = ctx.auth_handle();
    assert!(!handle.current().is_authenticated);

    let profile = handle
        .login(Credentials {
            email: "hotel@example.com".into(),
            password: "secret".into(),
            remember_me: true,
        })
        .await
        .expect("login");
    assert_eq!(profile.id, "user-1");

    assert!(handle.has_role(UserRole::Hotel));
    assert!(!handle.has_role(UserRole::Admin));
    assert!(handle.has_any_role(&[UserRole::Admin, UserRole::Hotel]));

    handle.logout().await;
    assert!(!handle.current().is_authenticated);
}

#[tokio::test]
async fn backend_events_are_forwarded_in_order() {
    let (ctx, backend, _dir) = build(Tenant::Hotel);
    backend.add_account("hotel@example.com", "secret", "user-1");
    backend.add_profile(profile_fixture("user-1", UserRole::Hotel));

    let _listener = ctx.initialize().await;
    let handle = ctx.auth_handle();
    handle
        .login(Credentials {
            email: "hotel@example.com".into(),
            password: "secret".into(),
            remember_me: true,
        })
        .await
        .expect("login");

    // An out-of-band sign-out (another tab) must unauthenticate this shell.
    backend.emit(AuthEvent::SignedOut);

    let mut rx = handle.state();
    tokio::time::timeout(Duration::from_secs(1), async {
        while rx.borrow_and_update().is_authenticated {
            rx.changed().await.expect("state channel open");
        }
    })
    .await
    .expect("sign-out propagated");

    assert!(!handle.current().is_authenticated);
}

#[tokio::test]
async fn external_identity_login_flows_through_the_handle() {
    let (ctx, backend, _dir) = build(Tenant::Staff);
    backend.add_invite(invite_fixture("invite-1", "Sato Yuki"));

    let _listener = ctx.initialize().await;
    let handle = ctx.auth_handle();

    let profile = handle
        .login_with_external_identity(
            &LinkRequest {
                external_id: "U100".into(),
                display_name: "Chat Nickname".into(),
                picture_url: None,
                invite_record_id: Some("invite-1".into()),
            },
            true,
        )
        .await
        .expect("external login");

    assert_eq!(profile.full_name, "Sato Yuki");
    assert_eq!(profile.role, UserRole::Staff);
    assert!(handle.current().is_authenticated);
}

#[tokio::test]
async fn wrong_tenant_rejects_the_login() {
    let (ctx, backend, _dir) = build(Tenant::Admin);
    backend.add_account("hotel@example.com", "secret", "user-1");
    backend.add_profile(profile_fixture("user-1", UserRole::Hotel));

    let _listener = ctx.initialize().await;
    let handle = ctx.auth_handle();

    let err = handle
        .login(Credentials {
            email: "hotel@example.com".into(),
            password: "secret".into(),
            remember_me: true,
        })
        .await
        .expect_err("hotel profile in the admin shell");
    assert_eq!(err.to_string(), "invalid role for this application");
    assert!(!handle.current().is_authenticated);
}

#[tokio::test]
async fn shutdown_hook_is_skipped_in_debug_builds() {
    let (ctx, backend, _dir) = build(Tenant::Customer);
    backend.add_account("guest@example.com", "secret", "user-1");
    backend.add_profile(profile_fixture("user-1", UserRole::Customer));

    let _listener = ctx.initialize().await;
    let handle = ctx.auth_handle();
    handle
        .login(Credentials {
            email: "guest@example.com".into(),
            password: "secret".into(),
            remember_me: false,
        })
        .await
        .expect("login");

    ctx.on_shutdown();

    // Tests compile with debug assertions: the dev carve-out leaves the
    // session alone so hot-reload loops do not log developers out. The
    // enforcement itself is covered in the core policy tests.
    assert!(ctx.store.read().is_some());
}

#[tokio::test]
async fn sessions_survive_a_context_rebuild() {
    let dir = TempDir::new().expect("temp dir");
    let backend = Arc::new(MockIdentityBackend::new());
    backend.add_account("guest@example.com", "secret", "user-1");
    backend.add_profile(profile_fixture("user-1", UserRole::Customer));

    {
        let ctx =
            AppContext::build_with_backend(tenant_config(Tenant::Customer, &dir), backend.clone());
        let _listener = ctx.initialize().await;
        ctx.auth_handle()
            .login(Credentials {
                email: "guest@example.com".into(),
                password: "secret".into(),
                remember_me: true,
            })
            .await
            .expect("login");
    }

    // A fresh context over the same storage dir (an app restart) hydrates
    // from the cached profile without a fetch.
    let fetches_before = backend.fetch_profile_calls();
    let ctx = AppContext::build_with_backend(tenant_config(Tenant::Customer, &dir), backend.clone());
    let _listener = ctx.initialize().await;

    assert!(ctx.machine.current().is_authenticated);
    assert_eq!(backend.fetch_profile_calls(), fetches_before);
}
