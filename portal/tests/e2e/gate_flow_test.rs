//! セッションゲートE2Eテスト
//!
//! 未ログイン・ロール不足・ログイン済みのリダイレクトと、依存先障害時に閉じる挙動を確認する。

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use fritz_portal::api;
use fritz_portal::auth::session::{IdentityResolver, Resolution};
use fritz_portal::store::ProfileStore;
use fritz_portal_common::auth::{Profile, ProfileUpdate, Role};
use fritz_portal_common::error::{PortalError, PortalResult};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

use crate::support::{self, build_app, create_user, get, json_request, location, session_cookie};

struct FailingResolver;

#[async_trait]
impl IdentityResolver for FailingResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> PortalResult<Resolution> {
        Err(PortalError::Database("session store unavailable".to_string()))
    }
}

struct FailingProfiles;

#[async_trait]
impl ProfileStore for FailingProfiles {
    async fn get_profile(&self, _id: Uuid) -> PortalResult<Option<Profile>> {
        Err(PortalError::Database("profile store unavailable".to_string()))
    }

    async fn update_profile(&self, _id: Uuid, _update: &ProfileUpdate) -> PortalResult<Profile> {
        Err(PortalError::Database("profile store unavailable".to_string()))
    }

    async fn set_role(&self, _id: Uuid, _role: Role) -> PortalResult<Profile> {
        Err(PortalError::Database("profile store unavailable".to_string()))
    }

    async fn list_profiles(&self) -> PortalResult<Vec<Profile>> {
        Err(PortalError::Database("profile store unavailable".to_string()))
    }

    async fn staff_emails(&self) -> PortalResult<Vec<String>> {
        Err(PortalError::Database("profile store unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_unauthenticated_portal_request_redirects_to_login() {
    let (app, _pool) = build_app().await;

    let response = app.oneshot(get("/portal/tickets/42", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?redirect=/portal/tickets/42");
}

#[tokio::test]
async fn test_unauthenticated_unknown_admin_path_still_redirects() {
    let (app, _pool) = build_app().await;

    let response = app.oneshot(get("/admin/does-not-exist", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?redirect=/admin/does-not-exist");
}

#[tokio::test]
async fn test_public_paths_pass_without_session() {
    let (app, _pool) = build_app().await;

    let health = app.clone().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(health.status(), StatusCode::OK);

    let login_page = app.clone().oneshot(get("/login", None)).await.unwrap();
    assert_eq!(login_page.status(), StatusCode::OK);

    let contact = app
        .oneshot(json_request(
            "POST",
            "/contact",
            None,
            json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "subject": "Automation quote",
                "message": "We need help with our workflows."
            }),
        ))
        .await
        .unwrap();
    assert_eq!(contact.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_client_on_admin_path_redirects_to_portal() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let cookie = session_cookie(&client);

    let response = app.oneshot(get("/admin", Some(&cookie))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/portal");
}

#[tokio::test]
async fn test_account_without_profile_is_not_authorized() {
    let (app, pool) = build_app().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(admin.id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let response = app
        .oneshot(get("/admin", Some(&session_cookie(&admin))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/portal");
}

#[tokio::test]
async fn test_staff_reaches_admin_dashboard() {
    let (app, pool) = build_app().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    create_user(&pool, "client@example.com", Role::Client).await;

    let response = app
        .oneshot(get("/admin", Some(&session_cookie(&admin))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let stats = support::body_json(response).await;
    assert_eq!(stats["total_clients"], 1);
    assert_eq!(stats["total_tickets"], 0);
}

#[tokio::test]
async fn test_staff_unknown_admin_path_is_not_found() {
    let (app, pool) = build_app().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;

    let response = app
        .oneshot(get("/admin/does-not-exist", Some(&session_cookie(&admin))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_authenticated_user_on_auth_pages_redirects_to_portal() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let cookie = session_cookie(&client);

    for path in ["/login", "/register"] {
        let response = app.clone().oneshot(get(path, Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{}", path);
        assert_eq!(location(&response), "/portal");
    }
}

#[tokio::test]
async fn test_bearer_header_is_accepted() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let cookie = session_cookie(&client);
    let token = cookie.split_once('=').unwrap().1;

    let request = axum::http::Request::builder()
        .uri("/portal")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_tampered_session_is_treated_as_anonymous() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let cookie = format!("{}x", session_cookie(&client));

    let response = app.oneshot(get("/portal", Some(&cookie))).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?redirect=/portal");
}

#[tokio::test]
async fn test_failing_resolver_fails_closed() {
    let pool = support::create_test_pool().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    let state = support::build_state(pool).with_identity_resolver(Arc::new(FailingResolver));
    let app = api::create_router(state);

    let response = app
        .oneshot(get("/admin", Some(&session_cookie(&admin))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login?redirect=/admin");
}

#[tokio::test]
async fn test_failing_profile_store_fails_closed() {
    let pool = support::create_test_pool().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    let state = support::build_state(pool).with_profile_store(Arc::new(FailingProfiles));
    let app = api::create_router(state);

    let response = app
        .oneshot(get("/admin/tickets", Some(&session_cookie(&admin))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/portal");
}
