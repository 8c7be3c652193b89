//! 管理機能E2Eテスト
//!
//! ロール変更の制限、ユーザー削除とセッション失効、問い合わせ管理、セッション更新。

use axum::http::{header, StatusCode};
use fritz_portal_common::auth::Role;
use serde_json::json;
use tower::ServiceExt;

use crate::support::{
    aging_session_cookie, body_json, build_app, create_user, get, json_request, location,
    session_cookie,
};

fn set_cookies(response: &axum::http::Response<axum::body::Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_role_changes_are_restricted() {
    let (app, pool) = build_app().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let admin_cookie = session_cookie(&admin);

    // 自分自身は不可
    let own = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/admin/users/{}/role", admin.id),
            Some(&admin_cookie),
            json!({ "role": "client" }),
        ))
        .await
        .unwrap();
    assert_eq!(own.status(), StatusCode::BAD_REQUEST);

    // superadmin の付与は特権管理者のみ
    let grant = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/admin/users/{}/role", client.id),
            Some(&admin_cookie),
            json!({ "role": "superadmin" }),
        ))
        .await
        .unwrap();
    assert_eq!(grant.status(), StatusCode::FORBIDDEN);

    let promote = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/admin/users/{}/role", client.id),
            Some(&admin_cookie),
            json!({ "role": "admin" }),
        ))
        .await
        .unwrap();
    assert_eq!(promote.status(), StatusCode::OK);
    assert_eq!(body_json(promote).await["role"], "admin");

    // 次のリクエストから昇格が反映される
    let dashboard = app
        .oneshot(get("/admin", Some(&session_cookie(&client))))
        .await
        .unwrap();
    assert_eq!(dashboard.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_only_superadmin_deletes_users() {
    let (app, pool) = build_app().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    let superadmin = create_user(&pool, "root@example.com", Role::Superadmin).await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let client_cookie = session_cookie(&client);

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/portal/tickets",
            Some(&client_cookie),
            json!({ "subject": "Help", "description": "Please" }),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let by_admin = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(format!("/admin/users/{}", client.id))
                .header(header::COOKIE, session_cookie(&admin))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(by_admin.status(), StatusCode::FORBIDDEN);

    let self_delete = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(format!("/admin/users/{}", superadmin.id))
                .header(header::COOKIE, session_cookie(&superadmin))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(self_delete.status(), StatusCode::BAD_REQUEST);

    let deleted = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("DELETE")
                .uri(format!("/admin/users/{}", client.id))
                .header(header::COOKIE, session_cookie(&superadmin))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    // 削除済みアカウントのセッションは即座に無効
    let after = app
        .clone()
        .oneshot(get("/portal", Some(&client_cookie)))
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&after), "/login?redirect=/portal");

    let tickets = body_json(
        app.oneshot(get("/admin/tickets", Some(&session_cookie(&admin))))
            .await
            .unwrap(),
    )
    .await;
    assert!(tickets["tickets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_contact_submission_is_managed_by_staff() {
    let (app, pool) = build_app().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    let admin_cookie = session_cookie(&admin);

    let submitted = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/contact",
            None,
            json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "subject": "Quote",
                "message": "How much?"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(submitted.status(), StatusCode::CREATED);
    let contact_id = body_json(submitted).await["id"].as_str().unwrap().to_string();

    let invalid = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/contact",
            None,
            json!({ "name": "Jane", "email": "not-an-email", "subject": "Hi", "message": "?" }),
        ))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let stats = body_json(
        app.clone()
            .oneshot(get("/admin", Some(&admin_cookie)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(stats["new_contacts"], 1);

    let updated = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/admin/contacts/{}", contact_id),
            Some(&admin_cookie),
            json!({ "status": "responded", "admin_notes": "Sent pricing" }),
        ))
        .await
        .unwrap();
    assert_eq!(updated.status(), StatusCode::OK);
    let updated = body_json(updated).await;
    assert_eq!(updated["status"], "responded");
    assert_eq!(updated["admin_notes"], "Sent pricing");
    assert!(!updated["responded_at"].is_null());

    // メモ省略時は既存のまま
    let archived = body_json(
        app.oneshot(json_request(
            "PUT",
            &format!("/admin/contacts/{}", contact_id),
            Some(&admin_cookie),
            json!({ "status": "archived" }),
        ))
        .await
        .unwrap(),
    )
    .await;
    assert_eq!(archived["admin_notes"], "Sent pricing");
}

#[tokio::test]
async fn test_aging_session_is_refreshed() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let aging = aging_session_cookie(&client);

    let response = app.oneshot(get("/portal", Some(&aging))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].starts_with("portal_session="));
    assert_ne!(cookies[0].split(';').next().unwrap(), aging);
}

#[tokio::test]
async fn test_logout_clears_cookie_even_when_refresh_is_due() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/logout",
            Some(&aging_session_cookie(&client)),
            json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let cookies = set_cookies(&response);
    assert_eq!(cookies.len(), 1);
    assert!(cookies[0].contains("Max-Age=0"));
}
