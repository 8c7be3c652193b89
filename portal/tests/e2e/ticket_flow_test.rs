//! チケットフローE2Eテスト
//!
//! 登録 → チケット作成 → スタッフ返信と内部メモ → 状態遷移 → 再オープン

use axum::http::{header, StatusCode};
use fritz_portal_common::auth::Role;
use serde_json::json;
use tower::ServiceExt;

use crate::support::{build_app, body_json, create_user, get, json_request, session_cookie};

#[tokio::test]
async fn test_complete_ticket_flow() {
    let (app, pool) = build_app().await;
    let admin = create_user(&pool, "admin@example.com", Role::Admin).await;
    let admin_cookie = session_cookie(&admin);

    // Step 1: 登録（そのままログイン状態）
    let register = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register",
            None,
            json!({
                "email": "client@example.com",
                "password": "client-password",
                "first_name": "Casey",
                "company_name": "Acme"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(register.status(), StatusCode::CREATED);
    let set_cookie = register
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("portal_session="));
    assert!(set_cookie.contains("HttpOnly"));
    let registered = body_json(register).await;
    assert_eq!(registered["profile"]["role"], "client");
    assert_eq!(registered["redirect_to"], "/portal");
    let client_cookie = format!(
        "portal_session={}",
        registered["token"].as_str().unwrap()
    );

    // Step 2: チケット作成
    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/portal/tickets",
            Some(&client_cookie),
            json!({
                "subject": "Invoice sync broken",
                "description": "Invoices stopped syncing yesterday.",
                "priority": "high"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let ticket = body_json(created).await;
    assert_eq!(ticket["status"], "open");
    assert!(ticket["ticket_number"].as_str().unwrap().starts_with("TKT-"));
    let ticket_id = ticket["id"].as_str().unwrap().to_string();

    // Step 3: 内部メモと公開返信
    for (content, is_internal) in [("Check the webhook logs", true), ("Looking into it", false)] {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/admin/tickets/{}/messages", ticket_id),
                Some(&admin_cookie),
                json!({ "content": content, "is_internal": is_internal }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    // クライアントが内部メモを装っても公開メッセージになる
    let client_reply = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/portal/tickets/{}/messages", ticket_id),
            Some(&client_cookie),
            json!({ "content": "Thanks!", "is_internal": true }),
        ))
        .await
        .unwrap();
    assert_eq!(client_reply.status(), StatusCode::CREATED);
    assert_eq!(body_json(client_reply).await["is_internal"], false);

    // Step 4: クライアントには公開メッセージのみ
    let client_view = body_json(
        app.clone()
            .oneshot(get(&format!("/portal/tickets/{}", ticket_id), Some(&client_cookie)))
            .await
            .unwrap(),
    )
    .await;
    let messages = client_view["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages.iter().all(|m| m["is_internal"] == false));
    assert!(client_view.get("client").is_none());

    // スタッフには全件とクライアント情報
    let staff_view = body_json(
        app.clone()
            .oneshot(get(&format!("/admin/tickets/{}", ticket_id), Some(&admin_cookie)))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(staff_view["messages"].as_array().unwrap().len(), 3);
    assert_eq!(staff_view["client"]["company_name"], "Acme");

    // Step 5: 状態遷移
    let closed = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/admin/tickets/{}", ticket_id),
            Some(&admin_cookie),
            json!({ "status": "closed" }),
        ))
        .await
        .unwrap();
    assert_eq!(closed.status(), StatusCode::OK);
    assert_eq!(body_json(closed).await["status"], "closed");

    let reopen_by_update = app
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/admin/tickets/{}", ticket_id),
            Some(&admin_cookie),
            json!({ "status": "open" }),
        ))
        .await
        .unwrap();
    assert_eq!(reopen_by_update.status(), StatusCode::BAD_REQUEST);

    // Step 6: 再オープン
    let reopened = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/admin/tickets/{}/reopen", ticket_id),
            Some(&admin_cookie),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(reopened.status(), StatusCode::OK);
    let reopened = body_json(reopened).await;
    assert_eq!(reopened["status"], "open");
    assert!(reopened["resolved_at"].is_null());
}

#[tokio::test]
async fn test_client_cannot_see_other_clients_ticket() {
    let (app, pool) = build_app().await;
    let owner = create_user(&pool, "owner@example.com", Role::Client).await;
    let other = create_user(&pool, "other@example.com", Role::Client).await;

    let created = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/portal/tickets",
            Some(&session_cookie(&owner)),
            json!({ "subject": "Private", "description": "Only mine" }),
        ))
        .await
        .unwrap();
    let ticket_id = body_json(created).await["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(
            &format!("/portal/tickets/{}", ticket_id),
            Some(&session_cookie(&other)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let listing = body_json(
        app.oneshot(get("/portal/tickets", Some(&session_cookie(&other))))
            .await
            .unwrap(),
    )
    .await;
    assert!(listing["tickets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_ticket_creation_requires_subject_and_description() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/portal/tickets",
            Some(&session_cookie(&client)),
            json!({ "subject": "  ", "description": "Something" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let (app, pool) = build_app().await;
    create_user(&pool, "client@example.com", Role::Client).await;

    let wrong = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            json!({ "email": "client@example.com", "password": "not-the-password" }),
        ))
        .await
        .unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            json!({
                "email": "client@example.com",
                "password": crate::support::TEST_PASSWORD,
                "redirect": "//evil.example.com"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_json(ok).await["redirect_to"], "/portal");
}

#[tokio::test]
async fn test_login_without_profile_is_unauthorized() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "orphan@example.com", Role::Client).await;
    sqlx::query("DELETE FROM profiles WHERE id = ?")
        .bind(client.id.to_string())
        .execute(&pool)
        .await
        .unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            json!({ "email": "orphan@example.com", "password": crate::support::TEST_PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
    let body = body_json(response).await;
    assert_eq!(body["error"], "Authentication error: Invalid email or password");
    assert!(!body.to_string().contains(&client.id.to_string()));
}

#[tokio::test]
async fn test_overview_lists_newest_created_tickets_first() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let cookie = session_cookie(&client);

    let mut ids = Vec::new();
    for subject in ["Older", "Newer"] {
        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/portal/tickets",
                Some(&cookie),
                json!({ "subject": subject, "description": "Details" }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        ids.push(body_json(created).await["id"].as_str().unwrap().to_string());
    }

    // 古いチケットへの返信で更新日時が新しくなっても順序は作成日時のまま
    let reply = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/portal/tickets/{}/messages", ids[0]),
            Some(&cookie),
            json!({ "content": "Any update?" }),
        ))
        .await
        .unwrap();
    assert_eq!(reply.status(), StatusCode::CREATED);

    let overview = app.oneshot(get("/portal", Some(&cookie))).await.unwrap();
    assert_eq!(overview.status(), StatusCode::OK);
    let recent = body_json(overview).await["recent_tickets"].clone();
    assert_eq!(recent[0]["subject"], "Newer");
    assert_eq!(recent[1]["subject"], "Older");
}
