//! パスワード再設定E2Eテスト
//!
//! リンク送信 → メールのトークンで再設定 → 新しいパスワードでログイン → リンクの再利用は拒否

use axum::http::{header, StatusCode};
use axum::Router;
use fritz_portal_common::auth::Role;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::{
    body_json, build_app, build_app_with_mail, create_user, get, json_request, session_cookie,
    TEST_PASSWORD,
};

async fn mail_server() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "email_1" })))
        .mount(&mock_server)
        .await;
    mock_server
}

/// 送信済みメール本文（送信はバックグラウンドなので届くまで待つ）
async fn sent_emails(mock_server: &MockServer, expected: usize) -> Vec<Value> {
    for _ in 0..50 {
        let received = mock_server.received_requests().await.unwrap_or_default();
        if received.len() >= expected {
            return received
                .iter()
                .map(|request| serde_json::from_slice(&request.body).unwrap())
                .collect();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {} emails to be sent", expected);
}

fn token_from(email: &Value) -> String {
    let html = email["html"].as_str().unwrap();
    let start = html.find("/reset-password?token=").unwrap() + "/reset-password?token=".len();
    let rest = &html[start..];
    rest[..rest.find('"').unwrap()].to_string()
}

async fn request_reset(app: &Router, email: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/forgot-password",
            None,
            json!({ "email": email }),
        ))
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

async fn login(app: &Router, password: &str) -> StatusCode {
    app.clone()
        .oneshot(json_request(
            "POST",
            "/login",
            None,
            json!({ "email": "client@example.com", "password": password }),
        ))
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let mock_server = mail_server().await;
    let (app, pool) = build_app_with_mail(&format!("{}/emails", mock_server.uri())).await;
    create_user(&pool, "client@example.com", Role::Client).await;

    let known = request_reset(&app, "client@example.com").await;
    let unknown = request_reset(&app, "nobody@example.com").await;
    assert_eq!(known.0, StatusCode::ACCEPTED);
    assert_eq!(known, unknown);

    let emails = sent_emails(&mock_server, 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
    assert_eq!(emails[0]["to"], json!(["client@example.com"]));
}

#[tokio::test]
async fn test_password_reset_flow() {
    let mock_server = mail_server().await;
    let (app, pool) = build_app_with_mail(&format!("{}/emails", mock_server.uri())).await;
    create_user(&pool, "client@example.com", Role::Client).await;

    let (status, _) = request_reset(&app, "CLIENT@example.com").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let token = token_from(&sent_emails(&mock_server, 1).await[0]);

    // リンクを開いた時点ではまだ消費されない
    let page = app
        .clone()
        .oneshot(get(&format!("/reset-password?token={}", token), None))
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    assert_eq!(body_json(page).await["valid"], true);

    let mismatch = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reset-password",
            None,
            json!({
                "token": token,
                "password": "brand-new-password",
                "confirm_password": "something-else"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

    let reset = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reset-password",
            None,
            json!({
                "token": token,
                "password": "brand-new-password",
                "confirm_password": "brand-new-password"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(reset.status(), StatusCode::OK);
    assert!(reset.headers().get(header::SET_COOKIE).is_some());
    assert_eq!(body_json(reset).await["redirect_to"], "/portal");

    assert_eq!(login(&app, TEST_PASSWORD).await, StatusCode::UNAUTHORIZED);
    assert_eq!(login(&app, "brand-new-password").await, StatusCode::OK);

    let reused = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reset-password",
            None,
            json!({ "token": token, "password": "third-password" }),
        ))
        .await
        .unwrap();
    assert_eq!(reused.status(), StatusCode::BAD_REQUEST);
    assert_eq!(login(&app, "brand-new-password").await, StatusCode::OK);
}

#[tokio::test]
async fn test_session_token_cannot_reset_password() {
    let (app, pool) = build_app().await;
    let client = create_user(&pool, "client@example.com", Role::Client).await;
    let cookie = session_cookie(&client);
    let session_token = cookie.split_once('=').unwrap().1;

    let page = app
        .clone()
        .oneshot(get(&format!("/reset-password?token={}", session_token), None))
        .await
        .unwrap();
    assert_eq!(body_json(page).await["valid"], false);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/reset-password",
            None,
            json!({ "token": session_token, "password": "brand-new-password" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(login(&app, TEST_PASSWORD).await, StatusCode::OK);
}
