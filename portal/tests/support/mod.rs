//! 統合テスト用のヘルパー

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use fritz_portal::auth::session::{issue_session, SessionSettings, SESSION_COOKIE};
use fritz_portal::config::PortalConfig;
use fritz_portal::db::accounts::{self, NewAccount};
use fritz_portal::notify::Notifier;
use fritz_portal::{api, AppState};
use fritz_portal_common::auth::{Identity, Role};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// テスト用パスワード
pub const TEST_PASSWORD: &str = "password123";

/// インメモリDB（接続1本に固定）
pub async fn create_test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    fritz_portal::db::migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// テスト用セッション設定
pub fn test_sessions() -> SessionSettings {
    SessionSettings {
        secret: "integration-test-secret".to_string(),
        ttl: chrono::Duration::hours(24),
        secure_cookies: false,
    }
}

/// 通知無効の状態を組み立てる
pub fn build_state(pool: SqlitePool) -> AppState {
    AppState::new(pool, test_sessions(), Notifier::disabled())
}

/// ルーターとDBを組み立てる
pub async fn build_app() -> (Router, SqlitePool) {
    let pool = create_test_pool().await;
    (api::create_router(build_state(pool.clone())), pool)
}

/// メール送信先を `endpoint` に向けたルーターとDB
pub async fn build_app_with_mail(endpoint: &str) -> (Router, SqlitePool) {
    let pool = create_test_pool().await;
    let config = PortalConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "sqlite::memory:".to_string(),
        session_ttl_hours: 24,
        secure_cookies: false,
        resend_api_key: Some("re_test".to_string()),
        notify_from: PortalConfig::DEFAULT_NOTIFY_FROM.to_string(),
        notify_fallback_email: PortalConfig::DEFAULT_FALLBACK_EMAIL.to_string(),
        site_url: PortalConfig::DEFAULT_SITE_URL.to_string(),
    };
    let notifier = Notifier::new(&config).with_endpoint(endpoint);
    let state = AppState::new(pool.clone(), test_sessions(), notifier);
    (api::create_router(state), pool)
}

/// 指定ロールのユーザーを作成（bcryptコストは最小）
pub async fn create_user(pool: &SqlitePool, email: &str, role: Role) -> Identity {
    let password_hash = bcrypt::hash(TEST_PASSWORD, 4).unwrap();
    let (account, _) = accounts::create_with_profile(
        pool,
        &NewAccount {
            email,
            password_hash: &password_hash,
            ..Default::default()
        },
        role,
    )
    .await
    .unwrap();
    Identity {
        id: account.id,
        email: account.email,
    }
}

/// セッションCookieヘッダー値
pub fn session_cookie(identity: &Identity) -> String {
    let settings = test_sessions();
    let token = issue_session(identity, &settings.secret, settings.ttl).unwrap();
    format!("{}={}", SESSION_COOKIE, token)
}

/// GETリクエスト（Cookie任意）
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// JSONボディ付きリクエスト（Cookie任意）
pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

/// レスポンスボディをJSONとして読む
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Locationヘッダー
pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// 有効期間の半分以上を消費したセッションCookie（更新対象）
pub fn aging_session_cookie(identity: &Identity) -> String {
    use fritz_portal_common::auth::SessionClaims;
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now().timestamp();
    let claims = SessionClaims {
        sub: identity.id.to_string(),
        email: identity.email.clone(),
        iat: (now - 20 * 3600) as usize,
        exp: (now + 4 * 3600) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(test_sessions().secret.as_bytes()),
    )
    .unwrap();
    format!("{}={}", SESSION_COOKIE, token)
}
