//! セッションゲートミドルウェア
//!
//! 全リクエストに適用する。呼び出し元を解決し、パス分類に応じてリダイレクトするか、
//! [`AuthContext`] をリクエスト拡張に差し込んでハンドラーへ進める。

use crate::auth::gate::{self, GateDecision};
use crate::auth::session::{self, Resolution, SESSION_COOKIE};
use crate::auth::AuthContext;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use fritz_portal_common::auth::Role;

/// セッションゲート
///
/// # Arguments
/// * `State(state)` - アプリケーション状態（リゾルバーと認可器）
/// * `request` - HTTPリクエスト
/// * `next` - 次のミドルウェア/ハンドラー
///
/// # Returns
/// * `303 See Other` - ログイン・ポータルへのリダイレクト
/// * それ以外 - ハンドラーのレスポンス
pub async fn session_gate(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();

    // 解決失敗は未ログイン扱い
    let resolution = match state.identity.resolve(request.headers()).await {
        Ok(resolution) => resolution,
        Err(e) => {
            tracing::warn!("Identity resolution failed for {}: {}", path, e);
            Resolution::anonymous()
        }
    };

    let mut role = None;
    if let Some(identity) = resolution.identity.as_ref() {
        if gate::is_protected(&path) {
            role = state.authorizer.role_of(identity).await;
        }
    }
    let authorized = role.is_some_and(Role::is_staff);

    let mut response = match gate::decide(&path, resolution.identity.as_ref(), authorized) {
        GateDecision::Proceed => {
            tracing::debug!(
                path = %path,
                identity = ?resolution.identity.as_ref().map(|i| i.id),
                "Session gate: proceed"
            );
            request.extensions_mut().insert(AuthContext {
                identity: resolution.identity.clone(),
                role,
            });
            next.run(request).await
        }
        GateDecision::Redirect { target, reason } => {
            tracing::info!(path = %path, target = %target, reason = ?reason, "Session gate: redirect");
            Redirect::to(&target).into_response()
        }
    };

    if let Some(token) = resolution.refreshed {
        attach_refreshed_cookie(&mut response, &session::session_cookie(&token, &state.sessions));
    }
    response
}

/// 更新トークンをCookieとして付与（ハンドラーがセッションCookieを設定済みなら何もしない）
fn attach_refreshed_cookie(response: &mut Response, cookie: &str) {
    let prefix = format!("{}=", SESSION_COOKIE);
    let already_set = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.starts_with(&prefix));
    if already_set {
        return;
    }

    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::warn!("Failed to attach refreshed session cookie: {}", e),
    }
}
