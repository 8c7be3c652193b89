//! 認証API
//!
//! 登録・ログイン・ログアウト・パスワード再設定。成功時はセッションCookieを設定し、本文にもトークンを返す。

use crate::api::AppError;
use crate::auth::password::{hash_password, validate_new_password, verify_password};
use crate::auth::reset::{self, RESET_TTL_MINUTES};
use crate::auth::session::{clear_session_cookie, issue_session, session_cookie};
use crate::auth::{gate, AuthContext};
use crate::db::accounts::{self, NewAccount};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use fritz_portal_common::auth::{Identity, Profile, Role};
use fritz_portal_common::error::PortalError;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// ログインリクエスト
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// メールアドレス
    pub email: String,
    /// パスワード
    pub password: String,
    /// ログイン後の遷移先（`/login?redirect=` の値）
    #[serde(default)]
    pub redirect: Option<String>,
}

/// 登録リクエスト
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// メールアドレス
    pub email: String,
    /// パスワード
    pub password: String,
    /// 名
    #[serde(default)]
    pub first_name: Option<String>,
    /// 姓
    #[serde(default)]
    pub last_name: Option<String>,
    /// 会社名
    #[serde(default)]
    pub company_name: Option<String>,
}

/// セッション発行レスポンス
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// セッショントークン
    pub token: String,
    /// 有効期間（秒）
    pub expires_in: i64,
    /// 呼び出し元のプロフィール
    pub profile: Profile,
    /// 遷移先
    pub redirect_to: String,
}

/// 再設定リンク送信リクエスト
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    /// メールアドレス
    pub email: String,
}

/// パスワード再設定リクエスト
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    /// メールで届いたトークン
    pub token: String,
    /// 新しいパスワード
    pub password: String,
    /// 確認入力（指定時は一致が必要）
    #[serde(default)]
    pub confirm_password: Option<String>,
}

/// `/reset-password` のクエリ
#[derive(Debug, Deserialize)]
pub struct ResetQuery {
    /// メールで届いたトークン
    pub token: Option<String>,
}

/// アカウントの有無にかかわらず返す応答
pub const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists with that email, we've sent a password reset link.";

/// `/login` のクエリ
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// ログイン後の遷移先
    pub redirect: Option<String>,
}

/// ログイン後の遷移先を検証（サイト内の絶対パスのみ許可）
pub fn safe_redirect(target: Option<&str>) -> String {
    match target {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => gate::PORTAL_HOME.to_string(),
    }
}

/// 簡易メール形式チェック（`x@y.z`）
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.')
}

fn with_session(
    state: &AppState,
    status: StatusCode,
    identity: &Identity,
    profile: Profile,
    redirect_to: String,
) -> Result<Response, AppError> {
    let token = issue_session(identity, &state.sessions.secret, state.sessions.ttl)?;
    let cookie = session_cookie(&token, &state.sessions);
    let body = SessionResponse {
        token,
        expires_in: state.sessions.ttl.num_seconds(),
        profile,
        redirect_to,
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// GET /login - ログインページ（未ログイン時のみゲートを通過）
pub async fn login_page(Query(query): Query<LoginQuery>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "Sign in required",
        "redirect": safe_redirect(query.redirect.as_deref()),
    }))
}

/// GET /register - 登録ページ（未ログイン時のみゲートを通過）
pub async fn register_page() -> Json<serde_json::Value> {
    Json(json!({ "message": "Create an account" }))
}

/// POST /login - ログイン
///
/// # Returns
/// * `200 OK` - ログイン成功（Cookie設定）
/// * `401 Unauthorized` - メールアドレスまたはパスワード不一致
/// * `500 Internal Server Error` - サーバーエラー
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let invalid = || PortalError::Authentication("Invalid email or password".to_string());

    let account = accounts::find_by_email(&state.db_pool, request.email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&request.password, &account.password_hash)? {
        tracing::info!("Failed login attempt for {}", account.email);
        return Err(invalid().into());
    }

    // プロフィールのないアカウントは認証失敗として扱う
    let Some(profile) = state.profiles.get_profile(account.id).await? else {
        tracing::warn!("Login refused, account {} has no profile", account.id);
        return Err(invalid().into());
    };

    if let Err(e) = accounts::update_last_login(&state.db_pool, account.id).await {
        tracing::warn!("Failed to update last login: {}", e);
    }

    let identity = Identity {
        id: account.id,
        email: account.email,
    };
    tracing::info!("User logged in: {}", identity.email);
    with_session(
        &state,
        StatusCode::OK,
        &identity,
        profile,
        safe_redirect(request.redirect.as_deref()),
    )
}

/// POST /register - アカウント登録
///
/// アカウントと `client` プロフィールを同一トランザクションで作成し、そのままログイン状態にする。
///
/// # Returns
/// * `201 Created` - 登録成功（Cookie設定）
/// * `400 Bad Request` - 入力不正
/// * `409 Conflict` - メールアドレス重複
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    let email = request.email.trim();
    if !is_valid_email(email) {
        return Err(PortalError::Validation("A valid email address is required".to_string()).into());
    }
    validate_new_password(&request.password)?;

    let password_hash = hash_password(&request.password)?;
    let new_account = NewAccount {
        email,
        password_hash: &password_hash,
        first_name: request.first_name.as_deref(),
        last_name: request.last_name.as_deref(),
        company_name: request.company_name.as_deref(),
    };
    let (account, profile) = accounts::create_with_profile(&state.db_pool, &new_account, Role::Client)
        .await
        .map_err(|e| match e {
            PortalError::Conflict(_) => {
                PortalError::Conflict("An account with this email already exists".to_string())
            }
            other => other,
        })?;

    tracing::info!("Registered new client: {}", account.email);
    let identity = Identity {
        id: account.id,
        email: account.email,
    };
    with_session(
        &state,
        StatusCode::CREATED,
        &identity,
        profile,
        gate::PORTAL_HOME.to_string(),
    )
}

/// GET /forgot-password - 再設定リンク送信ページ
pub async fn forgot_password_page() -> Json<serde_json::Value> {
    Json(json!({ "message": "Enter your email to receive a password reset link" }))
}

/// POST /forgot-password - 再設定リンクを送信
///
/// アカウントが存在しない場合や発行に失敗した場合も同じ応答を返す。
///
/// # Returns
/// * `202 Accepted` - 受付（常に同じ本文）
/// * `400 Bad Request` - メールアドレスの形式不正
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Response, AppError> {
    let email = request.email.trim();
    if !is_valid_email(email) {
        return Err(PortalError::Validation("A valid email address is required".to_string()).into());
    }

    match accounts::find_by_email(&state.db_pool, email).await {
        Ok(Some(account)) => {
            match reset::issue_reset_token(&state.db_pool, account.id, &state.sessions.secret)
                .await
            {
                Ok(token) => {
                    tracing::info!("Password reset requested for {}", account.email);
                    let message = state
                        .notifier
                        .password_reset(&account.email, &token, RESET_TTL_MINUTES);
                    state.notifier.dispatch(message);
                }
                Err(e) => tracing::error!("Failed to issue password reset: {}", e),
            }
        }
        Ok(None) => tracing::info!("Password reset requested for unknown email"),
        Err(e) => tracing::error!("Failed to look up account for password reset: {}", e),
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "message": RESET_REQUESTED_MESSAGE })),
    )
        .into_response())
}

/// GET /reset-password - 再設定ページ
///
/// リンクの署名と期限だけを確認する（使用済みかは送信時に判定）。
pub async fn reset_password_page(
    State(state): State<AppState>,
    Query(query): Query<ResetQuery>,
) -> Json<serde_json::Value> {
    let valid = query
        .token
        .as_deref()
        .is_some_and(|token| reset::verify_reset_token(token, &state.sessions.secret).is_ok());
    Json(json!({ "message": "Choose a new password", "valid": valid }))
}

/// POST /reset-password - パスワードを再設定してログイン
///
/// # Returns
/// * `200 OK` - 再設定成功（Cookie設定）
/// * `400 Bad Request` - 無効・期限切れ・使用済みのリンク、またはパスワード不正
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    if request
        .confirm_password
        .as_deref()
        .is_some_and(|confirm| confirm != request.password)
    {
        return Err(PortalError::Validation("Passwords do not match".to_string()).into());
    }

    let account_id = reset::reset_password(
        &state.db_pool,
        &request.token,
        &state.sessions.secret,
        &request.password,
    )
    .await?;

    let invalid = || {
        PortalError::Validation("This password reset link is invalid or has expired".to_string())
    };
    let account = accounts::find_by_id(&state.db_pool, account_id)
        .await?
        .ok_or_else(invalid)?;
    let Some(profile) = state.profiles.get_profile(account.id).await? else {
        tracing::warn!("Password reset for account {} without profile", account.id);
        return Err(invalid().into());
    };

    let identity = Identity {
        id: account.id,
        email: account.email,
    };
    with_session(
        &state,
        StatusCode::OK,
        &identity,
        profile,
        gate::PORTAL_HOME.to_string(),
    )
}

/// POST /logout - ログアウト
///
/// セッションCookieを消去する。トークン自体は期限まで有効。
pub async fn logout(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthContext>,
) -> Response {
    if let Some(identity) = ctx.identity.as_ref() {
        tracing::info!("User logged out: {}", identity.email);
    }
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_session_cookie(&state.sessions))],
    )
        .into_response()
}
