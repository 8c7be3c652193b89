//! セッショントークン（HS256 JWT）と呼び出し元の解決
//!
//! 資格情報は `portal_session` Cookie、なければ `Authorization: Bearer` から取り出す。
//! 検証に失敗したトークンは未ログインとして扱う。

use crate::db;
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use fritz_portal_common::auth::{Identity, SessionClaims};
use fritz_portal_common::error::{PortalError, PortalResult};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::SqlitePool;
use uuid::Uuid;

/// セッションCookie名
pub const SESSION_COOKIE: &str = "portal_session";

/// セッション発行設定
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// 署名用シークレット
    pub secret: String,
    /// トークン有効期間
    pub ttl: Duration,
    /// Cookieに `Secure` を付けるか
    pub secure_cookies: bool,
}

/// 呼び出し元の解決結果
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// 呼び出し元（未ログインなら `None`）
    pub identity: Option<Identity>,
    /// 更新されたトークン（レスポンスにCookieとして付与する）
    pub refreshed: Option<String>,
}

impl Resolution {
    /// 未ログイン
    pub fn anonymous() -> Self {
        Self::default()
    }
}

/// 呼び出し元リゾルバー
///
/// エラーを返した場合、ゲートは未ログインとして扱う。
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// リクエストヘッダーから呼び出し元を解決
    async fn resolve(&self, headers: &HeaderMap) -> PortalResult<Resolution>;
}

/// JWTセッションによるリゾルバー
///
/// 署名と有効期限に加え、アカウントが削除されていないことも確認する。
#[derive(Clone)]
pub struct JwtIdentityResolver {
    settings: SessionSettings,
    pool: SqlitePool,
}

impl JwtIdentityResolver {
    /// リゾルバーを作成
    pub fn new(settings: SessionSettings, pool: SqlitePool) -> Self {
        Self { settings, pool }
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, headers: &HeaderMap) -> PortalResult<Resolution> {
        let Some(credential) = extract_credential(headers) else {
            return Ok(Resolution::anonymous());
        };
        let Some(claims) = verified_claims(&credential, &self.settings.secret) else {
            return Ok(Resolution::anonymous());
        };
        let Some(identity) = identity_from_claims(&claims) else {
            return Ok(Resolution::anonymous());
        };

        let Some(account) = db::accounts::find_by_id(&self.pool, identity.id).await? else {
            tracing::debug!("Session refers to a deleted account: {}", identity.id);
            return Ok(Resolution::anonymous());
        };
        let identity = Identity {
            id: account.id,
            email: account.email,
        };

        let refreshed = if needs_rotation(&claims, Utc::now().timestamp()) {
            match issue_session(&identity, &self.settings.secret, self.settings.ttl) {
                Ok(token) => Some(token),
                Err(e) => {
                    tracing::warn!("Failed to rotate session: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Resolution {
            identity: Some(identity),
            refreshed,
        })
    }
}

/// セッショントークンを発行
///
/// # Arguments
/// * `identity` - ログインした呼び出し元
/// * `secret` - 署名用シークレット
/// * `ttl` - 有効期間
///
/// # Returns
/// * `Ok(String)` - JWTトークン
/// * `Err(PortalError::Jwt)` - 生成失敗
pub fn issue_session(identity: &Identity, secret: &str, ttl: Duration) -> PortalResult<String> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(ttl)
        .ok_or_else(|| PortalError::Jwt("Failed to calculate expiration time".to_string()))?;

    let claims = SessionClaims {
        sub: identity.id.to_string(),
        email: identity.email.clone(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };
    encode_claims(&claims, secret)
}

fn encode_claims(claims: &SessionClaims, secret: &str) -> PortalResult<String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| PortalError::Jwt(format!("Failed to create session token: {}", e)))
}

/// セッショントークンを検証
///
/// # Returns
/// * `Ok(SessionClaims)` - 検証済みクレーム
/// * `Err(PortalError::Jwt)` - 署名不一致・期限切れ・形式不正
pub fn verify_session(token: &str, secret: &str) -> PortalResult<SessionClaims> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| PortalError::Jwt(format!("Failed to verify session token: {}", e)))
}

/// 資格情報から呼び出し元を取り出す（失敗は `None`）
pub fn resolve_identity(credential: &str, secret: &str) -> Option<Identity> {
    verified_claims(credential, secret).and_then(|claims| identity_from_claims(&claims))
}

fn verified_claims(credential: &str, secret: &str) -> Option<SessionClaims> {
    match verify_session(credential, secret) {
        Ok(claims) => Some(claims),
        Err(e) => {
            tracing::warn!("Session verification failed: {}", e);
            None
        }
    }
}

fn identity_from_claims(claims: &SessionClaims) -> Option<Identity> {
    match Uuid::parse_str(&claims.sub) {
        Ok(id) => Some(Identity {
            id,
            email: claims.email.clone(),
        }),
        Err(e) => {
            tracing::warn!("Session subject is not a valid id: {}", e);
            None
        }
    }
}

/// 残り有効期間が半分を切っていれば更新する
fn needs_rotation(claims: &SessionClaims, now: i64) -> bool {
    let lifetime = claims.exp as i64 - claims.iat as i64;
    let remaining = claims.exp as i64 - now;
    remaining * 2 < lifetime
}

/// リクエストからセッション資格情報を取り出す（Cookie優先）
pub fn extract_credential(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());
    if from_cookie.is_some() {
        return from_cookie;
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// セッションCookieの `Set-Cookie` 値
pub fn session_cookie(token: &str, settings: &SessionSettings) -> String {
    build_cookie(token, settings.ttl.num_seconds(), settings.secure_cookies)
}

/// セッションCookieを消す `Set-Cookie` 値
pub fn clear_session_cookie(settings: &SessionSettings) -> String {
    build_cookie("", 0, settings.secure_cookies)
}

fn build_cookie(value: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
