//! パスワード再設定トークン
//!
//! セッションとは別の鍵（セッションシークレットから派生）で署名する短命のJWT。
//! `jti` を `password_resets` に記録し、1回だけ使える。

use crate::auth::password::{hash_password, validate_new_password};
use crate::db;
use chrono::{Duration, Utc};
use fritz_portal_common::error::{PortalError, PortalResult};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// トークンの用途
pub const RESET_PURPOSE: &str = "password_reset";

/// 再設定リンクの有効期間（分）
pub const RESET_TTL_MINUTES: i64 = 60;

/// 再設定トークンのクレーム
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: String,     // アカウントID
    pub jti: String,     // password_resets のID
    pub purpose: String, // 常に RESET_PURPOSE
    pub iat: usize,
    pub exp: usize,
}

fn signing_key(secret: &str) -> Vec<u8> {
    format!("{}:{}", secret, RESET_PURPOSE).into_bytes()
}

fn invalid_link() -> PortalError {
    PortalError::Validation("This password reset link is invalid or has expired".to_string())
}

/// 再設定トークンを発行して記録する
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `account_id` - 対象アカウント
/// * `secret` - セッション署名用シークレット
///
/// # Returns
/// * `Ok(String)` - JWTトークン
pub async fn issue_reset_token(
    pool: &SqlitePool,
    account_id: Uuid,
    secret: &str,
) -> PortalResult<String> {
    match db::password_resets::purge_stale(pool).await {
        Ok(0) => {}
        Ok(purged) => tracing::debug!("Purged {} stale password resets", purged),
        Err(e) => tracing::warn!("Failed to purge password resets: {}", e),
    }

    let now = Utc::now();
    let expires_at = now + Duration::minutes(RESET_TTL_MINUTES);
    let jti = db::password_resets::create(pool, account_id, expires_at).await?;

    let claims = ResetClaims {
        sub: account_id.to_string(),
        jti: jti.to_string(),
        purpose: RESET_PURPOSE.to_string(),
        iat: now.timestamp() as usize,
        exp: expires_at.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&signing_key(secret)),
    )
    .map_err(|e| PortalError::Jwt(format!("Failed to create reset token: {}", e)))
}

/// 再設定トークンの署名・期限・用途を検証（使用済みかは確認しない）
///
/// # Returns
/// * `Ok((account_id, jti))` - 検証済み
/// * `Err(PortalError::Jwt)` - 署名不一致・期限切れ・用途違い
pub fn verify_reset_token(token: &str, secret: &str) -> PortalResult<(Uuid, Uuid)> {
    let claims = decode::<ResetClaims>(
        token,
        &DecodingKey::from_secret(&signing_key(secret)),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| PortalError::Jwt(format!("Failed to verify reset token: {}", e)))?;

    if claims.purpose != RESET_PURPOSE {
        return Err(PortalError::Jwt(format!(
            "Unexpected token purpose: {}",
            claims.purpose
        )));
    }
    let account_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| PortalError::Jwt(format!("Invalid reset subject: {}", e)))?;
    let jti = Uuid::parse_str(&claims.jti)
        .map_err(|e| PortalError::Jwt(format!("Invalid reset id: {}", e)))?;
    Ok((account_id, jti))
}

/// トークンを消費してパスワードを更新する
///
/// # Returns
/// * `Ok(Uuid)` - 更新したアカウントID
/// * `Err(PortalError::Validation)` - 無効・期限切れ・使用済みのリンク、または短すぎるパスワード
pub async fn reset_password(
    pool: &SqlitePool,
    token: &str,
    secret: &str,
    new_password: &str,
) -> PortalResult<Uuid> {
    let (account_id, jti) = verify_reset_token(token, secret).map_err(|e| {
        tracing::info!("Rejected password reset link: {}", e);
        invalid_link()
    })?;
    validate_new_password(new_password)?;

    let password_hash = hash_password(new_password)?;
    if !db::password_resets::redeem(pool, jti, account_id, &password_hash).await? {
        tracing::info!("Password reset link already used or expired: {}", jti);
        return Err(invalid_link());
    }

    tracing::info!("Password reset completed for account {}", account_id);
    Ok(account_id)
}
