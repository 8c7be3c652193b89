//! 初回起動時の特権管理者作成
//!
//! 環境変数が設定されていれば `superadmin` のアカウントとプロフィールを作成する。

use crate::auth::password::hash_password;
use crate::config::get_env_with_fallback;
use crate::db::accounts::{self, NewAccount};
use fritz_portal_common::auth::Role;
use fritz_portal_common::error::PortalError;
use sqlx::SqlitePool;

/// 環境変数から特権管理者を作成
///
/// # Environment Variables
/// * `PORTAL_ADMIN_EMAIL` - メールアドレス（旧名 `ADMIN_EMAIL`、必須）
/// * `PORTAL_ADMIN_PASSWORD` - パスワード（旧名 `ADMIN_PASSWORD`、必須）
///
/// # Returns
/// * `Ok(Some(email))` - 作成した、または既に存在する
/// * `Ok(None)` - 環境変数が未設定
/// * `Err(PortalError)` - 作成失敗
pub async fn create_superadmin_from_env(pool: &SqlitePool) -> Result<Option<String>, PortalError> {
    let password = match get_env_with_fallback("PORTAL_ADMIN_PASSWORD", "ADMIN_PASSWORD") {
        Some(p) if !p.is_empty() => p,
        _ => {
            tracing::debug!("PORTAL_ADMIN_PASSWORD not set, skipping admin bootstrap");
            return Ok(None);
        }
    };
    let email = match get_env_with_fallback("PORTAL_ADMIN_EMAIL", "ADMIN_EMAIL") {
        Some(e) if !e.trim().is_empty() => e.trim().to_string(),
        _ => {
            tracing::warn!("PORTAL_ADMIN_PASSWORD is set but PORTAL_ADMIN_EMAIL is not, skipping admin bootstrap");
            return Ok(None);
        }
    };

    let password_hash = hash_password(&password)?;
    let new_account = NewAccount {
        email: &email,
        password_hash: &password_hash,
        first_name: Some("Portal"),
        last_name: Some("Admin"),
        company_name: None,
    };

    match accounts::create_with_profile(pool, &new_account, Role::Superadmin).await {
        Ok((account, _)) => {
            tracing::info!("Created superadmin from env: email={}", account.email);
            Ok(Some(account.email))
        }
        Err(PortalError::Conflict(_)) => {
            tracing::info!("Admin account {} already exists, skipping creation", email);
            Ok(Some(email))
        }
        Err(e) => {
            tracing::error!("Failed to create admin account from env: {}", e);
            Err(e)
        }
    }
}
