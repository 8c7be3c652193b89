//! パスワード再設定リンクの発行記録
//!
//! リンク（署名付きトークン）に埋め込んだIDをここに記録し、使用済みかどうかを管理する。

use super::format_timestamp;
use chrono::{DateTime, Utc};
use fritz_portal_common::error::{PortalError, PortalResult};
use sqlx::SqlitePool;
use uuid::Uuid;

/// 再設定リンクを記録
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `account_id` - 対象アカウント
/// * `expires_at` - 有効期限
///
/// # Returns
/// * `Ok(Uuid)` - トークンに埋め込むID
pub async fn create(
    pool: &SqlitePool,
    account_id: Uuid,
    expires_at: DateTime<Utc>,
) -> PortalResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO password_resets (id, account_id, created_at, expires_at, used_at)
         VALUES (?, ?, ?, ?, NULL)",
    )
    .bind(id.to_string())
    .bind(account_id.to_string())
    .bind(format_timestamp(super::now()))
    .bind(format_timestamp(expires_at))
    .execute(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to create password reset: {}", e)))?;

    Ok(id)
}

/// 再設定リンクを使用済みにし、パスワードを更新する
///
/// 同じアカウントの未使用リンクもすべて無効にする。1トランザクションで実行する。
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `id` - トークンに埋め込まれたID
/// * `account_id` - トークンの対象アカウント
/// * `password_hash` - 新しいbcryptハッシュ
///
/// # Returns
/// * `Ok(true)` - 更新成功
/// * `Ok(false)` - 未発行・使用済み・期限切れ
pub async fn redeem(
    pool: &SqlitePool,
    id: Uuid,
    account_id: Uuid,
    password_hash: &str,
) -> PortalResult<bool> {
    let now = format_timestamp(super::now());
    let account_id = account_id.to_string();
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| PortalError::Database(format!("Failed to begin transaction: {}", e)))?;

    let claimed = sqlx::query(
        "UPDATE password_resets SET used_at = ?1
         WHERE id = ?2 AND account_id = ?3 AND used_at IS NULL AND expires_at > ?1",
    )
    .bind(&now)
    .bind(id.to_string())
    .bind(&account_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to claim password reset: {}", e)))?;

    if claimed.rows_affected() == 0 {
        tx.rollback()
            .await
            .map_err(|e| PortalError::Database(format!("Failed to rollback: {}", e)))?;
        return Ok(false);
    }

    sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(&account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to update password: {}", e)))?;

    sqlx::query("UPDATE password_resets SET used_at = ? WHERE account_id = ? AND used_at IS NULL")
        .bind(&now)
        .bind(&account_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to revoke password resets: {}", e)))?;

    tx.commit()
        .await
        .map_err(|e| PortalError::Database(format!("Failed to commit password reset: {}", e)))?;

    Ok(true)
}

/// 期限切れ・使用済みの記録を削除
pub async fn purge_stale(pool: &SqlitePool) -> PortalResult<u64> {
    let result = sqlx::query(
        "DELETE FROM password_resets WHERE used_at IS NOT NULL OR expires_at <= ?",
    )
    .bind(format_timestamp(super::now()))
    .execute(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to purge password resets: {}", e)))?;

    Ok(result.rows_affected())
}
