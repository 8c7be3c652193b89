//! アカウントCRUD操作
//!
//! アカウント作成時は同一トランザクションでプロフィールも作成する。

use super::{format_timestamp, non_empty, parse_optional_timestamp, parse_timestamp, parse_uuid};
use fritz_portal_common::auth::{Account, Profile, Role};
use fritz_portal_common::error::{PortalError, PortalResult};
use sqlx::SqlitePool;
use uuid::Uuid;

/// アカウント登録内容
#[derive(Debug, Clone, Default)]
pub struct NewAccount<'a> {
    /// メールアドレス
    pub email: &'a str,
    /// bcryptハッシュ化されたパスワード
    pub password_hash: &'a str,
    /// 名
    pub first_name: Option<&'a str>,
    /// 姓
    pub last_name: Option<&'a str>,
    /// 会社名
    pub company_name: Option<&'a str>,
}

/// アカウントとプロフィールを1トランザクションで作成
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `new_account` - 登録内容
/// * `role` - 初期ロール（通常は `Role::Client`）
///
/// # Returns
/// * `Ok((Account, Profile))` - 作成されたアカウントとプロフィール
/// * `Err(PortalError::Conflict)` - メールアドレス重複
pub async fn create_with_profile(
    pool: &SqlitePool,
    new_account: &NewAccount<'_>,
    role: Role,
) -> PortalResult<(Account, Profile)> {
    let id = Uuid::new_v4();
    let now = super::now();
    let email = new_account.email.trim().to_string();
    let first_name = non_empty(new_account.first_name);
    let last_name = non_empty(new_account.last_name);
    let company_name = non_empty(new_account.company_name);

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| PortalError::Database(format!("Failed to begin transaction: {}", e)))?;

    sqlx::query(
        "INSERT INTO accounts (id, email, password_hash, created_at, last_login)
         VALUES (?, ?, ?, ?, NULL)",
    )
    .bind(id.to_string())
    .bind(&email)
    .bind(new_account.password_hash)
    .bind(format_timestamp(now))
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            PortalError::Conflict(format!("Email '{}' is already registered", email))
        } else {
            PortalError::Database(format!("Failed to create account: {}", e))
        }
    })?;

    sqlx::query(
        "INSERT INTO profiles (id, email, first_name, last_name, role, company_name, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(&email)
    .bind(&first_name)
    .bind(&last_name)
    .bind(role.as_str())
    .bind(&company_name)
    .bind(format_timestamp(now))
    .bind(format_timestamp(now))
    .execute(&mut *tx)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to create profile: {}", e)))?;

    tx.commit()
        .await
        .map_err(|e| PortalError::Database(format!("Failed to commit account: {}", e)))?;

    let account = Account {
        id,
        email: email.clone(),
        password_hash: new_account.password_hash.to_string(),
        created_at: now,
        last_login: None,
    };
    let profile = Profile {
        id,
        email: Some(email),
        first_name,
        last_name,
        role,
        company_name,
        phone: None,
        industry: None,
        avatar_url: None,
        created_at: now,
        updated_at: now,
    };

    Ok((account, profile))
}

/// メールアドレスでアカウントを検索（大文字小文字を区別しない）
pub async fn find_by_email(pool: &SqlitePool, email: &str) -> PortalResult<Option<Account>> {
    let row = sqlx::query_as::<_, AccountRow>(
        "SELECT id, email, password_hash, created_at, last_login FROM accounts WHERE email = ?",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to find account: {}", e)))?;

    row.map(AccountRow::into_account).transpose()
}

/// IDでアカウントを検索
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> PortalResult<Option<Account>> {
    let row = sqlx::query_as::<_, AccountRow>(
        "SELECT id, email, password_hash, created_at, last_login FROM accounts WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to find account: {}", e)))?;

    row.map(AccountRow::into_account).transpose()
}

/// 最終ログイン日時を更新
pub async fn update_last_login(pool: &SqlitePool, id: Uuid) -> PortalResult<()> {
    sqlx::query("UPDATE accounts SET last_login = ? WHERE id = ?")
        .bind(format_timestamp(super::now()))
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to update last login: {}", e)))?;

    Ok(())
}

/// アカウントと関連データをすべて削除
///
/// 削除順: チケットメッセージ → ファイル → チケット → 再設定リンク → プロフィール → アカウント。
/// 本人のチケットに付いた他者のメッセージ、および本人が他チケットに書いたメッセージも削除する。
///
/// # Returns
/// * `Ok(true)` - 削除成功
/// * `Ok(false)` - アカウントが存在しない
pub async fn delete_cascade(pool: &SqlitePool, id: Uuid) -> PortalResult<bool> {
    let id = id.to_string();
    let mut tx = pool
        .begin()
        .await
        .map_err(|e| PortalError::Database(format!("Failed to begin transaction: {}", e)))?;

    let statements = [
        "DELETE FROM ticket_messages WHERE sender_id = ?1
            OR ticket_id IN (SELECT id FROM tickets WHERE client_id = ?1)",
        "DELETE FROM files WHERE uploaded_by = ?1
            OR ticket_id IN (SELECT id FROM tickets WHERE client_id = ?1)",
        "DELETE FROM tickets WHERE client_id = ?1",
        "UPDATE tickets SET assigned_to = NULL WHERE assigned_to = ?1",
        "DELETE FROM password_resets WHERE account_id = ?1",
        "DELETE FROM profiles WHERE id = ?1",
    ];
    for statement in statements {
        sqlx::query(statement)
            .bind(&id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PortalError::Database(format!("Failed to delete user data: {}", e)))?;
    }

    let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(&id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to delete account: {}", e)))?;

    if result.rows_affected() == 0 {
        tx.rollback()
            .await
            .map_err(|e| PortalError::Database(format!("Failed to rollback: {}", e)))?;
        return Ok(false);
    }

    tx.commit()
        .await
        .map_err(|e| PortalError::Database(format!("Failed to commit deletion: {}", e)))?;

    Ok(true)
}

/// アカウント数を取得
pub async fn count(pool: &SqlitePool) -> PortalResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM accounts")
        .fetch_one(pool)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to count accounts: {}", e)))
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: String,
    email: String,
    password_hash: String,
    created_at: String,
    last_login: Option<String>,
}

impl AccountRow {
    fn into_account(self) -> PortalResult<Account> {
        Ok(Account {
            id: parse_uuid(&self.id)?,
            email: self.email,
            password_hash: self.password_hash,
            created_at: parse_timestamp(&self.created_at)?,
            last_login: parse_optional_timestamp(self.last_login)?,
        })
    }
}
