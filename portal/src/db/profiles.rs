//! プロフィールCRUD操作

use super::{format_timestamp, non_empty, parse_timestamp, parse_uuid};
use fritz_portal_common::auth::{Profile, ProfileUpdate, Role};
use fritz_portal_common::error::{PortalError, PortalResult};
use sqlx::SqlitePool;
use uuid::Uuid;

const PROFILE_COLUMNS: &str = "id, email, first_name, last_name, role, company_name, phone, industry, avatar_url, created_at, updated_at";

/// IDでプロフィールを検索
///
/// # Returns
/// * `Ok(Some(Profile))` - プロフィールが見つかった
/// * `Ok(None)` - プロフィールが存在しない
/// * `Err(PortalError)` - 検索失敗（不正なロール値を含む）
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> PortalResult<Option<Profile>> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {} FROM profiles WHERE id = ?",
        PROFILE_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to find profile: {}", e)))?;

    row.map(ProfileRow::into_profile).transpose()
}

/// すべてのプロフィールを取得（新しい順）
pub async fn list(pool: &SqlitePool) -> PortalResult<Vec<Profile>> {
    let rows = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {} FROM profiles ORDER BY created_at DESC, rowid DESC",
        PROFILE_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to list profiles: {}", e)))?;

    rows.into_iter().map(ProfileRow::into_profile).collect()
}

/// 本人が編集できる項目を更新
///
/// 編集可能項目はすべて置き換える（未指定・空文字はNULL）。ロールは変更しない。
pub async fn update(pool: &SqlitePool, id: Uuid, update: &ProfileUpdate) -> PortalResult<Profile> {
    let result = sqlx::query(
        "UPDATE profiles
         SET first_name = ?, last_name = ?, company_name = ?, phone = ?, industry = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(non_empty(update.first_name.as_deref()))
    .bind(non_empty(update.last_name.as_deref()))
    .bind(non_empty(update.company_name.as_deref()))
    .bind(non_empty(update.phone.as_deref()))
    .bind(non_empty(update.industry.as_deref()))
    .bind(format_timestamp(super::now()))
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to update profile: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(PortalError::NotFound(format!("Profile not found: {}", id)));
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| PortalError::NotFound(format!("Profile not found: {}", id)))
}

/// ロールを変更
pub async fn set_role(pool: &SqlitePool, id: Uuid, role: Role) -> PortalResult<Profile> {
    let result = sqlx::query("UPDATE profiles SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(format_timestamp(super::now()))
        .bind(id.to_string())
        .execute(pool)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to update role: {}", e)))?;

    if result.rows_affected() == 0 {
        return Err(PortalError::NotFound(format!("Profile not found: {}", id)));
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| PortalError::NotFound(format!("Profile not found: {}", id)))
}

/// スタッフ（admin / superadmin）のメールアドレス一覧
pub async fn staff_emails(pool: &SqlitePool) -> PortalResult<Vec<String>> {
    sqlx::query_scalar::<_, String>(
        "SELECT email FROM profiles
         WHERE role IN ('admin', 'superadmin') AND email IS NOT NULL AND email != ''
         ORDER BY created_at",
    )
    .fetch_all(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to list staff emails: {}", e)))
}

/// 指定ロールのプロフィール数
pub async fn count_by_role(pool: &SqlitePool, role: Role) -> PortalResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM profiles WHERE role = ?")
        .bind(role.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to count profiles: {}", e)))
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    role: String,
    company_name: Option<String>,
    phone: Option<String>,
    industry: Option<String>,
    avatar_url: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ProfileRow {
    fn into_profile(self) -> PortalResult<Profile> {
        let role = self
            .role
            .parse::<Role>()
            .map_err(|e| PortalError::Database(format!("Invalid role in profile {}: {}", self.id, e)))?;

        Ok(Profile {
            id: parse_uuid(&self.id)?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role,
            company_name: self.company_name,
            phone: self.phone,
            industry: self.industry,
            avatar_url: self.avatar_url,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}
