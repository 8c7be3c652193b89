//! 問い合わせフォーム送信内容のCRUD操作

use super::{format_timestamp, non_empty, parse_optional_timestamp, parse_timestamp, parse_uuid};
use fritz_portal_common::error::{PortalError, PortalResult};
use fritz_portal_common::types::{ContactStatus, ContactSubmission};
use sqlx::SqlitePool;
use uuid::Uuid;

const CONTACT_COLUMNS: &str = "id, name, email, company, phone, subject, message, source, status, admin_notes, created_at, responded_at";

/// 問い合わせ登録内容
#[derive(Debug, Clone)]
pub struct NewContact<'a> {
    /// 氏名
    pub name: &'a str,
    /// 返信先メールアドレス
    pub email: &'a str,
    /// 会社名
    pub company: Option<&'a str>,
    /// 電話番号
    pub phone: Option<&'a str>,
    /// 件名
    pub subject: Option<&'a str>,
    /// 本文
    pub message: &'a str,
    /// 送信元（例: contact_form）
    pub source: &'a str,
}

/// 問い合わせを保存（状態は `new`）
pub async fn create(pool: &SqlitePool, contact: &NewContact<'_>) -> PortalResult<ContactSubmission> {
    let submission = ContactSubmission {
        id: Uuid::new_v4(),
        name: contact.name.trim().to_string(),
        email: contact.email.trim().to_string(),
        company: non_empty(contact.company),
        phone: non_empty(contact.phone),
        subject: non_empty(contact.subject),
        message: contact.message.trim().to_string(),
        source: contact.source.to_string(),
        status: ContactStatus::New,
        admin_notes: None,
        created_at: super::now(),
        responded_at: None,
    };

    sqlx::query(
        "INSERT INTO contact_submissions (id, name, email, company, phone, subject, message, source, status, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(submission.id.to_string())
    .bind(&submission.name)
    .bind(&submission.email)
    .bind(&submission.company)
    .bind(&submission.phone)
    .bind(&submission.subject)
    .bind(&submission.message)
    .bind(&submission.source)
    .bind(submission.status.as_str())
    .bind(format_timestamp(submission.created_at))
    .execute(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to save contact submission: {}", e)))?;

    Ok(submission)
}

/// IDで問い合わせを検索
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> PortalResult<Option<ContactSubmission>> {
    let row = sqlx::query_as::<_, ContactRow>(&format!(
        "SELECT {} FROM contact_submissions WHERE id = ?",
        CONTACT_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to find contact submission: {}", e)))?;

    row.map(ContactRow::into_contact).transpose()
}

/// 問い合わせ一覧（新しい順）。`limit` 指定時は先頭から件数を制限する。
pub async fn list(pool: &SqlitePool, limit: Option<i64>) -> PortalResult<Vec<ContactSubmission>> {
    let rows = sqlx::query_as::<_, ContactRow>(&format!(
        "SELECT {} FROM contact_submissions ORDER BY created_at DESC, rowid DESC LIMIT ?",
        CONTACT_COLUMNS
    ))
    .bind(limit.unwrap_or(-1))
    .fetch_all(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to list contact submissions: {}", e)))?;

    rows.into_iter().map(ContactRow::into_contact).collect()
}

/// 状態と管理メモを更新
///
/// `responded` へ初めて移行した時点で `responded_at` を記録する。
pub async fn update_status(
    pool: &SqlitePool,
    id: Uuid,
    status: ContactStatus,
    admin_notes: Option<&str>,
) -> PortalResult<ContactSubmission> {
    let mut contact = find_by_id(pool, id)
        .await?
        .ok_or_else(|| PortalError::NotFound(format!("Contact submission not found: {}", id)))?;

    if status == ContactStatus::Responded && contact.responded_at.is_none() {
        contact.responded_at = Some(super::now());
    }
    contact.status = status;
    contact.admin_notes = non_empty(admin_notes);

    sqlx::query(
        "UPDATE contact_submissions SET status = ?, admin_notes = ?, responded_at = ? WHERE id = ?",
    )
    .bind(contact.status.as_str())
    .bind(&contact.admin_notes)
    .bind(contact.responded_at.map(format_timestamp))
    .bind(id.to_string())
    .execute(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to update contact submission: {}", e)))?;

    Ok(contact)
}

/// 指定状態の問い合わせ数
pub async fn count_by_status(pool: &SqlitePool, status: ContactStatus) -> PortalResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM contact_submissions WHERE status = ?")
        .bind(status.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to count contact submissions: {}", e)))
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: String,
    name: String,
    email: String,
    company: Option<String>,
    phone: Option<String>,
    subject: Option<String>,
    message: String,
    source: String,
    status: String,
    admin_notes: Option<String>,
    created_at: String,
    responded_at: Option<String>,
}

impl ContactRow {
    fn into_contact(self) -> PortalResult<ContactSubmission> {
        let status = self
            .status
            .parse::<ContactStatus>()
            .map_err(|e| PortalError::Database(e.to_string()))?;

        Ok(ContactSubmission {
            id: parse_uuid(&self.id)?,
            name: self.name,
            email: self.email,
            company: self.company,
            phone: self.phone,
            subject: self.subject,
            message: self.message,
            source: self.source,
            status,
            admin_notes: self.admin_notes,
            created_at: parse_timestamp(&self.created_at)?,
            responded_at: parse_optional_timestamp(self.responded_at)?,
        })
    }
}
