//! チケットCRUD操作

use super::{
    format_timestamp, non_empty, parse_optional_timestamp, parse_optional_uuid, parse_timestamp,
    parse_uuid,
};
use fritz_portal_common::error::{PortalError, PortalResult};
use fritz_portal_common::types::{NewTicket, Ticket, TicketPriority, TicketStatus};
use sqlx::SqlitePool;
use uuid::Uuid;

const TICKET_COLUMNS: &str = "id, ticket_number, client_id, subject, description, status, priority, category, assigned_to, created_at, updated_at, resolved_at";

/// チケットを作成
///
/// チケット番号（TKT-000001形式）は同一INSERT文内で採番する。
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `client_id` - 作成者（所有者）のID
/// * `new_ticket` - 作成内容
pub async fn create(pool: &SqlitePool, client_id: Uuid, new_ticket: &NewTicket) -> PortalResult<Ticket> {
    let id = Uuid::new_v4();
    let now = format_timestamp(super::now());

    sqlx::query(
        "INSERT INTO tickets (id, ticket_number, client_id, subject, description, status, priority, category, created_at, updated_at)
         VALUES (
             ?,
             printf('TKT-%06d', (SELECT COALESCE(MAX(CAST(SUBSTR(ticket_number, 5) AS INTEGER)), 0) + 1 FROM tickets)),
             ?, ?, ?, 'open', ?, ?, ?, ?
         )",
    )
    .bind(id.to_string())
    .bind(client_id.to_string())
    .bind(new_ticket.subject.trim())
    .bind(non_empty(Some(&new_ticket.description)))
    .bind(new_ticket.priority.as_str())
    .bind(non_empty(new_ticket.category.as_deref()))
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to create ticket: {}", e)))?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| PortalError::Internal(format!("Ticket {} vanished after insert", id)))
}

/// IDでチケットを検索（スタッフ用、所有者を問わない）
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> PortalResult<Option<Ticket>> {
    let row = sqlx::query_as::<_, TicketRow>(&format!(
        "SELECT {} FROM tickets WHERE id = ?",
        TICKET_COLUMNS
    ))
    .bind(id.to_string())
    .fetch_optional(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to find ticket: {}", e)))?;

    row.map(TicketRow::into_ticket).transpose()
}

/// 所有者を限定してチケットを検索
///
/// 存在しない場合と他人のチケットの場合はどちらも `None` を返す。
pub async fn find_for_client(
    pool: &SqlitePool,
    id: Uuid,
    client_id: Uuid,
) -> PortalResult<Option<Ticket>> {
    let row = sqlx::query_as::<_, TicketRow>(&format!(
        "SELECT {} FROM tickets WHERE id = ? AND client_id = ?",
        TICKET_COLUMNS
    ))
    .bind(id.to_string())
    .bind(client_id.to_string())
    .fetch_optional(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to find ticket: {}", e)))?;

    row.map(TicketRow::into_ticket).transpose()
}

/// すべてのチケットを取得（新しい順）
pub async fn list(pool: &SqlitePool) -> PortalResult<Vec<Ticket>> {
    let rows = sqlx::query_as::<_, TicketRow>(&format!(
        "SELECT {} FROM tickets ORDER BY created_at DESC, rowid DESC",
        TICKET_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to list tickets: {}", e)))?;

    rows.into_iter().map(TicketRow::into_ticket).collect()
}

/// 所有者のチケットを取得（新しい順）
pub async fn list_for_client(pool: &SqlitePool, client_id: Uuid) -> PortalResult<Vec<Ticket>> {
    let rows = sqlx::query_as::<_, TicketRow>(&format!(
        "SELECT {} FROM tickets WHERE client_id = ? ORDER BY created_at DESC, rowid DESC",
        TICKET_COLUMNS
    ))
    .bind(client_id.to_string())
    .fetch_all(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to list tickets: {}", e)))?;

    rows.into_iter().map(TicketRow::into_ticket).collect()
}

/// 直近のチケットを取得
pub async fn list_recent(pool: &SqlitePool, limit: i64) -> PortalResult<Vec<Ticket>> {
    let rows = sqlx::query_as::<_, TicketRow>(&format!(
        "SELECT {} FROM tickets ORDER BY created_at DESC, rowid DESC LIMIT ?",
        TICKET_COLUMNS
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to list recent tickets: {}", e)))?;

    rows.into_iter().map(TicketRow::into_ticket).collect()
}

/// 状態・優先度・担当者・解決日時を保存
///
/// 読み込み時の状態（`expected`）と `status`・`updated_at` が一致する行だけを更新する。
/// 間に別の更新が入っていれば `Conflict` を返し、何も書き込まない。
/// 遷移の妥当性は呼び出し側（`tickets::lifecycle`）で検証済みであること。
///
/// # Arguments
/// * `expected` - 遷移の元にした読み込み時のチケット
/// * `ticket` - 保存する新しい状態
pub async fn save_state(pool: &SqlitePool, expected: &Ticket, ticket: &Ticket) -> PortalResult<()> {
    let result = sqlx::query(
        "UPDATE tickets
         SET status = ?, priority = ?, assigned_to = ?, resolved_at = ?, updated_at = ?
         WHERE id = ? AND status = ? AND updated_at = ?",
    )
    .bind(ticket.status.as_str())
    .bind(ticket.priority.as_str())
    .bind(ticket.assigned_to.map(|id| id.to_string()))
    .bind(ticket.resolved_at.map(format_timestamp))
    .bind(format_timestamp(ticket.updated_at))
    .bind(ticket.id.to_string())
    .bind(expected.status.as_str())
    .bind(format_timestamp(expected.updated_at))
    .execute(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to update ticket: {}", e)))?;

    if result.rows_affected() == 0 {
        return match find_by_id(pool, ticket.id).await? {
            Some(_) => Err(PortalError::Conflict(format!(
                "Ticket {} was modified concurrently",
                ticket.ticket_number
            ))),
            None => Err(PortalError::NotFound(format!("Ticket not found: {}", ticket.id))),
        };
    }
    Ok(())
}

/// 全チケット数
pub async fn count(pool: &SqlitePool) -> PortalResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets")
        .fetch_one(pool)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to count tickets: {}", e)))
}

/// 指定状態のチケット数
pub async fn count_by_status(pool: &SqlitePool, status: TicketStatus) -> PortalResult<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets WHERE status = ?")
        .bind(status.as_str())
        .fetch_one(pool)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to count tickets: {}", e)))
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: String,
    ticket_number: String,
    client_id: String,
    subject: String,
    description: Option<String>,
    status: String,
    priority: String,
    category: Option<String>,
    assigned_to: Option<String>,
    created_at: String,
    updated_at: String,
    resolved_at: Option<String>,
}

impl TicketRow {
    fn into_ticket(self) -> PortalResult<Ticket> {
        let status = self
            .status
            .parse::<TicketStatus>()
            .map_err(|e| PortalError::Database(e.to_string()))?;
        let priority = self
            .priority
            .parse::<TicketPriority>()
            .map_err(|e| PortalError::Database(e.to_string()))?;

        Ok(Ticket {
            id: parse_uuid(&self.id)?,
            ticket_number: self.ticket_number,
            client_id: parse_uuid(&self.client_id)?,
            subject: self.subject,
            description: self.description,
            status,
            priority,
            category: self.category,
            assigned_to: parse_optional_uuid(self.assigned_to)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            resolved_at: parse_optional_timestamp(self.resolved_at)?,
        })
    }
}
