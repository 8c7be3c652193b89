//! チケットメッセージCRUD操作

use super::{format_timestamp, parse_timestamp, parse_uuid};
use fritz_portal_common::error::{PortalError, PortalResult};
use fritz_portal_common::types::TicketMessage;
use sqlx::SqlitePool;
use uuid::Uuid;

/// メッセージを作成し、チケットの更新日時を進める
///
/// # Arguments
/// * `pool` - データベース接続プール
/// * `ticket_id` - 対象チケットID
/// * `sender_id` - 送信者ID
/// * `content` - 本文
/// * `is_internal` - スタッフ専用メモかどうか
pub async fn create(
    pool: &SqlitePool,
    ticket_id: Uuid,
    sender_id: Uuid,
    content: &str,
    is_internal: bool,
) -> PortalResult<TicketMessage> {
    let message = TicketMessage {
        id: Uuid::new_v4(),
        ticket_id,
        sender_id,
        content: content.trim().to_string(),
        is_internal,
        created_at: super::now(),
    };
    let created_at = format_timestamp(message.created_at);

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| PortalError::Database(format!("Failed to begin transaction: {}", e)))?;

    sqlx::query(
        "INSERT INTO ticket_messages (id, ticket_id, sender_id, content, is_internal, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(message.id.to_string())
    .bind(ticket_id.to_string())
    .bind(sender_id.to_string())
    .bind(&message.content)
    .bind(is_internal)
    .bind(&created_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to create message: {}", e)))?;

    sqlx::query("UPDATE tickets SET updated_at = ? WHERE id = ?")
        .bind(&created_at)
        .bind(ticket_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| PortalError::Database(format!("Failed to touch ticket: {}", e)))?;

    tx.commit()
        .await
        .map_err(|e| PortalError::Database(format!("Failed to commit message: {}", e)))?;

    Ok(message)
}

/// チケットの全メッセージを作成順に取得（内部メモを含む）
///
/// 同一時刻のメッセージは挿入順に並ぶ。
pub async fn list_for_ticket(pool: &SqlitePool, ticket_id: Uuid) -> PortalResult<Vec<TicketMessage>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT id, ticket_id, sender_id, content, is_internal, created_at
         FROM ticket_messages
         WHERE ticket_id = ?
         ORDER BY created_at ASC, rowid ASC",
    )
    .bind(ticket_id.to_string())
    .fetch_all(pool)
    .await
    .map_err(|e| PortalError::Database(format!("Failed to list messages: {}", e)))?;

    rows.into_iter().map(MessageRow::into_message).collect()
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    ticket_id: String,
    sender_id: String,
    content: String,
    is_internal: bool,
    created_at: String,
}

impl MessageRow {
    fn into_message(self) -> PortalResult<TicketMessage> {
        Ok(TicketMessage {
            id: parse_uuid(&self.id)?,
            ticket_id: parse_uuid(&self.ticket_id)?,
            sender_id: parse_uuid(&self.sender_id)?,
            content: self.content,
            is_internal: self.is_internal,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
