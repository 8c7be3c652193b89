//! 共通型定義
//!
//! チケット、チケットメッセージ、問い合わせ、ファイルのコアデータ型

use crate::error::PortalError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// チケット状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// 受付済み
    Open,
    /// 対応中
    InProgress,
    /// 顧客の返信待ち
    Waiting,
    /// 解決済み
    Resolved,
    /// クローズ
    Closed,
}

impl TicketStatus {
    /// すべての状態
    pub const ALL: [TicketStatus; 5] = [
        TicketStatus::Open,
        TicketStatus::InProgress,
        TicketStatus::Waiting,
        TicketStatus::Resolved,
        TicketStatus::Closed,
    ];

    /// 保存・送信用の文字列表現
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Waiting => "waiting",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }

    /// 未完了（ダッシュボードの「対応中チケット」集計対象）か
    pub fn is_active(self) -> bool {
        matches!(self, TicketStatus::Open | TicketStatus::InProgress)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| PortalError::Validation(format!("Unknown ticket status: {}", s)))
    }
}

/// チケット優先度
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl TicketPriority {
    /// 保存・送信用の文字列表現
    pub fn as_str(self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Normal => "normal",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TicketPriority::Low),
            "normal" => Ok(TicketPriority::Normal),
            "high" => Ok(TicketPriority::High),
            "urgent" => Ok(TicketPriority::Urgent),
            other => Err(PortalError::Validation(format!(
                "Unknown ticket priority: {}",
                other
            ))),
        }
    }
}

/// サポートチケット
///
/// `client_id` は作成後に変更しない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    /// 表示用番号（例: TKT-000042）
    pub ticket_number: String,
    pub client_id: Uuid,
    pub subject: String,
    pub description: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub category: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// チケット作成内容
#[derive(Debug, Clone, Deserialize)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: TicketPriority,
}

/// チケットメッセージ（コメント）
///
/// `is_internal = true` のメッセージはスタッフにのみ表示する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketMessage {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// 問い合わせ状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    New,
    Read,
    Responded,
    Archived,
}

impl ContactStatus {
    /// 保存・送信用の文字列表現
    pub fn as_str(self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Read => "read",
            ContactStatus::Responded => "responded",
            ContactStatus::Archived => "archived",
        }
    }
}

impl FromStr for ContactStatus {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ContactStatus::New),
            "read" => Ok(ContactStatus::Read),
            "responded" => Ok(ContactStatus::Responded),
            "archived" => Ok(ContactStatus::Archived),
            other => Err(PortalError::Validation(format!(
                "Unknown contact status: {}",
                other
            ))),
        }
    }
}

/// 問い合わせフォームの送信内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    /// 送信元（例: contact_form）
    pub source: String,
    pub status: ContactStatus,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// アップロード済みファイルのメタデータ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortalFile {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub ticket_id: Option<Uuid>,
    pub filename: String,
    pub original_filename: String,
    pub storage_path: String,
    pub file_size: Option<i64>,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
}
