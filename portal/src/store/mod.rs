//! 型付きリポジトリインターフェース
//!
//! セッションゲートとハンドラーはこのトレイト経由でプロフィール・チケットを参照する。
//! 本番は [`SqliteStore`]、テストでは失敗を返す偽実装などに差し替える。

use crate::db;
use crate::tickets::lifecycle;
use async_trait::async_trait;
use fritz_portal_common::auth::{Profile, ProfileUpdate, Role};
use fritz_portal_common::error::{PortalError, PortalResult};
use fritz_portal_common::types::{NewTicket, Ticket, TicketMessage, TicketPriority, TicketStatus};
use sqlx::SqlitePool;
use uuid::Uuid;

/// 同時更新と衝突したときの書き込み試行回数
const MAX_WRITE_ATTEMPTS: u32 = 3;

/// プロフィールストア
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// プロフィールを取得（存在しなければ `None`）
    async fn get_profile(&self, id: Uuid) -> PortalResult<Option<Profile>>;

    /// 本人が編集できる項目を更新
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> PortalResult<Profile>;

    /// ロールを変更
    async fn set_role(&self, id: Uuid, role: Role) -> PortalResult<Profile>;

    /// 全プロフィール
    async fn list_profiles(&self) -> PortalResult<Vec<Profile>>;

    /// スタッフのメールアドレス
    async fn staff_emails(&self) -> PortalResult<Vec<String>>;
}

/// チケット・メッセージストア
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// チケットを取得（所有者を問わない）
    async fn get_ticket(&self, id: Uuid) -> PortalResult<Option<Ticket>>;

    /// 所有者を限定してチケットを取得
    async fn get_ticket_for_client(&self, id: Uuid, client_id: Uuid) -> PortalResult<Option<Ticket>>;

    /// 全チケット（新しい順）
    async fn list_tickets(&self) -> PortalResult<Vec<Ticket>>;

    /// 所有者のチケット（新しい順）
    async fn list_tickets_for_client(&self, client_id: Uuid) -> PortalResult<Vec<Ticket>>;

    /// チケットを作成
    async fn create_ticket(&self, client_id: Uuid, new_ticket: &NewTicket) -> PortalResult<Ticket>;

    /// 状態・優先度を更新（状態遷移規則を適用）
    async fn update_ticket(
        &self,
        id: Uuid,
        status: Option<TicketStatus>,
        priority: Option<TicketPriority>,
    ) -> PortalResult<Ticket>;

    /// クローズ済みチケットを再オープン
    async fn reopen_ticket(&self, id: Uuid) -> PortalResult<Ticket>;

    /// チケットの全メッセージ（作成順、内部メモを含む）
    async fn list_messages(&self, ticket_id: Uuid) -> PortalResult<Vec<TicketMessage>>;

    /// メッセージを作成
    async fn create_message(
        &self,
        ticket_id: Uuid,
        sender_id: Uuid,
        content: &str,
        is_internal: bool,
    ) -> PortalResult<TicketMessage>;
}

/// SQLite実装
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// 接続プールからストアを作成
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn require_ticket(&self, id: Uuid) -> PortalResult<Ticket> {
        db::tickets::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| PortalError::NotFound(format!("Ticket not found: {}", id)))
    }

    /// 最新のチケットに `apply` を適用して保存する
    ///
    /// 読み込みから保存までの間に別の更新が入った場合は読み直して再適用する。
    /// 再適用のたびに遷移規則を最新の状態で検証し直す。
    async fn write_ticket<F>(&self, id: Uuid, apply: F) -> PortalResult<Ticket>
    where
        F: Fn(&Ticket) -> PortalResult<Ticket> + Send + Sync,
    {
        let mut attempt = 1;
        loop {
            let current = self.require_ticket(id).await?;
            let updated = apply(&current)?;
            if updated == current {
                return Ok(current);
            }
            match db::tickets::save_state(&self.pool, &current, &updated).await {
                Err(PortalError::Conflict(reason)) if attempt < MAX_WRITE_ATTEMPTS => {
                    tracing::debug!("Retrying ticket write ({}): {}", attempt, reason);
                    attempt += 1;
                }
                result => return result.map(|_| updated),
            }
        }
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn get_profile(&self, id: Uuid) -> PortalResult<Option<Profile>> {
        db::profiles::find_by_id(&self.pool, id).await
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> PortalResult<Profile> {
        db::profiles::update(&self.pool, id, update).await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> PortalResult<Profile> {
        db::profiles::set_role(&self.pool, id, role).await
    }

    async fn list_profiles(&self) -> PortalResult<Vec<Profile>> {
        db::profiles::list(&self.pool).await
    }

    async fn staff_emails(&self) -> PortalResult<Vec<String>> {
        db::profiles::staff_emails(&self.pool).await
    }
}

#[async_trait]
impl TicketStore for SqliteStore {
    async fn get_ticket(&self, id: Uuid) -> PortalResult<Option<Ticket>> {
        db::tickets::find_by_id(&self.pool, id).await
    }

    async fn get_ticket_for_client(&self, id: Uuid, client_id: Uuid) -> PortalResult<Option<Ticket>> {
        db::tickets::find_for_client(&self.pool, id, client_id).await
    }

    async fn list_tickets(&self) -> PortalResult<Vec<Ticket>> {
        db::tickets::list(&self.pool).await
    }

    async fn list_tickets_for_client(&self, client_id: Uuid) -> PortalResult<Vec<Ticket>> {
        db::tickets::list_for_client(&self.pool, client_id).await
    }

    async fn create_ticket(&self, client_id: Uuid, new_ticket: &NewTicket) -> PortalResult<Ticket> {
        db::tickets::create(&self.pool, client_id, new_ticket).await
    }

    async fn update_ticket(
        &self,
        id: Uuid,
        status: Option<TicketStatus>,
        priority: Option<TicketPriority>,
    ) -> PortalResult<Ticket> {
        self.write_ticket(id, |current| {
            let mut updated = match status {
                Some(status) => lifecycle::transition(current, status, db::now())?,
                None => current.clone(),
            };
            if let Some(priority) = priority {
                updated.priority = priority;
            }
            if updated != *current {
                updated.updated_at = db::now();
            }
            Ok(updated)
        })
        .await
    }

    async fn reopen_ticket(&self, id: Uuid) -> PortalResult<Ticket> {
        self.write_ticket(id, |current| lifecycle::reopen(current, db::now()))
            .await
    }

    async fn list_messages(&self, ticket_id: Uuid) -> PortalResult<Vec<TicketMessage>> {
        db::messages::list_for_ticket(&self.pool, ticket_id).await
    }

    async fn create_message(
        &self,
        ticket_id: Uuid,
        sender_id: Uuid,
        content: &str,
        is_internal: bool,
    ) -> PortalResult<TicketMessage> {
        db::messages::create(&self.pool, ticket_id, sender_id, content, is_internal).await
    }
}
