//! チケットAPI
//!
//! `/portal/tickets` は所有者に限定して取得し、`/admin/tickets` はスタッフが全件を扱う。
//! メッセージは必ず可視性フィルタを通してから返す。

use crate::api::AppError;
use crate::auth::AuthContext;
use crate::notify::MessageNotice;
use crate::tickets::visibility::filter_visible;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use fritz_portal_common::auth::{Identity, Profile};
use fritz_portal_common::error::{PortalError, PortalResult};
use fritz_portal_common::types::{NewTicket, Ticket, TicketMessage, TicketPriority, TicketStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// チケット一覧レスポンス
#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    /// チケット（新しい順）
    pub tickets: Vec<Ticket>,
}

/// チケット詳細レスポンス
#[derive(Debug, Serialize)]
pub struct TicketDetailResponse {
    /// チケット
    pub ticket: Ticket,
    /// 閲覧可能なメッセージ（作成順）
    pub messages: Vec<TicketMessage>,
    /// 所有者のプロフィール（管理画面のみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<Profile>,
}

/// 一覧の絞り込み
#[derive(Debug, Deserialize)]
pub struct TicketFilter {
    /// 状態
    pub status: Option<TicketStatus>,
}

/// メッセージ投稿リクエスト
#[derive(Debug, Deserialize)]
pub struct NewMessageRequest {
    /// 本文
    pub content: String,
    /// 内部メモか（スタッフのみ有効）
    #[serde(default)]
    pub is_internal: bool,
}

/// チケット更新リクエスト
#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    /// 新しい状態
    #[serde(default)]
    pub status: Option<TicketStatus>,
    /// 新しい優先度
    #[serde(default)]
    pub priority: Option<TicketPriority>,
}

fn not_found(id: Uuid) -> PortalError {
    PortalError::NotFound(format!("Ticket not found: {}", id))
}

fn validate_new_ticket(new_ticket: &NewTicket) -> PortalResult<()> {
    if new_ticket.subject.trim().is_empty() {
        return Err(PortalError::Validation("Subject is required".to_string()));
    }
    if new_ticket.description.trim().is_empty() {
        return Err(PortalError::Validation("Description is required".to_string()));
    }
    Ok(())
}

fn message_content(request: &NewMessageRequest) -> PortalResult<&str> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(PortalError::Validation("Message content is required".to_string()));
    }
    Ok(content)
}

async fn display_name(state: &AppState, identity: &Identity) -> String {
    match state.profiles.get_profile(identity.id).await {
        Ok(Some(profile)) => profile.display_name(),
        Ok(None) => identity.email.clone(),
        Err(e) => {
            tracing::warn!("Failed to load profile for {}: {}", identity.id, e);
            identity.email.clone()
        }
    }
}

/// GET /portal/tickets - 自分のチケット一覧
pub async fn list_own_tickets(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
) -> Result<Json<TicketListResponse>, AppError> {
    let identity = ctx.require_identity()?;
    let tickets = state.tickets.list_tickets_for_client(identity.id).await?;
    Ok(Json(TicketListResponse { tickets }))
}

/// POST /portal/tickets - チケット作成
///
/// 作成後、スタッフへの新規通知と本人への受付確認を送る。
///
/// # Returns
/// * `201 Created` - 作成されたチケット
/// * `400 Bad Request` - 件名・本文が空
pub async fn create_ticket(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Json(new_ticket): Json<NewTicket>,
) -> Result<(StatusCode, Json<Ticket>), AppError> {
    let identity = ctx.require_identity()?;
    validate_new_ticket(&new_ticket)?;

    let ticket = state.tickets.create_ticket(identity.id, &new_ticket).await?;
    tracing::info!(
        ticket_id = %ticket.id,
        ticket_number = %ticket.ticket_number,
        "Ticket created by {}",
        identity.email
    );

    let client_name = display_name(&state, identity).await;
    let staff = state.notifier.staff_recipients(state.profiles.as_ref()).await;
    let notifier = &state.notifier;
    notifier.dispatch(notifier.new_ticket(staff, &ticket, &client_name, &identity.email));
    notifier.dispatch(notifier.ticket_confirmation(&ticket, &client_name, &identity.email));

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// GET /portal/tickets/:id - 自分のチケット詳細
///
/// 他人のチケットと存在しないチケットはどちらも `404`。
pub async fn get_own_ticket(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetailResponse>, AppError> {
    let identity = ctx.require_identity()?;
    let ticket = state
        .tickets
        .get_ticket_for_client(id, identity.id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let messages = state.tickets.list_messages(ticket.id).await?;
    Ok(Json(TicketDetailResponse {
        ticket,
        messages: filter_visible(ctx.effective_role(), messages),
        client: None,
    }))
}

/// POST /portal/tickets/:id/messages - 自分のチケットへ返信
///
/// スタッフ以外は内部メモを作成できない（フラグは無視される）。
pub async fn post_own_message(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<NewMessageRequest>,
) -> Result<(StatusCode, Json<TicketMessage>), AppError> {
    let identity = ctx.require_identity()?;
    let content = message_content(&request)?;
    let ticket = state
        .tickets
        .get_ticket_for_client(id, identity.id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let is_internal = request.is_internal && ctx.is_staff();
    let message = state
        .tickets
        .create_message(ticket.id, identity.id, content, is_internal)
        .await?;
    tracing::info!(ticket_id = %ticket.id, internal = is_internal, "Message posted by owner");

    if !is_internal {
        notify_staff_of_reply(&state, identity, &ticket, content).await;
    }
    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /admin/tickets - 全チケット一覧
pub async fn list_all_tickets(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<TicketListResponse>, AppError> {
    ctx.require_staff()?;
    let mut tickets = state.tickets.list_tickets().await?;
    if let Some(status) = filter.status {
        tickets.retain(|ticket| ticket.status == status);
    }
    Ok(Json(TicketListResponse { tickets }))
}

/// GET /admin/tickets/:id - チケット詳細（内部メモを含む）
pub async fn get_any_ticket(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetailResponse>, AppError> {
    ctx.require_staff()?;
    let ticket = state.tickets.get_ticket(id).await?.ok_or_else(|| not_found(id))?;
    let messages = state.tickets.list_messages(ticket.id).await?;
    let client = state.profiles.get_profile(ticket.client_id).await?;

    Ok(Json(TicketDetailResponse {
        ticket,
        messages: filter_visible(ctx.effective_role(), messages),
        client,
    }))
}

/// PUT /admin/tickets/:id - 状態・優先度の更新
///
/// # Returns
/// * `200 OK` - 更新後のチケット
/// * `400 Bad Request` - `closed` からの通常遷移
/// * `404 Not Found` - チケットなし
pub async fn update_ticket(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTicketRequest>,
) -> Result<Json<Ticket>, AppError> {
    let staff = ctx.require_staff()?;
    let ticket = state
        .tickets
        .update_ticket(id, request.status, request.priority)
        .await?;
    tracing::info!(
        ticket_id = %ticket.id,
        status = %ticket.status,
        priority = %ticket.priority,
        "Ticket updated by {}",
        staff.email
    );
    Ok(Json(ticket))
}

/// POST /admin/tickets/:id/reopen - 再オープン
pub async fn reopen_ticket(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Ticket>, AppError> {
    let staff = ctx.require_staff()?;
    let ticket = state.tickets.reopen_ticket(id).await?;
    tracing::info!(ticket_id = %ticket.id, "Ticket reopened by {}", staff.email);
    Ok(Json(ticket))
}

/// POST /admin/tickets/:id/messages - スタッフ返信・内部メモ
///
/// 内部メモ以外は所有者へ通知する。
pub async fn post_staff_message(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<NewMessageRequest>,
) -> Result<(StatusCode, Json<TicketMessage>), AppError> {
    let staff = ctx.require_staff()?;
    let content = message_content(&request)?;
    let ticket = state.tickets.get_ticket(id).await?.ok_or_else(|| not_found(id))?;

    let message = state
        .tickets
        .create_message(ticket.id, staff.id, content, request.is_internal)
        .await?;
    tracing::info!(
        ticket_id = %ticket.id,
        internal = request.is_internal,
        "Staff message posted by {}",
        staff.email
    );

    if !request.is_internal && ticket.client_id != staff.id {
        notify_owner_of_reply(&state, staff, &ticket, content).await;
    }
    Ok((StatusCode::CREATED, Json(message)))
}

async fn notify_staff_of_reply(state: &AppState, sender: &Identity, ticket: &Ticket, content: &str) {
    let sender_name = display_name(state, sender).await;
    let staff = state.notifier.staff_recipients(state.profiles.as_ref()).await;
    for recipient in staff.iter().filter(|email| **email != sender.email) {
        let email = state.notifier.new_message(&MessageNotice {
            ticket,
            recipient_name: "Support Team",
            recipient_email: recipient,
            sender_name: &sender_name,
            content,
            recipient_is_client: false,
        });
        state.notifier.dispatch(email);
    }
}

async fn notify_owner_of_reply(state: &AppState, sender: &Identity, ticket: &Ticket, content: &str) {
    let owner = match state.profiles.get_profile(ticket.client_id).await {
        Ok(Some(owner)) => owner,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!("Failed to load ticket owner {}: {}", ticket.client_id, e);
            return;
        }
    };
    let Some(owner_email) = owner.email.as_deref().filter(|e| !e.is_empty()) else {
        tracing::debug!("Ticket owner {} has no email, skipping notification", owner.id);
        return;
    };

    let sender_name = display_name(state, sender).await;
    let owner_name = owner.display_name();
    let email = state.notifier.new_message(&MessageNotice {
        ticket,
        recipient_name: &owner_name,
        recipient_email: owner_email,
        sender_name: &sender_name,
        content,
        recipient_is_client: !owner.role.is_staff(),
    });
    state.notifier.dispatch(email);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_new_ticket() {
        let mut new_ticket = NewTicket {
            subject: "  ".to_string(),
            description: "details".to_string(),
            category: None,
            priority: TicketPriority::Normal,
        };
        assert!(validate_new_ticket(&new_ticket).is_err());
        new_ticket.subject = "Subject".to_string();
        assert!(validate_new_ticket(&new_ticket).is_ok());
        new_ticket.description = "\n".to_string();
        assert!(validate_new_ticket(&new_ticket).is_err());
    }

    #[test]
    fn test_message_content_is_trimmed() {
        let request = NewMessageRequest {
            content: "  hello \n".to_string(),
            is_internal: false,
        };
        assert_eq!(message_content(&request).unwrap(), "hello");
        let blank = NewMessageRequest {
            content: " ".to_string(),
            is_internal: true,
        };
        assert!(matches!(message_content(&blank), Err(PortalError::Validation(_))));
    }
}
