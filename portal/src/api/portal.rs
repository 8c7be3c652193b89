//! クライアントポータルAPI（概要・ファイル・設定）

use crate::api::AppError;
use crate::auth::AuthContext;
use crate::AppState;
use axum::{extract::State, Extension, Json};
use fritz_portal_common::auth::{Profile, ProfileUpdate};
use fritz_portal_common::error::PortalError;
use fritz_portal_common::types::{PortalFile, Ticket, TicketStatus};
use serde::Serialize;
use uuid::Uuid;

/// 概要に表示する最近のチケット数
const RECENT_TICKETS: usize = 5;

/// チケット件数
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct TicketCounts {
    /// 全件
    pub total: usize,
    /// 対応中（open / in_progress）
    pub active: usize,
    /// 返答待ち
    pub waiting: usize,
    /// 解決済み（resolved / closed）
    pub resolved: usize,
}

impl TicketCounts {
    fn from_tickets(tickets: &[Ticket]) -> Self {
        let mut counts = TicketCounts {
            total: tickets.len(),
            ..Default::default()
        };
        for ticket in tickets {
            match ticket.status {
                TicketStatus::Open | TicketStatus::InProgress => counts.active += 1,
                TicketStatus::Waiting => counts.waiting += 1,
                TicketStatus::Resolved | TicketStatus::Closed => counts.resolved += 1,
            }
        }
        counts
    }
}

/// ポータル概要レスポンス
#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    /// 本人のプロフィール
    pub profile: Profile,
    /// チケット件数
    pub ticket_counts: TicketCounts,
    /// 最近作成されたチケット（作成日時の新しい順）
    pub recent_tickets: Vec<Ticket>,
}

/// ファイル一覧レスポンス
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    /// アップロード済みファイル
    pub files: Vec<PortalFile>,
}

async fn own_profile(state: &AppState, id: Uuid) -> Result<Profile, AppError> {
    state
        .profiles
        .get_profile(id)
        .await?
        .ok_or_else(|| AppError(PortalError::NotFound(format!("Profile not found: {}", id))))
}

/// GET /portal - ポータル概要
pub async fn overview(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
) -> Result<Json<OverviewResponse>, AppError> {
    let identity = ctx.require_identity()?;
    let profile = own_profile(&state, identity.id).await?;
    let tickets = state.tickets.list_tickets_for_client(identity.id).await?;

    let ticket_counts = TicketCounts::from_tickets(&tickets);
    let recent_tickets = tickets.into_iter().take(RECENT_TICKETS).collect();
    Ok(Json(OverviewResponse {
        profile,
        ticket_counts,
        recent_tickets,
    }))
}

/// GET /portal/files - 自分がアップロードしたファイル
pub async fn list_files(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, AppError> {
    let identity = ctx.require_identity()?;
    let files = crate::db::files::list_for_uploader(&state.db_pool, identity.id).await?;
    Ok(Json(FileListResponse { files }))
}

/// GET /portal/settings - 自分のプロフィール
pub async fn get_settings(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    let identity = ctx.require_identity()?;
    Ok(Json(own_profile(&state, identity.id).await?))
}

/// PUT /portal/settings - 自分のプロフィール更新
///
/// ロールはここでは変更できない。
pub async fn update_settings(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, AppError> {
    let identity = ctx.require_identity()?;
    let profile = state.profiles.update_profile(identity.id, &update).await?;
    tracing::info!("Profile updated: {}", identity.email);
    Ok(Json(profile))
}
