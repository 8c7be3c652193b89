//! 管理ダッシュボードAPI

use crate::api::AppError;
use crate::auth::AuthContext;
use crate::db;
use crate::AppState;
use axum::{extract::State, Extension, Json};
use fritz_portal_common::auth::Role;
use fritz_portal_common::types::{ContactStatus, ContactSubmission, Ticket, TicketStatus};
use serde::Serialize;

/// 最近の一覧に出す件数
const RECENT_LIMIT: i64 = 5;

/// ダッシュボード統計
#[derive(Debug, Serialize)]
pub struct DashboardStats {
    /// 全チケット数
    pub total_tickets: i64,
    /// 対応中チケット数（open + in_progress）
    pub open_tickets: i64,
    /// クライアント数
    pub total_clients: i64,
    /// 未読の問い合わせ数
    pub new_contacts: i64,
    /// 最近のチケット
    pub recent_tickets: Vec<Ticket>,
    /// 最近の問い合わせ
    pub recent_contacts: Vec<ContactSubmission>,
}

/// GET /admin - ダッシュボード統計
pub async fn get_stats(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    ctx.require_staff()?;
    let pool = &state.db_pool;

    let total_tickets = db::tickets::count(pool).await?;
    let open_tickets = db::tickets::count_by_status(pool, TicketStatus::Open).await?
        + db::tickets::count_by_status(pool, TicketStatus::InProgress).await?;
    let total_clients = db::profiles::count_by_role(pool, Role::Client).await?;
    let new_contacts = db::contacts::count_by_status(pool, ContactStatus::New).await?;
    let recent_tickets = db::tickets::list_recent(pool, RECENT_LIMIT).await?;
    let recent_contacts = db::contacts::list(pool, Some(RECENT_LIMIT)).await?;

    Ok(Json(DashboardStats {
        total_tickets,
        open_tickets,
        total_clients,
        new_contacts,
        recent_tickets,
        recent_contacts,
    }))
}
