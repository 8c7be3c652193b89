//! 問い合わせ管理API（スタッフ専用）

use crate::api::AppError;
use crate::auth::AuthContext;
use crate::db;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use fritz_portal_common::error::PortalError;
use fritz_portal_common::types::{ContactStatus, ContactSubmission};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 問い合わせ一覧レスポンス
#[derive(Debug, Serialize)]
pub struct ContactListResponse {
    /// 問い合わせ（新しい順）
    pub contacts: Vec<ContactSubmission>,
}

/// 問い合わせ更新リクエスト
#[derive(Debug, Deserialize)]
pub struct UpdateContactRequest {
    /// 新しい状態
    pub status: ContactStatus,
    /// 管理メモ（省略時は既存のまま）
    #[serde(default)]
    pub admin_notes: Option<String>,
}

fn not_found(id: Uuid) -> PortalError {
    PortalError::NotFound(format!("Contact submission not found: {}", id))
}

/// GET /admin/contacts - 問い合わせ一覧
pub async fn list_contacts(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
) -> Result<Json<ContactListResponse>, AppError> {
    ctx.require_staff()?;
    let contacts = db::contacts::list(&state.db_pool, None).await?;
    Ok(Json(ContactListResponse { contacts }))
}

/// GET /admin/contacts/:id - 問い合わせ詳細
pub async fn get_contact(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ContactSubmission>, AppError> {
    ctx.require_staff()?;
    let contact = db::contacts::find_by_id(&state.db_pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(contact))
}

/// PUT /admin/contacts/:id - 状態・メモの更新
///
/// 初めて `responded` にした時点で `responded_at` を記録する。
pub async fn update_contact(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateContactRequest>,
) -> Result<Json<ContactSubmission>, AppError> {
    let staff = ctx.require_staff()?;
    let current = db::contacts::find_by_id(&state.db_pool, id)
        .await?
        .ok_or_else(|| not_found(id))?;

    let notes = request.admin_notes.or(current.admin_notes);
    let updated =
        db::contacts::update_status(&state.db_pool, id, request.status, notes.as_deref()).await?;
    tracing::info!(
        contact_id = %id,
        status = updated.status.as_str(),
        "Contact submission updated by {}",
        staff.email
    );
    Ok(Json(updated))
}
