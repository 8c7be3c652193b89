//! ユーザー管理API
//!
//! 閲覧とロール変更はスタッフ、削除は特権管理者のみ。

use crate::api::AppError;
use crate::auth::AuthContext;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use fritz_portal_common::auth::{Profile, Role};
use fritz_portal_common::error::PortalError;
use fritz_portal_common::types::Ticket;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ユーザー一覧レスポンス
#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    /// プロフィール（新しい順）
    pub users: Vec<Profile>,
}

/// ユーザー詳細レスポンス
#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    /// プロフィール
    pub profile: Profile,
    /// このユーザーが作成したチケット
    pub tickets: Vec<Ticket>,
}

/// ロール変更リクエスト
#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    /// 新しいロール
    pub role: Role,
}

fn not_found(id: Uuid) -> PortalError {
    PortalError::NotFound(format!("User not found: {}", id))
}

/// GET /admin/users - ユーザー一覧
pub async fn list_users(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
) -> Result<Json<ListUsersResponse>, AppError> {
    ctx.require_staff()?;
    let users = state.profiles.list_profiles().await?;
    Ok(Json(ListUsersResponse { users }))
}

/// GET /admin/users/:id - ユーザー詳細
pub async fn get_user(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UserDetailResponse>, AppError> {
    ctx.require_staff()?;
    let profile = state
        .profiles
        .get_profile(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    let tickets = state.tickets.list_tickets_for_client(id).await?;
    Ok(Json(UserDetailResponse { profile, tickets }))
}

/// PUT /admin/users/:id/role - ロール変更
///
/// # Returns
/// * `200 OK` - 更新後のプロフィール
/// * `400 Bad Request` - 自分自身のロール変更
/// * `403 Forbidden` - 特権管理者以外による `superadmin` の付与・剥奪
/// * `404 Not Found` - ユーザーなし
pub async fn update_role(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<Profile>, AppError> {
    let staff = ctx.require_staff()?;
    if staff.id == id {
        return Err(PortalError::Validation("You cannot change your own role".to_string()).into());
    }

    let target = state
        .profiles
        .get_profile(id)
        .await?
        .ok_or_else(|| not_found(id))?;
    let touches_superadmin = target.role == Role::Superadmin || request.role == Role::Superadmin;
    if touches_superadmin && ctx.role != Some(Role::Superadmin) {
        return Err(PortalError::Authorization(
            "Only superadmins can grant or revoke the superadmin role".to_string(),
        )
        .into());
    }

    let profile = state.profiles.set_role(id, request.role).await?;
    tracing::info!(
        user_id = %id,
        from = %target.role,
        to = %profile.role,
        "Role changed by {}",
        staff.email
    );
    Ok(Json(profile))
}

/// DELETE /admin/users/:id - ユーザー削除
///
/// チケット・メッセージ・ファイル・プロフィール・アカウントをまとめて削除する。
///
/// # Returns
/// * `204 No Content` - 削除成功
/// * `400 Bad Request` - 自分自身の削除
/// * `403 Forbidden` - 特権管理者以外
/// * `404 Not Found` - ユーザーなし
pub async fn delete_user(
    Extension(ctx): Extension<AuthContext>,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let superadmin = ctx.require_superadmin()?;
    if superadmin.id == id {
        return Err(
            PortalError::Validation("You cannot delete your own account".to_string()).into(),
        );
    }

    if !crate::db::accounts::delete_cascade(&state.db_pool, id).await? {
        return Err(not_found(id).into());
    }
    tracing::info!(user_id = %id, "User deleted by {}", superadmin.email);
    Ok(StatusCode::NO_CONTENT)
}
