//! お問い合わせフォームAPI（公開）

use crate::api::auth::is_valid_email;
use crate::api::AppError;
use crate::db::contacts::{self, NewContact};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use fritz_portal_common::error::PortalError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// フォーム送信元の既定値
const DEFAULT_SOURCE: &str = "contact_form";

/// 問い合わせリクエスト
#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    /// 氏名
    pub name: String,
    /// メールアドレス
    pub email: String,
    /// 会社名
    #[serde(default)]
    pub company: Option<String>,
    /// 電話番号
    #[serde(default)]
    pub phone: Option<String>,
    /// 件名
    #[serde(default)]
    pub subject: Option<String>,
    /// 本文
    pub message: String,
    /// 送信元（省略時 `contact_form`）
    #[serde(default)]
    pub source: Option<String>,
}

/// 問い合わせ受付レスポンス
#[derive(Debug, Serialize)]
pub struct ContactResponse {
    /// 受付ID
    pub id: Uuid,
    /// 表示用メッセージ
    pub message: &'static str,
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, PortalError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PortalError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// POST /contact - お問い合わせ受付
///
/// 保存後、スタッフへ通知する（通知失敗は応答に影響しない）。
///
/// # Returns
/// * `201 Created` - 受付完了
/// * `400 Bad Request` - 必須項目の欠落・メール形式不正
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<(StatusCode, Json<ContactResponse>), AppError> {
    let name = required(&request.name, "Name")?;
    let email = required(&request.email, "Email")?;
    if !is_valid_email(email) {
        return Err(PortalError::Validation("A valid email address is required".to_string()).into());
    }
    let subject = required(request.subject.as_deref().unwrap_or(""), "Subject")?;
    let message = required(&request.message, "Message")?;

    let submission = contacts::create(
        &state.db_pool,
        &NewContact {
            name,
            email,
            company: request.company.as_deref(),
            phone: request.phone.as_deref(),
            subject: Some(subject),
            message,
            source: request.source.as_deref().unwrap_or(DEFAULT_SOURCE),
        },
    )
    .await?;
    tracing::info!(contact_id = %submission.id, "Contact form submitted by {}", submission.email);

    let staff = state.notifier.staff_recipients(state.profiles.as_ref()).await;
    state
        .notifier
        .dispatch(state.notifier.contact_received(staff, &submission));

    Ok((
        StatusCode::CREATED,
        Json(ContactResponse {
            id: submission.id,
            message: "Thanks for reaching out. We'll be in touch soon.",
        }),
    ))
}
