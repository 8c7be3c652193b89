//! メール通知（Resend HTTP API）
//!
//! APIキー未設定時は送信せずログのみ。送信は `tokio::spawn` で切り離し、失敗してもリクエストには影響しない。

use crate::config::PortalConfig;
use crate::store::ProfileStore;
use fritz_portal_common::error::{PortalError, PortalResult};
use fritz_portal_common::types::{ContactSubmission, Ticket};
use serde::Serialize;
use std::time::Duration;

/// Resend APIのエンドポイント
pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// 返信プレビューの最大文字数
const PREVIEW_CHARS: usize = 200;

/// 送信するメール
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Email {
    /// 宛先
    pub to: Vec<String>,
    /// 件名
    pub subject: String,
    /// HTML本文
    pub html: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
}

/// 返信通知の内容
#[derive(Debug, Clone)]
pub struct MessageNotice<'a> {
    /// 対象チケット
    pub ticket: &'a Ticket,
    /// 受信者の表示名
    pub recipient_name: &'a str,
    /// 受信者のメールアドレス
    pub recipient_email: &'a str,
    /// 送信者の表示名
    pub sender_name: &'a str,
    /// メッセージ本文
    pub content: &'a str,
    /// 受信者がクライアントか（リンク先が `/portal` になる）
    pub recipient_is_client: bool,
}

/// メール通知
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
    from: String,
    site_url: String,
    fallback_email: String,
}

impl Notifier {
    /// 設定から作成
    pub fn new(config: &PortalConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key: config.resend_api_key.clone(),
            endpoint: RESEND_ENDPOINT.to_string(),
            from: config.notify_from.clone(),
            site_url: config.site_url.clone(),
            fallback_email: config.notify_fallback_email.clone(),
        }
    }

    /// 送信しない通知（ログのみ）
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: None,
            endpoint: RESEND_ENDPOINT.to_string(),
            from: PortalConfig::DEFAULT_NOTIFY_FROM.to_string(),
            site_url: PortalConfig::DEFAULT_SITE_URL.to_string(),
            fallback_email: PortalConfig::DEFAULT_FALLBACK_EMAIL.to_string(),
        }
    }

    /// 送信先エンドポイントを差し替える
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// 実際に送信するか
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// スタッフ宛先（取得失敗・0件ならフォールバック）
    pub async fn staff_recipients(&self, profiles: &dyn ProfileStore) -> Vec<String> {
        match profiles.staff_emails().await {
            Ok(emails) if !emails.is_empty() => emails,
            Ok(_) => {
                tracing::info!("No staff emails found, using fallback recipient");
                vec![self.fallback_email.clone()]
            }
            Err(e) => {
                tracing::error!("Failed to load staff emails: {}", e);
                vec![self.fallback_email.clone()]
            }
        }
    }

    /// 新規チケット（スタッフ宛）
    pub fn new_ticket(
        &self,
        staff: Vec<String>,
        ticket: &Ticket,
        client_name: &str,
        client_email: &str,
    ) -> Email {
        let body = format!(
            "<p>A new support ticket has been submitted.</p>\
             <p><strong>Ticket:</strong> {}<br><strong>Subject:</strong> {}<br>\
             <strong>Client:</strong> {}<br><strong>Email:</strong> {}</p>",
            escape_html(&ticket.ticket_number),
            escape_html(&ticket.subject),
            escape_html(client_name),
            escape_html(client_email),
        );
        Email {
            to: staff,
            subject: format!("[New Ticket] {}: {}", ticket.ticket_number, ticket.subject),
            html: layout(
                "New Support Ticket",
                &body,
                &self.link(&format!("/admin/tickets/{}", ticket.id)),
                "View Ticket",
            ),
        }
    }

    /// 受付確認（クライアント宛）
    pub fn ticket_confirmation(&self, ticket: &Ticket, client_name: &str, client_email: &str) -> Email {
        let body = format!(
            "<p>Hi {},</p>\
             <p>Thank you for contacting Fritz Automation support. We've received your ticket and will get back to you as soon as possible.</p>\
             <p><strong>Ticket Number:</strong> {}<br><strong>Subject:</strong> {}</p>\
             <p>You can track the status of your ticket and respond to our team through your client portal.</p>",
            escape_html(client_name),
            escape_html(&ticket.ticket_number),
            escape_html(&ticket.subject),
        );
        Email {
            to: vec![client_email.to_string()],
            subject: format!("Ticket {} Received: {}", ticket.ticket_number, ticket.subject),
            html: layout(
                "Ticket Received",
                &body,
                &self.link(&format!("/portal/tickets/{}", ticket.id)),
                "View Ticket",
            ),
        }
    }

    /// 新しい返信
    pub fn new_message(&self, notice: &MessageNotice<'_>) -> Email {
        let ticket = notice.ticket;
        let section = if notice.recipient_is_client { "portal" } else { "admin" };
        let body = format!(
            "<p>Hi {},</p><p>{} has replied to ticket {}.</p>\
             <p><strong>Ticket:</strong> {}<br><strong>Subject:</strong> {}</p>\
             <p><em>\"{}\"</em></p>",
            escape_html(notice.recipient_name),
            escape_html(notice.sender_name),
            escape_html(&ticket.ticket_number),
            escape_html(&ticket.ticket_number),
            escape_html(&ticket.subject),
            escape_html(&preview(notice.content)),
        );
        Email {
            to: vec![notice.recipient_email.to_string()],
            subject: format!("New Reply on {}: {}", ticket.ticket_number, ticket.subject),
            html: layout(
                "New Message",
                &body,
                &self.link(&format!("/{}/tickets/{}", section, ticket.id)),
                "View Conversation",
            ),
        }
    }

    /// お問い合わせ受付（スタッフ宛）
    pub fn contact_received(&self, staff: Vec<String>, contact: &ContactSubmission) -> Email {
        let mut details = format!(
            "<strong>Name:</strong> {}<br><strong>Email:</strong> {}",
            escape_html(&contact.name),
            escape_html(&contact.email),
        );
        for (label, value) in [
            ("Company", &contact.company),
            ("Phone", &contact.phone),
            ("Subject", &contact.subject),
        ] {
            if let Some(value) = value {
                details.push_str(&format!("<br><strong>{}:</strong> {}", label, escape_html(value)));
            }
        }
        let body = format!(
            "<p>You have a new inquiry from your website contact form.</p><p>{}</p>\
             <p><strong>Message:</strong></p><p style=\"white-space: pre-wrap;\">{}</p>",
            details,
            escape_html(&contact.message),
        );
        Email {
            to: staff,
            subject: format!(
                "[Contact Form] {} from {}",
                contact.subject.as_deref().unwrap_or("New Inquiry"),
                contact.name
            ),
            html: layout(
                "New Contact Form Submission",
                &body,
                &self.link("/admin/contacts"),
                "View in Admin",
            ),
        }
    }

    /// パスワード再設定リンク
    pub fn password_reset(&self, email: &str, token: &str, valid_minutes: i64) -> Email {
        let body = format!(
            "<p>We received a request to reset the password for your Fritz Automation client portal account.</p>\
             <p>The link below is valid for {} minutes and can only be used once. \
             If you didn't request this, you can safely ignore this email.</p>",
            valid_minutes,
        );
        Email {
            to: vec![email.to_string()],
            subject: "Reset your Fritz Automation portal password".to_string(),
            html: layout(
                "Reset Your Password",
                &body,
                &self.link(&format!("/reset-password?token={}", urlencoding::encode(token))),
                "Choose a New Password",
            ),
        }
    }

    /// メールを送信
    ///
    /// # Returns
    /// * `Ok(())` - 送信成功、またはAPIキー未設定でスキップ
    /// * `Err(PortalError::Notification)` - 通信失敗・APIエラー
    pub async fn send(&self, email: &Email) -> PortalResult<()> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::info!(
                to = ?email.to,
                subject = %email.subject,
                "Skipping email, PORTAL_RESEND_API_KEY not configured"
            );
            return Ok(());
        };

        let request = SendRequest {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PortalError::Notification(format!("Failed to reach email API: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PortalError::Notification(format!(
                "Email API returned {}: {}",
                status, body
            )));
        }

        tracing::info!(to = ?email.to, subject = %email.subject, "Email sent");
        Ok(())
    }

    /// バックグラウンドで送信（失敗はログのみ）
    pub fn dispatch(&self, email: Email) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&email).await {
                tracing::error!(subject = %email.subject, "Failed to send email: {}", e);
            }
        });
    }

    fn link(&self, path: &str) -> String {
        format!("{}{}", self.site_url, path)
    }
}

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn layout(title: &str, body: &str, link: &str, link_label: &str) -> String {
    format!(
        "<div style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\
         <h1>{}</h1>{}\
         <p><a href=\"{}\">{}</a></p>\
         <p style=\"color: #94a3b8; font-size: 14px;\">Best regards,<br>Fritz Automation Support Team</p>\
         </div>",
        title, body, link, link_label
    )
}
