//! 認証関連のデータモデル
//!
//! アカウント、プロフィール、ロール、セッションクレーム

use crate::error::PortalError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// ユーザーロール
///
/// 権限判定は [`Role::is_staff`] のみで行う。文字列比較を各所に散らさないこと。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// 顧客（ポータル利用者）
    Client,
    /// 管理者
    Admin,
    /// 特権管理者（ユーザー削除が可能）
    Superadmin,
}

impl Role {
    /// 管理画面（/admin）と内部メッセージへのアクセス権を持つか
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }

    /// 保存・送信用の文字列表現
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(PortalError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// ログイン用アカウント（認証情報のみ）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// リクエスト単位で解決された呼び出し元
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// アカウントID（= プロフィールID）
    pub id: Uuid,
    /// メールアドレス
    pub email: String,
}

/// プロフィール
///
/// アカウント1件につき1件。ロールはここにのみ保持する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub industry: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// 表示名（姓名 → メールアドレス → "Client" の順にフォールバック）
    pub fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let full = full.trim();
        if !full.is_empty() {
            return full.to_string();
        }
        self.email
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "Client".to_string())
    }
}

/// プロフィール更新内容（本人が編集できる項目のみ）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub industry: Option<String>,
}

/// セッショントークンのクレーム
///
/// ロールは含めない。権限はリクエストごとにプロフィールから再取得する。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,   // アカウントID
    pub email: String, // メールアドレス
    pub iat: usize,    // 発行時刻（Unix timestamp）
    pub exp: usize,    // 有効期限（Unix timestamp）
}
