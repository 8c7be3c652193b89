//! データベースアクセス層
//!
//! SQLite（sqlx）による永続化。各サブモジュールは `&SqlitePool` を受け取る関数群で構成する。
//! 日時は RFC3339（マイクロ秒、UTC）のTEXTとして保存し、文字列比較で時系列順になる。

/// アカウント管理
pub mod accounts;

/// 問い合わせ管理
pub mod contacts;

/// ファイルメタデータ管理
pub mod files;

/// チケットメッセージ管理
pub mod messages;

/// データベースマイグレーション
pub mod migrations;

/// パスワード再設定リンク
pub mod password_resets;

/// プロフィール管理
pub mod profiles;

/// チケット管理
pub mod tickets;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use fritz_portal_common::error::{PortalError, PortalResult};
use uuid::Uuid;

/// 現在時刻（保存精度のマイクロ秒に丸める）
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// 日時を保存用文字列に変換
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// 保存された日時文字列をパース
pub(crate) fn parse_timestamp(value: &str) -> PortalResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PortalError::Database(format!("Invalid timestamp '{}': {}", value, e)))
}

pub(crate) fn parse_optional_timestamp(value: Option<String>) -> PortalResult<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_timestamp).transpose()
}

/// 保存されたUUID文字列をパース
pub(crate) fn parse_uuid(value: &str) -> PortalResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| PortalError::Database(format!("Invalid UUID '{}': {}", value, e)))
}

pub(crate) fn parse_optional_uuid(value: Option<String>) -> PortalResult<Option<Uuid>> {
    value.as_deref().map(parse_uuid).transpose()
}

/// 空文字列をNULLとして扱う
pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
