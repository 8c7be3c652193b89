//! Fritz Portal Server
//!
//! クライアントポータルと管理画面のバックエンド。
//! セッションゲート・ロール認可・メッセージ可視性フィルタを中心に、チケットと問い合わせのCRUDを提供する。

#![warn(missing_docs)]

/// REST APIハンドラー
pub mod api;

/// 認証・認可機能
pub mod auth;

/// CLIインターフェース
pub mod cli;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// データベースアクセス
pub mod db;

/// ロギング初期化ユーティリティ
pub mod logging;

/// メール通知
pub mod notify;

/// セッション署名鍵管理
pub mod session_secret;

/// 型付きリポジトリインターフェース
pub mod store;

/// チケットのドメインロジック
pub mod tickets;

use auth::authorizer::RoleAuthorizer;
use auth::session::{IdentityResolver, JwtIdentityResolver, SessionSettings};
use notify::Notifier;
use std::sync::Arc;
use store::{ProfileStore, SqliteStore, TicketStore};

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// データベース接続プール
    pub db_pool: sqlx::SqlitePool,
    /// プロフィールストア
    pub profiles: Arc<dyn ProfileStore>,
    /// チケット・メッセージストア
    pub tickets: Arc<dyn TicketStore>,
    /// 呼び出し元リゾルバー
    pub identity: Arc<dyn IdentityResolver>,
    /// ロール認可
    pub authorizer: RoleAuthorizer,
    /// セッション発行設定
    pub sessions: SessionSettings,
    /// メール通知
    pub notifier: Notifier,
}

impl AppState {
    /// SQLite実装で状態を組み立てる
    pub fn new(db_pool: sqlx::SqlitePool, sessions: SessionSettings, notifier: Notifier) -> Self {
        let store = Arc::new(SqliteStore::new(db_pool.clone()));
        let identity = Arc::new(JwtIdentityResolver::new(sessions.clone(), db_pool.clone()));
        Self {
            db_pool,
            profiles: store.clone(),
            tickets: store.clone(),
            identity,
            authorizer: RoleAuthorizer::new(store),
            sessions,
            notifier,
        }
    }

    /// 呼び出し元リゾルバーを差し替える
    pub fn with_identity_resolver(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    /// プロフィールストアを差し替える（認可器も同じストアを使う）
    pub fn with_profile_store(mut self, profiles: Arc<dyn ProfileStore>) -> Self {
        self.authorizer = RoleAuthorizer::new(profiles.clone());
        self.profiles = profiles;
        self
    }
}
