//! 認証・認可
//!
//! セッション解決 → セッションゲート → ロール認可 の順に適用する。
//! ハンドラーはグローバル状態ではなく、ゲートが差し込む [`AuthContext`] を受け取る。

/// 初回起動時の特権管理者作成
pub mod bootstrap;

/// ロール認可
pub mod authorizer;

/// パス分類とゲート判定
pub mod gate;

/// セッションゲートミドルウェア
pub mod middleware;

/// パスワードハッシュ
pub mod password;

/// パスワード再設定トークン
pub mod reset;

/// セッショントークンと呼び出し元の解決
pub mod session;

use fritz_portal_common::auth::{Identity, Role};
use fritz_portal_common::error::{PortalError, PortalResult};

/// リクエスト単位の認証情報
///
/// `role` は保護パスでのみ解決され、そのリクエストの間だけ有効。
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    /// 呼び出し元（未ログインなら `None`）
    pub identity: Option<Identity>,
    /// プロフィールから取得したロール（プロフィールなし・取得失敗なら `None`）
    pub role: Option<Role>,
}

impl AuthContext {
    /// ログイン済みの呼び出し元を要求
    pub fn require_identity(&self) -> PortalResult<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| PortalError::Authentication("Sign in required".to_string()))
    }

    /// スタッフ権限を要求
    pub fn require_staff(&self) -> PortalResult<&Identity> {
        let identity = self.require_identity()?;
        if self.is_staff() {
            Ok(identity)
        } else {
            Err(PortalError::Authorization("Staff access required".to_string()))
        }
    }

    /// 特権管理者権限を要求
    pub fn require_superadmin(&self) -> PortalResult<&Identity> {
        let identity = self.require_identity()?;
        if self.role == Some(Role::Superadmin) {
            Ok(identity)
        } else {
            Err(PortalError::Authorization("Superadmin access required".to_string()))
        }
    }

    /// スタッフかどうか（ロール不明は非スタッフ）
    pub fn is_staff(&self) -> bool {
        self.role.is_some_and(Role::is_staff)
    }

    /// 可視性判定に使うロール（ロール不明は最も制限の強い `client` 扱い）
    pub fn effective_role(&self) -> Role {
        self.role.unwrap_or(Role::Client)
    }
}
