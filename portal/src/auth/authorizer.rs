//! ロール認可
//!
//! 権限判定の唯一の実装。リクエストごとにプロフィールを読み直し、結果はキャッシュしない。

use crate::store::ProfileStore;
use fritz_portal_common::auth::{Identity, Role};
use std::sync::Arc;

/// プロフィールのロールに基づく認可
#[derive(Clone)]
pub struct RoleAuthorizer {
    profiles: Arc<dyn ProfileStore>,
}

impl RoleAuthorizer {
    /// 認可器を作成
    pub fn new(profiles: Arc<dyn ProfileStore>) -> Self {
        Self { profiles }
    }

    /// 呼び出し元のロール
    ///
    /// プロフィールが存在しない、または取得に失敗した場合は `None`。
    pub async fn role_of(&self, identity: &Identity) -> Option<Role> {
        match self.profiles.get_profile(identity.id).await {
            Ok(Some(profile)) => Some(profile.role),
            Ok(None) => {
                tracing::debug!("No profile for identity {}", identity.id);
                None
            }
            Err(e) => {
                tracing::error!("Failed to load profile for {}: {}", identity.id, e);
                None
            }
        }
    }

    /// 管理機能へのアクセス可否（`admin` / `superadmin` のみ許可）
    pub async fn authorize(&self, identity: &Identity) -> bool {
        self.role_of(identity).await.is_some_and(Role::is_staff)
    }
}
