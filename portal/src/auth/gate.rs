//! セッションゲートの判定
//!
//! パスは独立した3つの分類（保護・管理・認証ページ）で評価する。
//! 判定自体は純粋関数で、呼び出し元の解決とロール認可はミドルウェア側で行う。

use fritz_portal_common::auth::Identity;

/// ログインが必要なパス
const PROTECTED_PREFIXES: [&str; 2] = ["/portal", "/admin"];
/// スタッフ権限が必要なパス
const ELEVATED_PREFIXES: [&str; 1] = ["/admin"];
/// ログイン済みなら見せないパス
const AUTH_PREFIXES: [&str; 2] = ["/login", "/register"];

/// ログインページ
pub const LOGIN_PATH: &str = "/login";
/// ポータルトップ
pub const PORTAL_HOME: &str = "/portal";

/// リダイレクト理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// 保護パスに未ログインでアクセス
    Unauthenticated,
    /// ログイン済みだが権限不足
    Unauthorized,
    /// ログイン済みで認証ページにアクセス
    AlreadyAuthenticated,
}

/// ゲート判定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// ハンドラーへ進む
    Proceed,
    /// 別パスへリダイレクト
    Redirect {
        /// リダイレクト先
        target: String,
        /// 理由
        reason: RedirectReason,
    },
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn in_class(path: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| matches_prefix(path, prefix))
}

/// `/portal` または `/admin` 配下か
pub fn is_protected(path: &str) -> bool {
    in_class(path, &PROTECTED_PREFIXES)
}

/// `/admin` 配下か
pub fn is_elevated(path: &str) -> bool {
    in_class(path, &ELEVATED_PREFIXES)
}

/// `/login` または `/register` か
pub fn is_auth_page(path: &str) -> bool {
    in_class(path, &AUTH_PREFIXES)
}

/// ログイン後に元のパスへ戻るためのリダイレクト先
///
/// セグメント単位でパーセントエンコードし、区切りの `/` は残す。
pub fn login_redirect_target(path: &str) -> String {
    let encoded = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}?redirect={}", LOGIN_PATH, encoded)
}

/// リクエストの進行可否を判定
///
/// # Arguments
/// * `path` - リクエストパス
/// * `identity` - 解決済みの呼び出し元（未ログインなら `None`）
/// * `authorized` - ロール認可の結果（管理パス以外では無視）
pub fn decide(path: &str, identity: Option<&Identity>, authorized: bool) -> GateDecision {
    if is_protected(path) && identity.is_none() {
        return GateDecision::Redirect {
            target: login_redirect_target(path),
            reason: RedirectReason::Unauthenticated,
        };
    }

    if is_elevated(path) && identity.is_some() && !authorized {
        return GateDecision::Redirect {
            target: PORTAL_HOME.to_string(),
            reason: RedirectReason::Unauthorized,
        };
    }

    if is_auth_page(path) && identity.is_some() {
        return GateDecision::Redirect {
            target: PORTAL_HOME.to_string(),
            reason: RedirectReason::AlreadyAuthenticated,
        };
    }

    GateDecision::Proceed
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn someone() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "someone@example.com".to_string(),
        }
    }

    #[test]
    fn test_path_classes_match_on_segments() {
        assert!(is_protected("/portal"));
        assert!(is_protected("/portal/tickets/42"));
        assert!(is_protected("/admin/users"));
        assert!(!is_protected("/portalx"));
        assert!(!is_protected("/"));
        assert!(is_elevated("/admin"));
        assert!(!is_elevated("/administrator"));
        assert!(!is_elevated("/portal/admin"));
        assert!(is_auth_page("/login"));
        assert!(is_auth_page("/register"));
        assert!(!is_auth_page("/logout"));
    }

    #[test]
    fn test_unauthenticated_protected_path_redirects_to_login() {
        for path in ["/portal", "/portal/tickets/42", "/admin", "/admin/contacts"] {
            assert_eq!(
                decide(path, None, false),
                GateDecision::Redirect {
                    target: format!("/login?redirect={}", path),
                    reason: RedirectReason::Unauthenticated,
                }
            );
        }
    }

    #[test]
    fn test_login_redirect_encodes_segments() {
        assert_eq!(
            login_redirect_target("/portal/tickets/42"),
            "/login?redirect=/portal/tickets/42"
        );
        assert_eq!(
            login_redirect_target("/portal/a b&c"),
            "/login?redirect=/portal/a%20b%26c"
        );
    }

    #[test]
    fn test_unauthorized_admin_redirects_to_portal() {
        let identity = someone();
        assert_eq!(
            decide("/admin", Some(&identity), false),
            GateDecision::Redirect {
                target: "/portal".to_string(),
                reason: RedirectReason::Unauthorized,
            }
        );
        assert_eq!(decide("/admin/tickets", Some(&identity), true), GateDecision::Proceed);
    }

    #[test]
    fn test_authenticated_auth_page_redirects_regardless_of_role() {
        let identity = someone();
        for authorized in [false, true] {
            for path in ["/login", "/register"] {
                assert_eq!(
                    decide(path, Some(&identity), authorized),
                    GateDecision::Redirect {
                        target: "/portal".to_string(),
                        reason: RedirectReason::AlreadyAuthenticated,
                    }
                );
            }
        }
    }

    #[test]
    fn test_public_and_portal_paths_proceed() {
        let identity = someone();
        assert_eq!(decide("/", None, false), GateDecision::Proceed);
        assert_eq!(decide("/contact", None, false), GateDecision::Proceed);
        assert_eq!(decide("/login", None, false), GateDecision::Proceed);
        assert_eq!(decide("/portal/tickets", Some(&identity), false), GateDecision::Proceed);
    }
}
