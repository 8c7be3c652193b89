//! パスワードハッシュ化と検証（bcrypt）

use bcrypt::{hash, verify};
use fritz_portal_common::error::PortalError;

/// パスワードハッシュ化のコスト（12推奨、200-300ms）
const HASH_COST: u32 = 12;

/// 受け付ける最短パスワード長
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// パスワードをbcryptでハッシュ化
///
/// # Arguments
/// * `password` - ハッシュ化するパスワード
///
/// # Returns
/// * `Ok(String)` - bcryptハッシュ文字列（$2b$で始まる）
/// * `Err(PortalError)` - ハッシュ化失敗
pub fn hash_password(password: &str) -> Result<String, PortalError> {
    hash(password, HASH_COST)
        .map_err(|e| PortalError::PasswordHash(format!("Failed to hash password: {}", e)))
}

/// パスワードを検証
///
/// # Returns
/// * `Ok(true)` - パスワード一致
/// * `Ok(false)` - パスワード不一致
/// * `Err(PortalError)` - ハッシュ形式が不正
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PortalError> {
    verify(password, hash)
        .map_err(|e| PortalError::PasswordHash(format!("Failed to verify password: {}", e)))
}

/// 新規パスワードの最低要件を検証
pub fn validate_new_password(password: &str) -> Result<(), PortalError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PortalError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}
