//! Fritz Portal Common Library
//!
//! ポータルとCLIで共有する型定義、エラー型を提供

#![warn(missing_docs)]

/// 認証関連のデータモデル
pub mod auth;

/// 共通型定義
pub mod types;

/// エラー型定義
pub mod error;
