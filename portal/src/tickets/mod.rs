//! チケットのドメインロジック

/// メッセージ可視性フィルタ
pub mod visibility;

/// 状態遷移規則
pub mod lifecycle;
