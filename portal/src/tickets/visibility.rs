//! チケットメッセージの可視性フィルタ
//!
//! 内部メモ（`is_internal = true`）はスタッフにのみ返す。所有者チェックはこの前段で済ませること。

use fritz_portal_common::auth::Role;
use fritz_portal_common::types::TicketMessage;

/// 呼び出し元がメッセージを閲覧できるか
pub fn is_visible(role: Role, message: &TicketMessage) -> bool {
    !message.is_internal || role.is_staff()
}

/// 閲覧できるメッセージだけを元の順序のまま返す
///
/// 副作用なし。出力に再適用しても結果は変わらない。
pub fn filter_visible(role: Role, messages: Vec<TicketMessage>) -> Vec<TicketMessage> {
    messages
        .into_iter()
        .filter(|message| is_visible(role, message))
        .collect()
}
