//! チケット状態遷移
//!
//! `closed` 以外の状態どうしは自由に遷移できる。`closed` から戻すには [`reopen`] を使う。
//! `resolved` に入ると `resolved_at` を記録し、`resolved` から `closed` 以外へ移ると消去する。

use chrono::{DateTime, Utc};
use fritz_portal_common::error::{PortalError, PortalResult};
use fritz_portal_common::types::{Ticket, TicketStatus};

/// 通常の状態更新で `from` から `to` へ移れるか
pub fn can_transition(from: TicketStatus, to: TicketStatus) -> bool {
    from == to || from != TicketStatus::Closed
}

/// 状態を変更した新しいチケットを返す
///
/// 同じ状態の指定は何もしない。
///
/// # Returns
/// * `Ok(Ticket)` - 遷移後のチケット
/// * `Err(PortalError::InvalidTransition)` - `closed` からの通常遷移
pub fn transition(ticket: &Ticket, to: TicketStatus, now: DateTime<Utc>) -> PortalResult<Ticket> {
    let from = ticket.status;
    if from == to {
        return Ok(ticket.clone());
    }
    if !can_transition(from, to) {
        return Err(invalid(from, to));
    }

    let mut next = ticket.clone();
    next.status = to;
    next.updated_at = now;
    match to {
        TicketStatus::Resolved => next.resolved_at = Some(now),
        TicketStatus::Closed => {}
        _ => next.resolved_at = None,
    }
    Ok(next)
}

/// 再オープン（`closed` / `resolved` → `open`）
pub fn reopen(ticket: &Ticket, now: DateTime<Utc>) -> PortalResult<Ticket> {
    match ticket.status {
        TicketStatus::Closed | TicketStatus::Resolved => {
            let mut next = ticket.clone();
            next.status = TicketStatus::Open;
            next.resolved_at = None;
            next.updated_at = now;
            Ok(next)
        }
        other => Err(invalid(other, TicketStatus::Open)),
    }
}

fn invalid(from: TicketStatus, to: TicketStatus) -> PortalError {
    PortalError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}
