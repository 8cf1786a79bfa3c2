//! Notification firing decisions.
//!
//! Given an account and the current instant, the policy decides whether a
//! notification is due right now and which message variant it should use.
//! The decision is pure; the reconciliation job performs the dispatch and,
//! only after transport success, the bookkeeping the decision implies.

use chrono::NaiveDateTime;

use crate::account::{AccountRecord, AccountStatus};

/// Smallest value `days_left` is clamped to.
pub const DAYS_LEFT_MIN: i64 = 1;
/// Largest value `days_left` is clamped to.
pub const DAYS_LEFT_MAX: i64 = 3;

const SECONDS_PER_DAY: i64 = 86_400;

/// The message variant a due notification should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Expired,
    Suspended,
    NearlyExpired { days_left: i64 },
}

/// Decide whether a notification is due for `account` at `now`.
///
/// - `expired` / `suspended`: due once per status occupancy — fires when the
///   account is unnotified, or when the status changed since the last
///   successful notification (`last_notified_status` mismatch).
/// - `nearly_expired`: due at most once per calendar day, judged against the
///   start of the current local day rather than a rolling 24 h window.
/// - Accounts without a recipient are never due.
pub fn decide(account: &AccountRecord, now: NaiveDateTime) -> Option<Notification> {
    if account.recipient_id.as_deref().map_or(true, str::is_empty) {
        return None;
    }

    match account.status {
        AccountStatus::Expired => {
            occupancy_unnotified(account, AccountStatus::Expired).then_some(Notification::Expired)
        }
        AccountStatus::Suspended => occupancy_unnotified(account, AccountStatus::Suspended)
            .then_some(Notification::Suspended),
        AccountStatus::NearlyExpired => {
            let due_today = match account.last_nearly_expired_notified_at {
                None => true,
                Some(last) => last.date() < now.date(),
            };
            due_today.then_some(Notification::NearlyExpired {
                days_left: days_left(account.expire_date_resolved, now),
            })
        }
        AccountStatus::Valid | AccountStatus::Invalid => None,
    }
}

/// Whole days remaining until expiry: `ceil((expiry - now) / 1 day)`, clamped
/// to `[DAYS_LEFT_MIN, DAYS_LEFT_MAX]`. An unresolved expiry clamps low.
pub fn days_left(resolved_expiry: Option<NaiveDateTime>, now: NaiveDateTime) -> i64 {
    let remaining = match resolved_expiry {
        Some(expiry) => (expiry - now).num_seconds(),
        None => 0,
    };
    let days = if remaining <= 0 {
        0
    } else {
        (remaining + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
    };
    days.clamp(DAYS_LEFT_MIN, DAYS_LEFT_MAX)
}

fn occupancy_unnotified(account: &AccountRecord, status: AccountStatus) -> bool {
    !account.notified || account.last_notified() != Some(status)
}
