//! The account reconciliation cycle.
//!
//! One cycle walks four passes, in an order that keeps every invariant even
//! when a previous cycle was interrupted part-way:
//!
//! 1. re-arm: clear `notified` on every account observed `valid`, so a
//!    renewed account can be notified again after a future expiry
//! 2. evaluate: resolve raw expiry dates and persist fresh lifecycle status
//! 3. notify expired/suspended accounts, once per status occupancy
//! 4. remind nearly-expired accounts, once per calendar day
//!
//! Every per-account write is conditional on the state read earlier in the
//! pass, and notification bookkeeping only commits after the transport
//! reported success, so each account is retried until a send actually lands.

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::account::AccountStatus;
use crate::dates;
use crate::messages;
use crate::policy::{self, Notification};
use crate::server::database::Database;
use crate::status::evaluate_status;
use crate::transport::Transport;

use super::JobError;

/// Outcome counters for one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleStats {
    /// Accounts whose persisted status changed this cycle.
    pub transitions: u32,
    /// Accounts whose stale notification flag was cleared.
    pub rearmed: u64,
    /// Expired notifications successfully dispatched and recorded.
    pub notified_expired: u32,
    /// Suspension notifications successfully dispatched and recorded.
    pub notified_suspended: u32,
    /// Near-expiry reminders successfully dispatched and recorded.
    pub reminded: u32,
}

impl CycleStats {
    /// Total messages dispatched this cycle.
    pub fn dispatched(&self) -> u32 {
        self.notified_expired + self.notified_suspended + self.reminded
    }
}

/// Run one reconciliation cycle.
///
/// Store failures on the candidate queries abort the cycle (it simply runs
/// again next period); store or transport failures on a single account are
/// logged and never abort the rest of the batch.
pub async fn run_reconciliation_cycle(
    db: &Database,
    transport: &Transport,
    now: NaiveDateTime,
    near_expiry_days: i64,
) -> Result<CycleStats, JobError> {
    let mut stats = CycleStats::default();

    stats.rearmed = db.rearm_valid_accounts().await?;
    if stats.rearmed > 0 {
        info!("Re-armed {} renewed accounts", stats.rearmed);
    }

    run_evaluation_pass(db, now, near_expiry_days, &mut stats).await?;

    run_notify_pass(db, transport, AccountStatus::Expired, now, &mut stats).await?;
    run_notify_pass(db, transport, AccountStatus::Suspended, now, &mut stats).await?;
    run_reminder_pass(db, transport, now, &mut stats).await?;

    Ok(stats)
}

/// Resolve expiry dates and persist fresh status for every account the
/// engine is allowed to move (administrative overrides stay untouched).
async fn run_evaluation_pass(
    db: &Database,
    now: NaiveDateTime,
    near_expiry_days: i64,
    stats: &mut CycleStats,
) -> Result<(), JobError> {
    let window = Duration::days(near_expiry_days);
    let accounts = db.list_accounts(None).await?;

    for account in accounts
        .iter()
        .filter(|account| !account.status.is_administrative())
    {
        let resolved = match dates::resolve_expiry(&account.expire_date_raw) {
            Ok(instant) => Some(instant),
            Err(e) => {
                warn!(
                    account = %account.account_number,
                    raw = %account.expire_date_raw,
                    "Expiry date unresolvable, leaving status as-is: {e}"
                );
                None
            }
        };

        let fresh = evaluate_status(account.status, resolved, now, window);
        let cache_stale = resolved.is_some() && account.expire_date_resolved != resolved;
        if fresh == account.status && !cache_stale {
            continue;
        }

        // Transitions into `valid` re-arm the notification flag.
        let rearm = fresh == AccountStatus::Valid && account.status != AccountStatus::Valid;
        let cache = resolved.or(account.expire_date_resolved);

        match db
            .update_status_checked(&account.account_number, fresh, account.status, cache, rearm)
            .await
        {
            Ok(true) => {
                if fresh != account.status {
                    stats.transitions += 1;
                    info!(
                        account = %account.account_number,
                        from = %account.status,
                        to = %fresh,
                        "Account status transitioned"
                    );
                }
            }
            Ok(false) => debug!(
                account = %account.account_number,
                "Account changed concurrently, leaving for next cycle"
            ),
            Err(e) => warn!(
                account = %account.account_number,
                "Failed to persist status, skipping this cycle: {e}"
            ),
        }
    }

    Ok(())
}

/// Dispatch one notification per due expired/suspended account.
///
/// Trusts the persisted status; the evaluation pass already ran. The
/// bookkeeping update only commits after transport success, so a failed send
/// leaves the account due again next cycle (at-least-once delivery).
async fn run_notify_pass(
    db: &Database,
    transport: &Transport,
    status: AccountStatus,
    now: NaiveDateTime,
    stats: &mut CycleStats,
) -> Result<(), JobError> {
    let accounts = db.list_accounts(Some(status)).await?;

    for account in accounts {
        let Some(notification) = policy::decide(&account, now) else {
            continue;
        };
        let Some(recipient) = account.recipient_id.clone() else {
            continue;
        };

        let message = messages::notification_message(&notification, &account.license);
        if let Err(e) = transport.push_message(&recipient, &message).await {
            warn!(
                account = %account.account_number,
                "Notification dispatch failed, will retry next cycle: {e}"
            );
            continue;
        }

        match db.mark_notified_checked(&account.account_number, status).await {
            Ok(true) => {
                match status {
                    AccountStatus::Expired => stats.notified_expired += 1,
                    _ => stats.notified_suspended += 1,
                }
                info!(
                    account = %account.account_number,
                    status = %status,
                    "Account owner notified"
                );
            }
            Ok(false) => debug!(
                account = %account.account_number,
                "Account changed during dispatch, bookkeeping skipped"
            ),
            Err(e) => warn!(
                account = %account.account_number,
                "Failed to record notification, may re-send next cycle: {e}"
            ),
        }
    }

    Ok(())
}

/// Dispatch the daily near-expiry reminders.
async fn run_reminder_pass(
    db: &Database,
    transport: &Transport,
    now: NaiveDateTime,
    stats: &mut CycleStats,
) -> Result<(), JobError> {
    let accounts = db.list_accounts(Some(AccountStatus::NearlyExpired)).await?;

    for account in accounts {
        let Some(Notification::NearlyExpired { days_left }) = policy::decide(&account, now) else {
            continue;
        };
        let Some(recipient) = account.recipient_id.clone() else {
            continue;
        };

        let message = messages::notification_message(
            &Notification::NearlyExpired { days_left },
            &account.license,
        );
        if let Err(e) = transport.push_message(&recipient, &message).await {
            warn!(
                account = %account.account_number,
                "Reminder dispatch failed, will retry next cycle: {e}"
            );
            continue;
        }

        match db
            .mark_reminder_sent_checked(&account.account_number, now)
            .await
        {
            Ok(true) => {
                stats.reminded += 1;
                info!(
                    account = %account.account_number,
                    days_left,
                    "Near-expiry reminder sent"
                );
            }
            Ok(false) => debug!(
                account = %account.account_number,
                "Account left nearly_expired during dispatch, marker skipped"
            ),
            Err(e) => warn!(
                account = %account.account_number,
                "Failed to record reminder, may re-send today: {e}"
            ),
        }
    }

    Ok(())
}
