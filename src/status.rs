//! Lifecycle status evaluation.
//!
//! The evaluator is pure: given the persisted status, the resolved expiry and
//! the current instant it computes the status the account *should* hold. The
//! reconciliation job is responsible for persisting the transition; keeping
//! the two apart lets the rules be unit tested without a store.

use chrono::{Duration, NaiveDateTime};

use crate::account::AccountStatus;

/// Default lead time before expiry during which daily reminders are sent.
pub const DEFAULT_NEAR_EXPIRY_DAYS: i64 = 3;

/// Compute the status an account should currently hold.
///
/// Rules:
/// - `suspended` / `invalid` are administrative and returned unchanged; only
///   administrative action escalates out of them.
/// - An unresolved expiry leaves the status unchanged — a parse failure must
///   never regress a valid account.
/// - Past expiry → `expired`; within `near_expiry_window` → `nearly_expired`;
///   otherwise `valid`.
pub fn evaluate_status(
    current: AccountStatus,
    resolved_expiry: Option<NaiveDateTime>,
    now: NaiveDateTime,
    near_expiry_window: Duration,
) -> AccountStatus {
    if current.is_administrative() {
        return current;
    }

    let Some(expiry) = resolved_expiry else {
        return current;
    };

    if now > expiry {
        AccountStatus::Expired
    } else if expiry - now <= near_expiry_window {
        AccountStatus::NearlyExpired
    } else {
        AccountStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn window() -> Duration {
        Duration::days(DEFAULT_NEAR_EXPIRY_DAYS)
    }

    #[test]
    fn past_expiry_is_expired() {
        let status = evaluate_status(
            AccountStatus::Valid,
            Some(now() - Duration::minutes(1)),
            now(),
            window(),
        );
        assert_eq!(status, AccountStatus::Expired);
    }

    #[test]
    fn expiry_within_window_is_nearly_expired() {
        let status = evaluate_status(
            AccountStatus::Valid,
            Some(now() + Duration::hours(36)),
            now(),
            window(),
        );
        assert_eq!(status, AccountStatus::NearlyExpired);

        // Exactly on the window edge still counts as near expiry.
        let status = evaluate_status(
            AccountStatus::Valid,
            Some(now() + Duration::days(3)),
            now(),
            window(),
        );
        assert_eq!(status, AccountStatus::NearlyExpired);
    }

    #[test]
    fn far_future_expiry_is_valid() {
        let status = evaluate_status(
            AccountStatus::NearlyExpired,
            Some(now() + Duration::days(30)),
            now(),
            window(),
        );
        assert_eq!(status, AccountStatus::Valid);
    }

    #[test]
    fn renewal_regresses_expired_to_valid() {
        // An administratively renewed date moves an expired account back.
        let status = evaluate_status(
            AccountStatus::Expired,
            Some(now() + Duration::days(365)),
            now(),
            window(),
        );
        assert_eq!(status, AccountStatus::Valid);
    }

    #[test]
    fn administrative_statuses_are_untouched() {
        // Even a long-past expiry never moves a suspended or invalid account.
        for current in [AccountStatus::Suspended, AccountStatus::Invalid] {
            let status = evaluate_status(
                current,
                Some(now() - Duration::days(100)),
                now(),
                window(),
            );
            assert_eq!(status, current);
        }
    }

    #[test]
    fn unresolved_expiry_leaves_status_unchanged() {
        for current in [
            AccountStatus::Valid,
            AccountStatus::NearlyExpired,
            AccountStatus::Expired,
        ] {
            assert_eq!(evaluate_status(current, None, now(), window()), current);
        }
    }
}
