//! Account data model.
//!
//! `AccountRecord` mirrors the `accounts` table and is the single entity the
//! engine reads and writes. The raw expiry string is the authoritative input;
//! `expire_date_resolved` is a derived cache that every writer refreshes
//! whenever the raw value changes.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::dates;

/// Lifecycle status of a customer account.
///
/// `Suspended` and `Invalid` are administrative overrides: they are set
/// through the admin surface and never derived (or left) by the
/// reconciliation engine on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Valid,
    NearlyExpired,
    Expired,
    Suspended,
    Invalid,
}

impl AccountStatus {
    /// Stable string form used in the store and in API payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Valid => "valid",
            AccountStatus::NearlyExpired => "nearly_expired",
            AccountStatus::Expired => "expired",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Invalid => "invalid",
        }
    }

    /// Parse the stable string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "valid" => Some(AccountStatus::Valid),
            "nearly_expired" => Some(AccountStatus::NearlyExpired),
            "expired" => Some(AccountStatus::Expired),
            "suspended" => Some(AccountStatus::Suspended),
            "invalid" => Some(AccountStatus::Invalid),
            _ => None,
        }
    }

    /// True for statuses only administrative action may enter or leave.
    pub fn is_administrative(&self) -> bool {
        matches!(self, AccountStatus::Suspended | AccountStatus::Invalid)
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for AccountStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AccountStatus::parse(&value).ok_or_else(|| format!("unknown account status '{value}'"))
    }
}

/// A customer account tracked for expiry notifications.
///
/// Mirrors the `accounts` table schema. Mutated by the linking handler
/// (`recipient_id`) and the reconciliation job (`status`, `notified`,
/// `last_notified_status`, `last_nearly_expired_notified_at`); never deleted
/// by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct AccountRecord {
    /// Unique external identifier, matched against inbound chat text.
    pub account_number: String,
    /// Display identifier shown in notifications.
    pub license: String,
    /// Chat identity entitled to notifications for this account.
    pub recipient_id: Option<String>,
    /// Locale-formatted expiry string (authoritative input).
    pub expire_date_raw: String,
    /// Cached resolution of `expire_date_raw` into an absolute instant.
    pub expire_date_resolved: Option<NaiveDateTime>,
    #[cfg_attr(feature = "server", sqlx(try_from = "String"))]
    pub status: AccountStatus,
    /// Set once a notification went out for the current expired/suspended
    /// occupancy; reset when the account is observed `valid` again.
    pub notified: bool,
    /// Stable string form of the last successfully notified status.
    pub last_notified_status: Option<String>,
    /// Calendar-day marker for the daily near-expiry reminder cadence.
    pub last_nearly_expired_notified_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AccountRecord {
    /// Create a fresh `valid` account, resolving the expiry cache from the
    /// raw string (an unresolvable string leaves the cache empty; the
    /// evaluation pass will report it).
    pub fn new(
        account_number: impl Into<String>,
        license: impl Into<String>,
        expire_date_raw: impl Into<String>,
        now: NaiveDateTime,
    ) -> Self {
        let expire_date_raw = expire_date_raw.into();
        let expire_date_resolved = dates::resolve_expiry(&expire_date_raw).ok();

        Self {
            account_number: account_number.into(),
            license: license.into(),
            recipient_id: None,
            expire_date_raw,
            expire_date_resolved,
            status: AccountStatus::Valid,
            notified: false,
            last_notified_status: None,
            last_nearly_expired_notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The last successfully notified status, as an enum.
    pub fn last_notified(&self) -> Option<AccountStatus> {
        self.last_notified_status
            .as_deref()
            .and_then(AccountStatus::parse)
    }

    /// True when the raw expiry string resolves to an instant that has
    /// already passed. Used by the operational inspection surface; the
    /// reconciliation cycle works from the persisted status instead.
    pub fn has_lapsed(&self, now: NaiveDateTime) -> bool {
        matches!(dates::resolve_expiry(&self.expire_date_raw), Ok(expiry) if expiry < now)
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

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            AccountStatus::Valid,
            AccountStatus::NearlyExpired,
            AccountStatus::Expired,
            AccountStatus::Suspended,
            AccountStatus::Invalid,
        ] {
            assert_eq!(AccountStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AccountStatus::parse("revoked"), None);
    }

    #[test]
    fn administrative_statuses() {
        assert!(AccountStatus::Suspended.is_administrative());
        assert!(AccountStatus::Invalid.is_administrative());
        assert!(!AccountStatus::Expired.is_administrative());
        assert!(!AccountStatus::Valid.is_administrative());
    }

    #[test]
    fn new_account_resolves_expiry_cache() {
        // 31/12/2567 is Buddhist year 2567 → Gregorian 2024.
        let account = AccountRecord::new("123456", "PRO-01", "31/12/2567 22:00", now());
        let resolved = account.expire_date_resolved.expect("should resolve");
        assert_eq!(
            resolved,
            NaiveDate::from_ymd_opt(2024, 12, 31)
                .unwrap()
                .and_hms_opt(22, 0, 0)
                .unwrap()
        );
        assert_eq!(account.status, AccountStatus::Valid);
        assert!(!account.notified);
    }

    #[test]
    fn new_account_tolerates_unresolvable_expiry() {
        let account = AccountRecord::new("123456", "PRO-01", "sometime later", now());
        assert!(account.expire_date_resolved.is_none());
    }

    #[test]
    fn lapsed_is_judged_from_the_raw_string() {
        let account = AccountRecord::new("123456", "PRO-01", "01/01/2560", now());
        assert!(account.has_lapsed(now()));

        let account = AccountRecord::new("123456", "PRO-01", "31/12/2599", now());
        assert!(!account.has_lapsed(now()));
    }
}
