//! Locale-specific expiry date normalization.
//!
//! Expiry dates arrive as `DD/MM/YYYY[ HH:MM]` strings with the year in the
//! Buddhist Era (Gregorian + 543), the format the upstream account tooling
//! produces. Normalization is a pure function: it either yields an absolute
//! `NaiveDateTime` or an explicit [`AccountError::DateParse`], never a
//! sentinel value downstream code could mistake for "no expiry".

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::errors::{AccountError, AccountResult};

/// Offset between the Buddhist Era and the Gregorian calendar.
pub const BUDDHIST_ERA_OFFSET: i32 = 543;

/// Years above this threshold are taken to be Buddhist Era years.
///
/// A Gregorian year can plausibly reach 2500; a Buddhist year below it cannot
/// describe any date this system manages (BE 2500 is Gregorian 1957).
const BUDDHIST_YEAR_THRESHOLD: i32 = 2500;

/// Formats accepted for already-native timestamps.
const NATIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Resolve a locale-formatted expiry string into an absolute instant.
///
/// Accepts `DD/MM/YYYY` with an optional ` HH:MM` suffix (missing time means
/// midnight), plus ISO-style timestamps that were already normalized
/// upstream. Years above 2500 are interpreted as Buddhist Era and shifted by
/// [`BUDDHIST_ERA_OFFSET`]; the correction touches the year only.
pub fn resolve_expiry(raw: &str) -> AccountResult<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AccountError::DateParse("empty expiry string".to_string()));
    }

    // Already-native values pass through untouched.
    for format in NATIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(parsed);
        }
    }

    let mut parts = raw.split_whitespace();
    let date_part = parts
        .next()
        .ok_or_else(|| AccountError::DateParse(format!("missing date component in '{raw}'")))?;
    let time_part = parts.next();

    let fields: Vec<&str> = date_part.split('/').collect();
    if fields.len() != 3 {
        return Err(AccountError::DateParse(format!(
            "expected DD/MM/YYYY, got '{date_part}'"
        )));
    }

    let day: u32 = parse_int(fields[0], "day", raw)?;
    let month: u32 = parse_int(fields[1], "month", raw)?;
    let mut year: i32 = parse_int(fields[2], "year", raw)?;
    if year > BUDDHIST_YEAR_THRESHOLD {
        year -= BUDDHIST_ERA_OFFSET;
    }

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        AccountError::DateParse(format!("'{date_part}' is not a valid calendar date"))
    })?;

    let time = match time_part {
        None => NaiveTime::MIN,
        Some(t) => {
            let (hour, minute) = t.split_once(':').ok_or_else(|| {
                AccountError::DateParse(format!("expected HH:MM time, got '{t}'"))
            })?;
            let hour: u32 = parse_int(hour, "hour", raw)?;
            let minute: u32 = parse_int(minute, "minute", raw)?;
            NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
                AccountError::DateParse(format!("'{t}' is not a valid time of day"))
            })?
        }
    };

    Ok(NaiveDateTime::new(date, time))
}

fn parse_int<T: std::str::FromStr>(field: &str, name: &str, raw: &str) -> AccountResult<T> {
    field
        .parse()
        .map_err(|_| AccountError::DateParse(format!("unparsable {name} '{field}' in '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn buddhist_year_is_shifted_to_gregorian() {
        let resolved = resolve_expiry("15/08/2567 09:30").unwrap();
        assert_eq!(resolved, date(2024, 8, 15, 9, 30));
    }

    #[test]
    fn year_correction_leaves_day_and_month_alone() {
        // Day 25 / month 3 must survive the year shift untouched.
        let resolved = resolve_expiry("25/03/2568").unwrap();
        assert_eq!(resolved, date(2025, 3, 25, 0, 0));
    }

    #[test]
    fn threshold_boundary_on_both_sides() {
        // 2500 is not shifted; 2501 is.
        assert_eq!(
            resolve_expiry("01/01/2500").unwrap(),
            date(2500, 1, 1, 0, 0)
        );
        assert_eq!(
            resolve_expiry("01/01/2501").unwrap(),
            date(2501 - BUDDHIST_ERA_OFFSET, 1, 1, 0, 0)
        );
    }

    #[test]
    fn gregorian_year_passes_through() {
        let resolved = resolve_expiry("31/12/2024 23:59").unwrap();
        assert_eq!(resolved, date(2024, 12, 31, 23, 59));
    }

    #[test]
    fn missing_time_defaults_to_midnight() {
        let resolved = resolve_expiry("01/06/2567").unwrap();
        assert_eq!(resolved, date(2024, 6, 1, 0, 0));
    }

    #[test]
    fn native_timestamps_pass_through() {
        assert_eq!(
            resolve_expiry("2024-12-31T22:00:00").unwrap(),
            date(2024, 12, 31, 22, 0)
        );
        assert_eq!(
            resolve_expiry("2024-12-31 22:00:00").unwrap(),
            date(2024, 12, 31, 22, 0)
        );
    }

    #[test]
    fn invalid_calendar_dates_are_rejected() {
        assert!(matches!(
            resolve_expiry("32/13/2567"),
            Err(AccountError::DateParse(_))
        ));
        assert!(matches!(
            resolve_expiry("29/02/2566"), // BE 2566 → 2023, not a leap year
            Err(AccountError::DateParse(_))
        ));
    }

    #[test]
    fn garbage_is_rejected_not_panicked_on() {
        for raw in ["", "   ", "soon", "15-08-2567", "15/08", "15/08/банк"] {
            assert!(matches!(
                resolve_expiry(raw),
                Err(AccountError::DateParse(_))
            ));
        }
    }

    #[test]
    fn invalid_time_component_is_rejected() {
        assert!(matches!(
            resolve_expiry("15/08/2567 25:00"),
            Err(AccountError::DateParse(_))
        ));
        assert!(matches!(
            resolve_expiry("15/08/2567 0930"),
            Err(AccountError::DateParse(_))
        ));
    }
}
