//! Calendar-day parsing and formatting.
//!
//! Days are stored and exchanged as `YYYY-MM-DD` strings, which sort
//! lexicographically in date order so the store can range-scan on them.

use anyhow::{Context, Result, anyhow};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

const DAY_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Parse a strict `YYYY-MM-DD` day.
pub fn parse_day(s: &str) -> Result<Date> {
    Date::parse(s, DAY_FORMAT).with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", s))
}

/// Format a day as `YYYY-MM-DD`.
pub fn format_day(day: Date) -> String {
    // A year/month/day format cannot fail for a Date; the Display form
    // has the same shape if it ever does
    day.format(DAY_FORMAT).unwrap_or_else(|_| day.to_string())
}

/// The calendar day (UTC) a unix timestamp falls on.
pub fn day_from_unix(secs: i64) -> Option<Date> {
    OffsetDateTime::from_unix_timestamp(secs).ok().map(|t| t.date())
}

/// Parse a date bound: either an absolute `YYYY-MM-DD` day or a relative
/// expression like `90d`, `12w`, `6m`, `2y` counted back from `today`.
/// Months and years are approximated as 30 and 365 days.
pub fn parse_date_expr(s: &str, today: Date) -> Result<Date> {
    let s = s.trim();
    if let Some((amount, unit)) = split_relative(s) {
        let n: i64 = amount
            .parse()
            .with_context(|| format!("invalid relative date '{}'", s))?;
        let days = match unit {
            'd' => n,
            'w' => n * 7,
            'm' => n * 30,
            'y' => n * 365,
            _ => unreachable!(),
        };
        return today
            .checked_sub(Duration::days(days))
            .ok_or_else(|| anyhow!("relative date '{}' is out of range", s));
    }
    parse_day(s)
}

fn split_relative(s: &str) -> Option<(&str, char)> {
    let unit = s.chars().last()?;
    if !matches!(unit, 'd' | 'w' | 'm' | 'y') {
        return None;
    }
    let amount = &s[..s.len() - 1];
    if amount.is_empty() || !amount.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((amount, unit))
}
