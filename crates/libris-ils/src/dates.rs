//! ILS date normalization.
//!
//! ILS installations emit due and expiry dates in whatever format the site
//! configured. Every accepted format is normalized to a [`NaiveDate`];
//! anything else is an [`IlsError::DateFormat`], never a silent `None`.
//!
//! Accepted inputs:
//! - `YYYYMMDD` (`20120713`)
//! - `D/Mon/YYYY` (`13/jul/2012`, month name case-insensitive)
//! - `D/M/YYYY` and `D/M/YY` (`13/7/2012`, `13/7/12`)
//! - ISO date with optional trailing `Z` (`2012-07-13`, `2012-07-13Z`)
//! - ISO date-time (`2012-07-13T10:00:00Z`, `2012-07-13 10:00:00`)

use crate::error::{IlsError, IlsResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Two-digit years below this value belong to the 2000s, the rest to the 1900s.
pub const TWO_DIGIT_YEAR_PIVOT: i32 = 70;

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parse a non-blank date value.
pub fn parse_ils_date(raw: &str) -> IlsResult<NaiveDate> {
    let value = raw.trim();
    let invalid = || IlsError::DateFormat(value.to_string());

    if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| invalid());
    }

    if value.contains('/') {
        return parse_slashed(value).ok_or_else(invalid);
    }

    let date_part = value.strip_suffix('Z').unwrap_or(value);
    if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Ok(date);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.naive_local().date());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt.date());
        }
    }

    Err(invalid())
}

/// Parse an optional date value. Absent or blank input is `None`.
pub fn parse_optional_date(raw: Option<&str>) -> IlsResult<Option<NaiveDate>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_ils_date(value).map(Some),
    }
}

fn parse_slashed(value: &str) -> Option<NaiveDate> {
    let mut parts = value.split('/');
    let (day, month, year) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let day: u32 = parse_digits(day)?;
    let month = if month.chars().all(|c| c.is_ascii_alphabetic()) {
        month_from_name(month)?
    } else {
        parse_digits(month)?
    };
    let year = match year.len() {
        4 => parse_digits::<i32>(year)?,
        2 => {
            let short: i32 = parse_digits(year)?;
            if short < TWO_DIGIT_YEAR_PIVOT {
                2000 + short
            } else {
                1900 + short
            }
        }
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

fn parse_digits<T: std::str::FromStr>(s: &str) -> Option<T> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Full English month name or its three-letter abbreviation, any case.
fn month_from_name(name: &str) -> Option<u32> {
    let name = name.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name || (name.len() == 3 && m.starts_with(name.as_str())))
        .and_then(|i| u32::try_from(i + 1).ok())
}
