//! Conversion between `NaiveDateTime` and the text columns SQLite stores.

use chrono::{NaiveDate, NaiveDateTime, Timelike, Utc};
use rusqlite::Row;

pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const ACCEPTED: [&str; 5] = [
    FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

pub fn to_db(ts: &NaiveDateTime) -> String {
    ts.format(FORMAT).to_string()
}

pub fn opt_to_db(ts: Option<NaiveDateTime>) -> Option<String> {
    ts.as_ref().map(to_db)
}

pub fn parse(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    ACCEPTED
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Current UTC time truncated to whole seconds, so it survives a round trip.
pub fn now() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

pub(crate) fn column(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    Ok(row.get::<_, Option<String>>(idx)?.as_deref().and_then(parse))
}

pub(crate) fn required_column(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    Ok(column(row, idx)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_sqlite_and_iso_forms() {
        let a = parse("2026-03-01 08:30:00").unwrap();
        let b = parse("2026-03-01T08:30:00").unwrap();
        let c = parse("2026-03-01T08:30").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(to_db(&a), "2026-03-01 08:30:00");
    }

    #[test]
    fn bare_date_is_midnight() {
        let ts = parse("2026-03-01").unwrap();
        assert_eq!(to_db(&ts), "2026-03-01 00:00:00");
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse("yesterday").is_none());
    }
}
