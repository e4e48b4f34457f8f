use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a provider date label into a calendar date.
///
/// Accepts `YYYY-MM-DD`, optionally followed by a time part
/// (`YYYY-MM-DDTHH:MM:SS[.fff][Z]` or `YYYY-MM-DD HH:MM:SS`). The time part is dropped.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.len() < 10 || !s.is_ascii() || &s[4..5] != "-" || &s[7..8] != "-" {
        return None;
    }
    if s.len() == 10 {
        return NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
    }
    match &s[10..11] {
        "T" | " " => {}
        _ => return None,
    }
    let naive = s.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f%:z"))
        .map(|dt| dt.date())
        .ok()
}

/// Format a date the way every view labels its axes.
pub fn label(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Days since 1970-01-01, as Arrow's `Date32` stores them.
pub fn to_epoch_days(d: NaiveDate) -> i32 {
    (d - DateTime::<Utc>::UNIX_EPOCH.date_naive()).num_days() as i32
}
