use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Full timestamp formats chat clients show.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y年%m月%d日 %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Whether a message timestamp belongs to `today`.
///
/// Empty or unrecognized timestamps (time-only, weekday labels) count as
/// today: the stream only exposes recent history. `昨天`/`前天` prefixes
/// and dates that parse to another day do not.
pub fn is_today(timestamp: &str, today: NaiveDate) -> bool {
    let ts = timestamp.trim();
    if ts.is_empty() {
        return true;
    }
    if ts.starts_with("昨天") || ts.starts_with("前天") {
        return false;
    }
    if ts.contains(&today.format("%Y-%m-%d").to_string()) {
        return true;
    }
    match parse_date(ts, today.year()) {
        Some(date) => date == today,
        None => true,
    }
}

fn parse_date(ts: &str, year: i32) -> Option<NaiveDate> {
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(ts, fmt) {
            return Some(dt.date());
        }
    }
    // Month-day only: assume the current year.
    NaiveDateTime::parse_from_str(&format!("{year}-{ts}"), "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}
