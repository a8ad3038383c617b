use chrono::{DateTime, TimeZone, Utc};

/// `YYYY-MM-DD HH:MM:SS` rendering of a unix-millisecond timestamp, UTC.
pub fn unix_ms_to_time(unix_ms: i64) -> String {
    match Utc.timestamp_millis_opt(unix_ms).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => String::new(),
    }
}

/// Short named form used in notification footers, e.g. `Tue, Oct 15 14:05:09`.
pub fn named_time(time: &DateTime<Utc>) -> String {
    time.format("%a, %b %-d %H:%M:%S").to_string()
}
