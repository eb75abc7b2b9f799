use chrono::{DateTime, Local, SecondsFormat, Utc};

/// Milliseconds since the epoch.
pub fn time_millis() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_millis()
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Soft-delete marker format, `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn deleted_stamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Local compact timestamp used in default workflow names.
pub fn compact_local() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// Parses an RFC 3339 string into UTC.
pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc))
}
