/// Time utility functions for the live-update server
///
/// Wire timestamps are RFC 3339 UTC with millisecond precision, assigned at
/// send time, so clients can order messages from one server.
use chrono::{DateTime, SecondsFormat, Utc};

/// Generate current UTC timestamp in RFC 3339 format.
///
/// # Format
/// RFC 3339: "2025-12-17T02:30:00.125Z"
pub fn now_utc() -> String {
    format_utc(Utc::now())
}

/// Format a `DateTime<Utc>` the same way `now_utc()` does.
pub fn format_utc(datetime: DateTime<Utc>) -> String {
    datetime.to_rfc3339_opts(SecondsFormat::Millis, true)
}
