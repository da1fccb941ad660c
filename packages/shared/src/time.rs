//! Time formatting helpers for terminal display.

use std::fmt;

use chrono::{DateTime, Local, TimeZone, Utc};

/// Format a timestamp as a local wall-clock time (`HH:MM:SS`).
pub fn format_clock(timestamp: &DateTime<Utc>) -> String {
    format_clock_in(timestamp, &Local)
}

fn format_clock_in<Tz>(timestamp: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    timestamp.with_timezone(zone).format("%H:%M:%S").to_string()
}
