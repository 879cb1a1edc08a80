//! Shared utilities for w1-temp-reporter

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Timestamp layout used on the wire and in spreadsheet rows
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way readings report it
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Format a duration in seconds to human readable string
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    if seconds == 0 {
        format!("{}ms", duration.as_millis())
    } else if seconds < 60 {
        format!("{}s", seconds)
    } else {
        let mins = seconds / 60;
        let secs = seconds % 60;
        if secs == 0 {
            format!("{}m", mins)
        } else {
            format!("{}m {}s", mins, secs)
        }
    }
}

/// Serde adapter for `NaiveDateTime` fields rendered with [`TIME_FORMAT`]
pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIME_FORMAT).map_err(serde::de::Error::custom)
    }
}
