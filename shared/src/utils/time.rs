//! Time-related utilities
//!
//! The engine keeps wall-clock time as fractional Unix seconds and persists
//! Unix milliseconds.

use chrono::{DateTime, Local, TimeZone};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current system time in fractional seconds since UNIX epoch
pub fn system_time_secs_f64() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Convert fractional seconds to whole milliseconds, truncating like an
/// integer cast.
pub fn secs_to_millis(secs: f64) -> i64 {
    (secs * 1000.0) as i64
}

pub fn millis_to_secs(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

/// Render a Unix-seconds timestamp in local time for human output.
pub fn format_timestamp(secs: f64) -> String {
    let ms = secs_to_millis(secs);
    match Local.timestamp_millis_opt(ms).single() {
        Some(dt) => {
            let dt: DateTime<Local> = dt;
            dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
        }
        None => format!("{}ms", ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time() {
        // After 2020
        assert!(system_time_secs_f64() > 1_600_000_000.0);
    }

    #[test]
    fn test_millis_conversion() {
        assert_eq!(secs_to_millis(1.0), 1000);
        assert_eq!(secs_to_millis(1.2345), 1234);
        assert_eq!(millis_to_secs(1500), 1.5);
    }

    #[test]
    fn test_format_timestamp_is_not_empty() {
        assert!(!format_timestamp(1_700_000_000.0).is_empty());
    }
}
