//! Formatting helpers for terminal output.

use chrono::{DateTime, Utc};

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else {
        format!("{}d ago", duration.num_days())
    }
}

/// Format a millisecond duration as seconds with two decimals (e.g., "12.35s").
pub fn format_duration_ms(ms: i64) -> String {
    format!("{:.2}s", ms as f64 / 1000.0)
}
