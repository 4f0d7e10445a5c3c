//! Relative formatting for post timestamps.
//!
//! Posts store a real creation instant; the display string is derived
//! against the render instant so it stays accurate on redisplay.

use chrono::{DateTime, Utc};

/// Render `created_at` relative to `now`, e.g. `Just now`, `5m ago`,
/// `2h ago`, `3d ago`, or the calendar date past a week.
///
/// Instants in the future (clock skew between devices) render as
/// `Just now`.
pub fn format_relative(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);
    let secs = elapsed.num_seconds();

    if secs < 60 {
        return "Just now".to_string();
    }
    if secs < 3600 {
        return format!("{}m ago", secs / 60);
    }
    if secs < 86_400 {
        return format!("{}h ago", secs / 3600);
    }
    let days = secs / 86_400;
    if days < 7 {
        return format!("{}d ago", days);
    }
    created_at.format("%b %-d, %Y").to_string()
}
