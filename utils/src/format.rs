//! Display helpers for derived presentation fields.

use market_types::Timestamp;

const HOUR: u64 = 3600;
const DAY: u64 = 24 * HOUR;

/// Coarse relative age used on review cards: `Just now`, `5h ago`, `3d ago`.
pub fn format_time_ago(created: Timestamp, now: Timestamp) -> String {
    let elapsed = created.elapsed_since(now);
    let hours = elapsed / HOUR;
    if hours < 1 {
        "Just now".to_string()
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        format!("{}d ago", hours / 24)
    }
}

/// Day-granularity age used on listings: `Today`, `Yesterday`, `4 days ago`.
pub fn format_days_ago(created: Timestamp, now: Timestamp) -> String {
    match created.elapsed_since(now) / DAY {
        0 => "Today".to_string(),
        1 => "Yesterday".to_string(),
        days => format!("{days} days ago"),
    }
}

/// Keep the first `head` and last `tail` characters, eliding the middle.
///
/// Strings too short to benefit are returned unchanged.
pub fn truncate_middle(s: &str, head: usize, tail: usize) -> String {
    let count = s.chars().count();
    if count < head + tail + 3 {
        return s.to_string();
    }
    let start: String = s.chars().take(head).collect();
    let end: String = s.chars().skip(count - tail).collect();
    format!("{start}...{end}")
}

/// One-decimal star average, e.g. `4.5`.
pub fn format_average(average: f64) -> String {
    format!("{average:.1}")
}
