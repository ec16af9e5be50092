use chrono::{DateTime, Utc};

/// Truncate a string to a maximum number of characters, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Creation date for the table, blank when the service sent none
pub fn format_created(created_at: Option<&DateTime<Utc>>) -> String {
    created_at
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_default()
}
