// src/utils/format.rs
use chrono::{DateTime, Utc};

// Format a timestamp relative to now
pub fn format_time_ago(time: DateTime<Utc>) -> String {
    format_time_between(time, Utc::now())
}

fn format_time_between(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(time);

    let seconds = duration.num_seconds().max(0);

    if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", duration.num_minutes())
    } else if seconds < 86400 {
        format!("{} hours ago", duration.num_hours())
    } else if seconds < 2592000 {
        format!("{} days ago", duration.num_days())
    } else if seconds < 31536000 {
        format!("{} months ago", duration.num_days() / 30)
    } else {
        format!("{} years ago", duration.num_days() / 365)
    }
}

// Truncate a string to at most `max_len` characters
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn relative_times() {
        let now = Utc::now();
        assert_eq!(format_time_between(now - Duration::seconds(5), now), "5 seconds ago");
        assert_eq!(format_time_between(now - Duration::hours(3), now), "3 hours ago");
        assert_eq!(format_time_between(now - Duration::days(400), now), "1 years ago");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("project-name-long", 10), "project...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }
}
