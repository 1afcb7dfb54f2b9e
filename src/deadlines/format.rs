use chrono::{DateTime, FixedOffset, Utc};

/// Whole days / hours / minutes between now and a due instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl TimeRemaining {
    /// Clamps to zero when `due` is already in the past.
    pub fn between(now: DateTime<Utc>, due: DateTime<Utc>) -> Self {
        let total = (due - now).num_seconds().max(0);
        Self {
            days: total / 86_400,
            hours: (total % 86_400) / 3_600,
            minutes: (total % 3_600) / 60,
        }
    }

    /// `"3 hours, 05 minutes"` under a day, `"4 days"` otherwise.
    pub fn render(&self) -> String {
        if self.days < 1 {
            format!("{} hours, {:02} minutes", self.hours, self.minutes)
        } else {
            format!("{} days", self.days)
        }
    }
}

const DUE_FORMAT: &str = "%d %B %H:%M";

pub fn format_due(due: DateTime<Utc>, offset: &FixedOffset) -> String {
    due.with_timezone(offset).format(DUE_FORMAT).to_string()
}
