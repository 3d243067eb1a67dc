use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, FromRow)]
pub struct MessageRecord {
    pub id: String,
    pub chat: String,
    pub text: String,
    /// RFC3339 with millisecond precision.
    pub timestamp: String,
    pub processed_at: Option<String>,
}

impl MessageRecord {
    pub fn new(
        id: impl Into<String>,
        chat: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            chat: chat.into(),
            text: text.into(),
            timestamp: format_timestamp(&timestamp),
            processed_at: None,
        }
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    pub fn processed_at_utc(&self) -> Option<DateTime<Utc>> {
        self.processed_at.as_deref().and_then(parse_timestamp)
    }

    pub fn is_marked_processed(&self) -> bool {
        self.processed_at.is_some()
    }
}

/// `2024-05-01T08:30:00.000Z`
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_is_iso8601_with_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
        let rec = MessageRecord::new("42", "field-reports", "hello", ts);
        assert_eq!(rec.timestamp, "2024-05-01T08:30:00.000Z");
        assert_eq!(rec.timestamp_utc(), Some(ts));
        assert!(!rec.is_marked_processed());
        assert_eq!(rec.processed_at_utc(), None);
    }
}
