//! Small helpers shared by ingestion: content fingerprints and day checks.

use chrono::{DateTime, Datelike, Local, TimeZone};
use sha2::{Digest, Sha256};

/// SHA-256 of `text`, lowercase hex.
pub fn content_hash(text: impl AsRef<[u8]>) -> String {
    let digest = Sha256::digest(text.as_ref());
    format!("{:x}", digest)
}

/// Whether `instant` falls on today's date in the process local timezone.
pub fn is_same_calendar_day<Tz: TimeZone>(instant: &DateTime<Tz>) -> bool {
    is_same_calendar_day_as(instant, &Local::now())
}

/// Compares calendar dates of `instant` and `now`, both read in `now`'s zone.
pub fn is_same_calendar_day_as<Tz: TimeZone, Z: TimeZone>(
    instant: &DateTime<Tz>,
    now: &DateTime<Z>,
) -> bool {
    let local = instant.with_timezone(&now.timezone());
    local.year() == now.year() && local.month() == now.month() && local.day() == now.day()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};
    use std::collections::HashSet;

    #[test]
    fn hash_is_stable_sha256_hex() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(content_hash("report 42"), content_hash("report 42"));
        assert_eq!(content_hash("").len(), 64);
    }

    #[test]
    fn hash_has_no_collisions_over_corpus() {
        let corpus = [
            "",
            " ",
            "a",
            "A",
            "ab",
            "ba",
            "Поле 5: посев 120 га",
            "Поле 5: посев 121 га",
            "chat-1\nhello",
            "chat-1\nhello ",
            "chat-\n1hello",
            "the quick brown fox",
            "the quick brown fox.",
        ];
        let hashes: HashSet<String> = corpus.iter().map(|s| content_hash(s)).collect();
        assert_eq!(hashes.len(), corpus.len());
    }

    #[test]
    fn now_is_today() {
        assert!(is_same_calendar_day(&Local::now()));
        assert!(is_same_calendar_day(&Utc::now()));
    }

    #[test]
    fn hours_back_from_late_evening_respect_midnight() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now = utc.with_ymd_and_hms(2026, 3, 10, 23, 30, 0).unwrap();
        assert!(!is_same_calendar_day_as(&(now - Duration::hours(25)), &now));
        assert!(is_same_calendar_day_as(&(now - Duration::hours(23)), &now));
    }

    #[test]
    fn instant_is_read_in_the_zone_of_now() {
        let msk = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = msk.with_ymd_and_hms(2026, 3, 11, 1, 0, 0).unwrap();
        // 22:30 UTC on the 10th is already the 11th in +03:00.
        let late_utc = Utc.with_ymd_and_hms(2026, 3, 10, 22, 30, 0).unwrap();
        assert!(is_same_calendar_day_as(&late_utc, &now));
        let earlier_utc = Utc.with_ymd_and_hms(2026, 3, 10, 20, 30, 0).unwrap();
        assert!(!is_same_calendar_day_as(&earlier_utc, &now));
    }

    #[test]
    fn same_day_different_month_or_year_is_false() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let now = utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let last_month = utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let last_year = utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap();
        assert!(!is_same_calendar_day_as(&last_month, &now));
        assert!(!is_same_calendar_day_as(&last_year, &now));
    }
}
