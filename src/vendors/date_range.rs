//! Date-range normalization for the vendor reporting APIs.
//!
//! Each vendor accepts its own date-range vocabulary: Meta takes named
//! presets or an explicit `since|until` pair, TikTok only coarse lookback
//! buckets. The UI hands us a `{from, to}` pair; these functions translate.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days()
    }
}

/// Meta date-range token: a named preset when the span lines up with one,
/// otherwise an explicit `YYYY-MM-DD|YYYY-MM-DD` pair.
pub fn meta_date_preset(range: &DateRange, today: NaiveDate) -> String {
    let explicit = || format!("{}|{}", range.from, range.to);
    let yesterday = today - Duration::days(1);

    match range.days() {
        0 if range.from == today => "today".to_string(),
        0 => explicit(),
        1 if range.from == yesterday => "yesterday".to_string(),
        1 => explicit(),
        7 => "last_7d".to_string(),
        14 => "last_14d".to_string(),
        30 => "last_30d".to_string(),
        _ => explicit(),
    }
}

/// TikTok lookback bucket. The report API has no custom-range path here, so
/// ranges round up to the smallest covering preset.
pub fn tiktok_date_preset(range: &DateRange) -> &'static str {
    match range.days() {
        d if d <= 7 => "last_7d",
        d if d <= 30 => "last_30d",
        _ => "last_90d",
    }
}

/// Days of lookback a TikTok bucket covers.
pub fn tiktok_bucket_days(preset: &str) -> i64 {
    match preset {
        "last_7d" => 7,
        "last_30d" => 30,
        _ => 90,
    }
}

/// Parse a request-supplied date-range string: either one of the named
/// presets or an explicit `YYYY-MM-DD|YYYY-MM-DD` pair.
pub fn parse_date_range(raw: &str, today: NaiveDate) -> Result<DateRange, String> {
    let lookback = |days: i64| DateRange::new(today - Duration::days(days), today);

    match raw {
        "today" => Ok(DateRange::new(today, today)),
        "yesterday" => {
            let y = today - Duration::days(1);
            Ok(DateRange::new(y, y))
        }
        "last_7d" => Ok(lookback(7)),
        "last_14d" => Ok(lookback(14)),
        "last_30d" => Ok(lookback(30)),
        "last_90d" => Ok(lookback(90)),
        "maximum" => Ok(lookback(730)),
        other => {
            let (from, to) = other
                .split_once('|')
                .ok_or_else(|| format!("Unrecognized date range: {other}"))?;
            let from = from
                .parse::<NaiveDate>()
                .map_err(|_| format!("Invalid start date: {from}"))?;
            let to = to
                .parse::<NaiveDate>()
                .map_err(|_| format!("Invalid end date: {to}"))?;
            if from > to {
                return Err(format!("Start date {from} is after end date {to}"));
            }
            Ok(DateRange::new(from, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn meta_named_tokens_for_standard_spans() {
        let today = d("2026-02-10");
        let range = |days: i64| DateRange::new(today - Duration::days(days), today);

        assert_eq!(meta_date_preset(&range(0), today), "today");
        assert_eq!(meta_date_preset(&range(1), today), "yesterday");
        assert_eq!(meta_date_preset(&range(7), today), "last_7d");
        assert_eq!(meta_date_preset(&range(14), today), "last_14d");
        assert_eq!(meta_date_preset(&range(30), today), "last_30d");
    }

    #[test]
    fn meta_explicit_pair_for_other_spans() {
        let today = d("2026-02-10");
        let range = DateRange::new(d("2026-01-01"), d("2026-01-10"));
        assert_eq!(meta_date_preset(&range, today), "2026-01-01|2026-01-10");

        // single historical day: not "today", so explicit
        let one_day = DateRange::new(d("2026-01-05"), d("2026-01-05"));
        assert_eq!(meta_date_preset(&one_day, today), "2026-01-05|2026-01-05");

        // two-day span not ending yesterday: explicit
        let two_days = DateRange::new(d("2026-01-05"), d("2026-01-06"));
        assert_eq!(meta_date_preset(&two_days, today), "2026-01-05|2026-01-06");
    }

    #[test]
    fn tiktok_rounds_up_to_covering_bucket() {
        let today = d("2026-02-10");
        let range = |days: i64| DateRange::new(today - Duration::days(days), today);

        assert_eq!(tiktok_date_preset(&range(3)), "last_7d");
        assert_eq!(tiktok_date_preset(&range(7)), "last_7d");
        assert_eq!(tiktok_date_preset(&range(8)), "last_30d");
        assert_eq!(tiktok_date_preset(&range(30)), "last_30d");
        assert_eq!(tiktok_date_preset(&range(31)), "last_90d");
        assert_eq!(tiktok_date_preset(&range(365)), "last_90d");
    }

    #[test]
    fn parse_accepts_presets_and_explicit_pairs() {
        let today = d("2026-02-10");

        let r = parse_date_range("last_7d", today).unwrap();
        assert_eq!(r.days(), 7);
        assert_eq!(r.to, today);

        let r = parse_date_range("2026-01-01|2026-01-31", today).unwrap();
        assert_eq!(r.from, d("2026-01-01"));
        assert_eq!(r.to, d("2026-01-31"));

        assert!(parse_date_range("2026-01-31|2026-01-01", today).is_err());
        assert!(parse_date_range("lifetime", today).is_err());
    }
}
