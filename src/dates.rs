//! Publication date resolution.
//!
//! Sources report dates in many shapes: RFC 2822 in RSS, RFC 3339 in Atom and
//! NewsAPI, free text on scraped pages, or only as a path segment of the
//! article URL. Every function here returns `None` rather than guessing, and
//! an item whose date stays `None` is kept by the lookback filter.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Free-text dates older than this are treated as misparses.
const MAX_TEXT_DATE_AGE_DAYS: i64 = 3650;

static LEAD_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(posted|published|updated|date)(\s+on)?\s*:?\s*").expect("lead-in regex")
});

static URL_YMD: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/(\d{4})/(\d{1,2})/(\d{1,2})/",
        r"/(\d{4})-(\d{1,2})-(\d{1,2})/",
        r"/(\d{4})(\d{2})(\d{2})/",
        r"(\d{4})-(\d{2})-(\d{2})",
        r"(\d{4})/(\d{2})/(\d{2})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("url date regex"))
    .collect()
});

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%d %H:%M:%S %z"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b. %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%m/%d/%Y",
];

/// Parse a machine-readable timestamp in any of the formats feeds use.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }
    None
}

/// Parse a human-written date such as `"Posted: June 10, 2025"`.
///
/// Rejects dates after `now` and dates more than ten years before it.
pub fn parse_date_text(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() < 8 {
        return None;
    }
    let cleaned = LEAD_IN.replace(&collapsed, "");
    let parsed = parse_timestamp(&cleaned)?;
    if parsed > now || parsed < now - Duration::days(MAX_TEXT_DATE_AGE_DAYS) {
        return None;
    }
    Some(parsed)
}

/// Find a date embedded in an article URL (`/2025/06/22/`, `/20250622/`, ...).
pub fn date_from_url(url: &str) -> Option<DateTime<Utc>> {
    for re in URL_YMD.iter() {
        for caps in re.captures_iter(url) {
            let year: i32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let day: u32 = caps[3].parse().ok()?;
            if !(1990..=2100).contains(&year) {
                continue;
            }
            if let Some(dt) = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
            {
                return Some(dt.and_utc());
            }
        }
    }
    None
}

/// Whether an item falls inside the lookback window.
///
/// Unresolvable dates are kept.
pub fn within_lookback(published_at: Option<DateTime<Utc>>, cutoff: DateTime<Utc>) -> bool {
    match published_at {
        Some(published) => published >= cutoff,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_rfc2822() {
        let dt = parse_timestamp("Tue, 10 Jun 2025 14:30:00 GMT").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 6, 10, 14, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_rfc3339_with_offset() {
        let dt = parse_timestamp("2025-06-10T14:30:00+09:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2025, 6, 10, 5, 30, 0).unwrap());
        assert!(parse_timestamp("2025-06-10T14:30:00Z").is_some());
    }

    #[test]
    fn test_parse_naive_and_plain_dates() {
        assert_eq!(
            parse_timestamp("2025-06-10 08:00:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap()
        );
        assert_eq!(parse_timestamp("2025-06-10").unwrap(), ymd(2025, 6, 10));
        assert_eq!(parse_timestamp("June 10, 2025").unwrap(), ymd(2025, 6, 10));
        assert_eq!(parse_timestamp("10 Jun 2025").unwrap(), ymd(2025, 6, 10));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday-ish").is_none());
    }

    #[test]
    fn test_parse_date_text_strips_lead_in() {
        let now = ymd(2025, 7, 1);
        assert_eq!(parse_date_text("Posted: June 10, 2025", now), Some(ymd(2025, 6, 10)));
        assert_eq!(parse_date_text("Published on 2025-06-10", now), Some(ymd(2025, 6, 10)));
    }

    #[test]
    fn test_parse_date_text_bounds() {
        let now = ymd(2025, 7, 1);
        assert!(parse_date_text("2025-08-01", now).is_none());
        assert!(parse_date_text("2001-01-01", now).is_none());
        assert!(parse_date_text("June", now).is_none());
    }

    #[test]
    fn test_date_from_url() {
        assert_eq!(
            date_from_url("https://techcrunch.com/2025/06/22/openai-ships/"),
            Some(ymd(2025, 6, 22))
        );
        assert_eq!(
            date_from_url("https://example.com/news/20250622/story"),
            Some(ymd(2025, 6, 22))
        );
        assert_eq!(
            date_from_url("https://example.com/post-2025-06-22-launch"),
            Some(ymd(2025, 6, 22))
        );
        assert_eq!(date_from_url("https://example.com/12345678/story"), None);
        assert_eq!(date_from_url("https://example.com/about"), None);
    }

    #[test]
    fn test_within_lookback() {
        let cutoff = ymd(2025, 6, 1);
        assert!(within_lookback(Some(ymd(2025, 6, 2)), cutoff));
        assert!(within_lookback(Some(cutoff), cutoff));
        assert!(!within_lookback(Some(ymd(2025, 5, 31)), cutoff));
        assert!(within_lookback(None, cutoff));
    }
}
