//! Best-effort parsing of chapter publication dates.
//!
//! Sources print dates either relatively ("3 hours ago") or as
//! `<Month> <day>, <year>`. Anything unrecognised becomes the current
//! instant so that one odd row never fails a whole chapter index.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Parses a chapter date as printed by a source, falling back to now
pub fn parse_chapter_date(text: &str) -> DateTime<Utc> {
    parse_chapter_date_at(text, Utc::now())
}

/// Same as [`parse_chapter_date`] with an explicit "now"
pub fn parse_chapter_date_at(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let text = text.trim();
    let lower = text.to_ascii_lowercase();

    if ["second", "minute", "hour"]
        .iter()
        .any(|unit| lower.contains(unit))
    {
        return now;
    }

    parse_month_day_year(text).unwrap_or(now)
}

/// Parses `Mar 5, 2023` / `March 5, 2023` to midnight UTC of that day
fn parse_month_day_year(text: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    let [month, day, year] = parts.as_slice() else {
        return None;
    };

    let month = month_number(month)?;
    let day: u32 = day.trim_end_matches(',').parse().ok()?;
    let year: i32 = year.parse().ok()?;

    let midnight = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];

    let name = name.trim_end_matches('.').to_ascii_lowercase();
    if name.len() < 3 {
        return None;
    }

    MONTHS
        .iter()
        .position(|m| name.starts_with(m))
        .map(|i| i as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, Timelike};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_relative_hours_is_now() {
        let parsed = parse_chapter_date("2 hours ago");
        let drift = (Utc::now() - parsed).num_seconds().abs();
        assert!(drift < 5, "expected within a few seconds of now, got {}s", drift);
    }

    #[test]
    fn test_relative_minutes_is_now() {
        assert_eq!(parse_chapter_date_at("15 minutes ago", fixed_now()), fixed_now());
        assert_eq!(parse_chapter_date_at("1 Hour Ago", fixed_now()), fixed_now());
    }

    #[test]
    fn test_absolute_date() {
        let parsed = parse_chapter_date_at("Mar 5, 2023", fixed_now());
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day()),
            (2023, 3, 5)
        );
        assert_eq!(parsed.hour(), 0);
    }

    #[test]
    fn test_full_month_name() {
        let parsed = parse_chapter_date_at("December 25, 2022", fixed_now());
        assert_eq!(parsed, Utc.with_ymd_and_hms(2022, 12, 25, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_garbled_text_falls_back_to_now() {
        assert_eq!(parse_chapter_date_at("garbled text", fixed_now()), fixed_now());
        let parsed = parse_chapter_date("garbled text");
        assert!(Utc::now() - parsed < Duration::seconds(5));
    }

    #[test]
    fn test_invalid_calendar_date_falls_back_to_now() {
        assert_eq!(parse_chapter_date_at("Feb 30, 2023", fixed_now()), fixed_now());
        assert_eq!(parse_chapter_date_at("Foo 5, 2023", fixed_now()), fixed_now());
        assert_eq!(parse_chapter_date_at("", fixed_now()), fixed_now());
    }
}
