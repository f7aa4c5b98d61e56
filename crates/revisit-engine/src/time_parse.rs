//! Parsing of relative and absolute times shown on notification cards
//!
//! Relative times ("just now", "5 minutes ago", "3시간 전") resolve to an
//! instant. Calendar dates carry no time of day and resolve to a date only.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use regex::Regex;
use revisit_core::{Result, RevisitError};

/// Outcome of parsing displayed time text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayedTime {
    /// Resolved to an instant
    Instant(DateTime<Utc>),
    /// Only a calendar day is known
    CalendarDate(NaiveDate),
    Unparseable,
}

impl DisplayedTime {
    /// Whether an item showing this time is past a scan cutoff.
    ///
    /// Calendar dates and unparseable text count as past the cutoff so a scan
    /// never walks over a checkpoint boundary it cannot see.
    pub fn reaches_cutoff(&self, cutoff: DateTime<Utc>) -> bool {
        match self {
            DisplayedTime::Instant(at) => *at <= cutoff,
            DisplayedTime::CalendarDate(_) | DisplayedTime::Unparseable => true,
        }
    }
}

/// Compiled patterns for displayed times, English and Korean
#[derive(Debug, Clone)]
pub struct TimeParser {
    just_now: Regex,
    seconds: Regex,
    minutes: Regex,
    hours: Regex,
    days: Regex,
    yesterday: Regex,
    dotted_date: Regex,
    iso_date: Regex,
}

impl TimeParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            just_now: compile(r"(?i)^(just now|방금\s*전?|now)$")?,
            seconds: compile(r"(?i)^(\d+)\s*(seconds?|secs?|초)\s*(ago|전)$")?,
            minutes: compile(r"(?i)^(\d+)\s*(minutes?|mins?|분)\s*(ago|전)$")?,
            hours: compile(r"(?i)^(\d+)\s*(hours?|hrs?|시간)\s*(ago|전)$")?,
            days: compile(r"(?i)^(\d+)\s*(days?|일)\s*(ago|전)$")?,
            yesterday: compile(r"(?i)^(yesterday|어제)$")?,
            dotted_date: compile(r"^(\d{4})\.\s*(\d{1,2})\.\s*(\d{1,2})\.?$")?,
            iso_date: compile(r"^(\d{4})-(\d{2})-(\d{2})$")?,
        })
    }

    /// Parse `text` relative to `now`
    pub fn parse(&self, text: &str, now: DateTime<Utc>) -> DisplayedTime {
        let text = text.trim();

        if self.just_now.is_match(text) {
            return DisplayedTime::Instant(now);
        }

        if let Some(n) = leading_number(&self.seconds, text) {
            return instant_before(now, Duration::try_seconds(n));
        }
        if let Some(n) = leading_number(&self.minutes, text) {
            return instant_before(now, Duration::try_minutes(n));
        }
        if let Some(n) = leading_number(&self.hours, text) {
            return instant_before(now, Duration::try_hours(n));
        }

        // Day-granular relative times lose the time of day like dates do
        if let Some(n) = leading_number(&self.days, text) {
            return date_before(now.date_naive(), Duration::try_days(n));
        }
        if self.yesterday.is_match(text) {
            return date_before(now.date_naive(), Duration::try_days(1));
        }

        for pattern in [&self.dotted_date, &self.iso_date] {
            if let Some(caps) = pattern.captures(text) {
                let date = (|| {
                    let y = caps.get(1)?.as_str().parse().ok()?;
                    let m = caps.get(2)?.as_str().parse().ok()?;
                    let d = caps.get(3)?.as_str().parse().ok()?;
                    NaiveDate::from_ymd_opt(y, m, d)
                })();
                return match date {
                    Some(date) => DisplayedTime::CalendarDate(date),
                    None => DisplayedTime::Unparseable,
                };
            }
        }

        DisplayedTime::Unparseable
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| RevisitError::Other(format!("bad time pattern: {}", e)))
}

fn leading_number(pattern: &Regex, text: &str) -> Option<i64> {
    pattern.captures(text)?.get(1)?.as_str().parse().ok()
}

// Offsets too large for chrono are as good as unreadable
fn instant_before(now: DateTime<Utc>, offset: Option<Duration>) -> DisplayedTime {
    offset
        .and_then(|d| now.checked_sub_signed(d))
        .map_or(DisplayedTime::Unparseable, DisplayedTime::Instant)
}

fn date_before(today: NaiveDate, offset: Option<Duration>) -> DisplayedTime {
    offset
        .and_then(|d| today.checked_sub_signed(d))
        .map_or(DisplayedTime::Unparseable, DisplayedTime::CalendarDate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 15, 0, 0).unwrap()
    }

    #[test]
    fn test_relative_times() {
        let parser = TimeParser::new().unwrap();
        let now = now();

        assert_eq!(parser.parse("just now", now), DisplayedTime::Instant(now));
        assert_eq!(parser.parse("방금 전", now), DisplayedTime::Instant(now));
        assert_eq!(
            parser.parse("5 minutes ago", now),
            DisplayedTime::Instant(now - Duration::minutes(5))
        );
        assert_eq!(
            parser.parse("12분 전", now),
            DisplayedTime::Instant(now - Duration::minutes(12))
        );
        assert_eq!(
            parser.parse("1 hour ago", now),
            DisplayedTime::Instant(now - Duration::hours(1))
        );
        assert_eq!(
            parser.parse(" 3시간 전 ", now),
            DisplayedTime::Instant(now - Duration::hours(3))
        );
    }

    #[test]
    fn test_calendar_dates() {
        let parser = TimeParser::new().unwrap();
        let now = now();
        let expected = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();

        assert_eq!(
            parser.parse("2026. 8. 3.", now),
            DisplayedTime::CalendarDate(expected)
        );
        assert_eq!(
            parser.parse("2026-08-03", now),
            DisplayedTime::CalendarDate(expected)
        );
        assert_eq!(
            parser.parse("2일 전", now),
            DisplayedTime::CalendarDate(NaiveDate::from_ymd_opt(2026, 8, 18).unwrap())
        );
        assert_eq!(parser.parse("2026. 2. 30.", now), DisplayedTime::Unparseable);
    }

    #[test]
    fn test_unparseable() {
        let parser = TimeParser::new().unwrap();
        assert_eq!(parser.parse("sometime", now()), DisplayedTime::Unparseable);
        assert_eq!(parser.parse("", now()), DisplayedTime::Unparseable);
    }

    #[test]
    fn test_huge_offsets_are_unparseable() {
        let parser = TimeParser::new().unwrap();
        let now = now();

        assert_eq!(
            parser.parse("9999999999999 minutes ago", now),
            DisplayedTime::Unparseable
        );
        assert_eq!(parser.parse("99999999 days ago", now), DisplayedTime::Unparseable);
        assert_eq!(
            parser.parse("99999999999999999999 seconds ago", now),
            DisplayedTime::Unparseable
        );
        assert!(DisplayedTime::Unparseable.reaches_cutoff(now));
    }

    #[test]
    fn test_cutoff_is_conservative() {
        let cutoff = now() - Duration::hours(2);
        let date = NaiveDate::from_ymd_opt(2026, 8, 20).unwrap();

        assert!(!DisplayedTime::Instant(now()).reaches_cutoff(cutoff));
        assert!(DisplayedTime::Instant(cutoff).reaches_cutoff(cutoff));
        assert!(DisplayedTime::CalendarDate(date).reaches_cutoff(cutoff));
        assert!(DisplayedTime::Unparseable.reaches_cutoff(cutoff));
    }
}
