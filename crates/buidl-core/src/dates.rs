//! Best-effort date-range extraction from listing text.
//!
//! Pattern families are tried in a fixed order and the first that yields a
//! valid calendar range wins. Nothing here panics on odd input; a miss is
//! `None` and the caller decides on a fallback.

use std::sync::OnceLock;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::HackathonStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    fn ordered(a: NaiveDate, b: NaiveDate) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }

    /// Midnight UTC on the first day.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.and_time(NaiveTime::MIN).and_utc()
    }

    /// Last second of the final day, UTC.
    pub fn end_utc(&self) -> DateTime<Utc> {
        let last = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        self.end.and_time(last).and_utc()
    }
}

const DASH: &str = r"\s*(?:-|–|—|to)\s*";
const DAY: &str = r"(\d{1,2})(?:st|nd|rd|th)?";
const MONTH: &str = r"([A-Za-z]{3,})\.?";

fn month_from_name(name: &str) -> Option<u32> {
    let month = match name.to_ascii_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn compile(pattern: String) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("valid date pattern")
}

struct Patterns {
    iso: Regex,
    month_day: Regex,
    ordinal: Regex,
    same_month: Regex,
    cross_month: Regex,
    cross_year: Regex,
    day_first: Regex,
}

fn patterns() -> &'static Patterns {
    static RE: OnceLock<Patterns> = OnceLock::new();
    RE.get_or_init(|| Patterns {
        iso: compile(r"\b(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})".to_string()),
        month_day: compile(format!(r"\b{MONTH}\s+{DAY}\b")),
        ordinal: compile(format!(r"\b{MONTH}\s+{DAY},?\s*(\d{{4}})\b")),
        same_month: compile(format!(r"\b{MONTH}\s+{DAY}{DASH}{DAY},?\s*(\d{{4}})\b")),
        cross_month: compile(format!(r"\b{MONTH}\s+{DAY}{DASH}{MONTH}\s+{DAY},?\s*(\d{{4}})\b")),
        cross_year: compile(format!(
            r"\b{MONTH}\s+{DAY},?\s*(\d{{4}}){DASH}{MONTH}\s+{DAY},?\s*(\d{{4}})\b"
        )),
        day_first: compile(format!(r"\b{DAY}{DASH}{DAY}\s+{MONTH},?\s+(\d{{4}})\b")),
    })
}

fn num<T: std::str::FromStr>(caps: &Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

fn month_at(caps: &Captures<'_>, idx: usize) -> Option<u32> {
    month_from_name(caps.get(idx)?.as_str())
}

/// End date for a "Month D - D" range: an end day before the start day means
/// the range crossed into the next month (and year, from December).
fn rolled_end(year: i32, month: u32, start_day: u32, end_day: u32) -> Option<NaiveDate> {
    if end_day >= start_day {
        return NaiveDate::from_ymd_opt(year, month, end_day);
    }
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, end_day)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, end_day)
    }
}

fn parse_iso(text: &str) -> Option<DateRange> {
    let days = patterns()
        .iso
        .captures_iter(text)
        .filter_map(|caps| NaiveDate::from_ymd_opt(num(&caps, 1)?, num(&caps, 2)?, num(&caps, 3)?))
        .take(2)
        .collect::<Vec<_>>();
    match days.as_slice() {
        [day] => Some(DateRange::single(*day)),
        [a, b] => Some(DateRange::ordered(*a, *b)),
        _ => None,
    }
}

fn parse_ordinal(text: &str) -> Option<DateRange> {
    let p = patterns();
    let days = p
        .ordinal
        .captures_iter(text)
        .filter_map(|caps| NaiveDate::from_ymd_opt(num(&caps, 3)?, month_at(&caps, 1)?, num(&caps, 2)?))
        .collect::<Vec<_>>();
    // A "Month D" without its own year ("Jan 30 - Feb 2, 2026") belongs to
    // a range family further down. Month words in prose ("may", "march")
    // only count when a day follows them.
    let month_days = p
        .month_day
        .captures_iter(text)
        .filter(|caps| month_at(caps, 1).is_some())
        .count();
    if days.is_empty() || days.len() != month_days {
        return None;
    }
    match days.as_slice() {
        [day] => Some(DateRange::single(*day)),
        [a, b, ..] => Some(DateRange::ordered(*a, *b)),
        [] => None,
    }
}

fn parse_same_month(text: &str) -> Option<DateRange> {
    let caps = patterns().same_month.captures(text)?;
    let month = month_at(&caps, 1)?;
    let (start_day, end_day, year) = (num(&caps, 2)?, num(&caps, 3)?, num(&caps, 4)?);
    let start = NaiveDate::from_ymd_opt(year, month, start_day)?;
    let end = rolled_end(year, month, start_day, end_day)?;
    Some(DateRange { start, end })
}

fn parse_cross_month(text: &str) -> Option<DateRange> {
    let caps = patterns().cross_month.captures(text)?;
    let (start_month, end_month) = (month_at(&caps, 1)?, month_at(&caps, 3)?);
    let year: i32 = num(&caps, 5)?;
    // "Dec 28 - Jan 3, 2027" starts in the previous year.
    let start_year = if end_month < start_month { year - 1 } else { year };
    let start = NaiveDate::from_ymd_opt(start_year, start_month, num(&caps, 2)?)?;
    let end = NaiveDate::from_ymd_opt(year, end_month, num(&caps, 4)?)?;
    Some(DateRange::ordered(start, end))
}

fn parse_cross_year(text: &str) -> Option<DateRange> {
    let caps = patterns().cross_year.captures(text)?;
    let start = NaiveDate::from_ymd_opt(num(&caps, 3)?, month_at(&caps, 1)?, num(&caps, 2)?)?;
    let end = NaiveDate::from_ymd_opt(num(&caps, 6)?, month_at(&caps, 4)?, num(&caps, 5)?)?;
    Some(DateRange::ordered(start, end))
}

fn parse_day_first(text: &str) -> Option<DateRange> {
    let caps = patterns().day_first.captures(text)?;
    let month = month_at(&caps, 3)?;
    let (start_day, end_day, year) = (num(&caps, 1)?, num(&caps, 2)?, num(&caps, 4)?);
    let start = NaiveDate::from_ymd_opt(year, month, start_day)?;
    let end = rolled_end(year, month, start_day, end_day)?;
    Some(DateRange { start, end })
}

pub fn parse_date_range(text: &str) -> Option<DateRange> {
    let families: [fn(&str) -> Option<DateRange>; 6] = [
        parse_iso,
        parse_ordinal,
        parse_same_month,
        parse_cross_month,
        parse_cross_year,
        parse_day_first,
    ];
    families.iter().find_map(|family| family(text))
}

/// Window assumed for a hackathon whose page carried no parseable dates,
/// anchored on the scrape day.
pub fn estimate_window(status: HackathonStatus, today: NaiveDate) -> DateRange {
    match status {
        HackathonStatus::Completed => DateRange {
            start: today - Days::new(90),
            end: today - Days::new(30),
        },
        HackathonStatus::Ongoing | HackathonStatus::Judging => DateRange {
            start: today - Days::new(7),
            end: today + Days::new(21),
        },
        HackathonStatus::Upcoming | HackathonStatus::RegistrationOpen => DateRange {
            start: today + Days::new(14),
            end: today + Days::new(45),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn ordinal_single_day() {
        let r = parse_date_range("Nov 15th, 2024").unwrap();
        assert_eq!(r, DateRange::single(d(2024, 11, 15)));
    }

    #[test]
    fn ordinal_pair_concatenated() {
        let r = parse_date_range("March 3rd, 2026 March 5th, 2026").unwrap();
        assert_eq!(r, DateRange { start: d(2026, 3, 3), end: d(2026, 3, 5) });
    }

    #[test]
    fn month_words_in_prose_do_not_block_a_single_date() {
        assert_eq!(
            parse_date_range("Submissions may close Nov 15, 2024"),
            Some(DateRange::single(d(2024, 11, 15)))
        );
        assert_eq!(
            parse_date_range("Teams march on until Nov 15, 2024"),
            Some(DateRange::single(d(2024, 11, 15)))
        );
        assert_eq!(
            parse_date_range("We may extend: Jan 30 - Feb 2, 2026"),
            Some(DateRange { start: d(2026, 1, 30), end: d(2026, 2, 2) })
        );
    }

    #[test]
    fn cross_month_same_year() {
        let r = parse_date_range("Jan 30 - Feb 2, 2026").unwrap();
        assert_eq!(r.start.month(), 1);
        assert_eq!(r.end.month(), 2);
        assert_eq!(r.start.year(), 2026);
        assert_eq!(r.end.year(), 2026);
    }

    #[test]
    fn cross_month_over_new_year() {
        let r = parse_date_range("Dec 28 – Jan 3, 2027").unwrap();
        assert_eq!(r, DateRange { start: d(2026, 12, 28), end: d(2027, 1, 3) });
    }

    #[test]
    fn same_month_range_and_rollover() {
        assert_eq!(
            parse_date_range("Oct 10 - 12, 2026"),
            Some(DateRange { start: d(2026, 10, 10), end: d(2026, 10, 12) })
        );
        assert_eq!(
            parse_date_range("Jan 30 to 2, 2026"),
            Some(DateRange { start: d(2026, 1, 30), end: d(2026, 2, 2) })
        );
        assert_eq!(
            parse_date_range("December 30 — 2, 2026"),
            Some(DateRange { start: d(2026, 12, 30), end: d(2027, 1, 2) })
        );
    }

    #[test]
    fn cross_year_with_both_years() {
        let r = parse_date_range("Dec 30, 2026 - Jan 4, 2027").unwrap();
        assert_eq!(r, DateRange { start: d(2026, 12, 30), end: d(2027, 1, 4) });
    }

    #[test]
    fn day_first_range() {
        let r = parse_date_range("15 - 17 November 2026").unwrap();
        assert_eq!(r, DateRange { start: d(2026, 11, 15), end: d(2026, 11, 17) });
    }

    #[test]
    fn iso_fragments_win_first() {
        let r = parse_date_range("2026-05-01T00:00:00Z / 2026-05-03T23:59:00Z").unwrap();
        assert_eq!(r, DateRange { start: d(2026, 5, 1), end: d(2026, 5, 3) });
        let r = parse_date_range("Starts 2026/09/09").unwrap();
        assert_eq!(r, DateRange::single(d(2026, 9, 9)));
    }

    #[test]
    fn garbage_and_impossible_dates_are_none() {
        assert_eq!(parse_date_range("not a date"), None);
        assert_eq!(parse_date_range(""), None);
        assert_eq!(parse_date_range("Feb 30, 2026"), None);
        assert_eq!(parse_date_range("Marathon 12, 2026"), None);
    }

    #[test]
    fn estimated_windows_follow_status() {
        let today = d(2026, 6, 1);
        let done = estimate_window(HackathonStatus::Completed, today);
        assert_eq!((done.start, done.end), (d(2026, 3, 3), d(2026, 5, 2)));
        let live = estimate_window(HackathonStatus::Ongoing, today);
        assert_eq!((live.start, live.end), (d(2026, 5, 25), d(2026, 6, 22)));
        let next = estimate_window(HackathonStatus::Upcoming, today);
        assert_eq!((next.start, next.end), (d(2026, 6, 15), d(2026, 7, 16)));
    }

    #[test]
    fn utc_bounds_cover_whole_days() {
        let r = DateRange::single(d(2026, 6, 1));
        assert_eq!(r.start_utc().to_rfc3339(), "2026-06-01T00:00:00+00:00");
        assert_eq!(r.end_utc().to_rfc3339(), "2026-06-01T23:59:59+00:00");
    }
}
