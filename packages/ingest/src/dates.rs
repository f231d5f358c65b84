//! Calendar helpers for COUNTER month tokens and reporting periods.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

/// `Mmm-YYYY` (or the shortened `Mmm-YY`) as used in COUNTER 5 tabular headers.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static COUNTER_MONTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<month>\w{3})-(?P<year>\d{2}(\d{2})?)$").expect("valid regex")
});

/// `Mmm YYYY` / `Month YYYY` as seen in hand-made exports.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static NAMED_MONTH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<month>[A-Za-z]{3,9})[ -](?P<year>\d{4})$").expect("valid regex")
});

const MONTH_ABBRS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Parse a COUNTER 5 month token (`Jan-2019` or `Jan-19`) into its first day.
///
/// Two-digit years below 50 land in the 2000s, the rest in the 1900s.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use counter_ingest::dates::parse_counter_month;
///
/// assert_eq!(parse_counter_month("Jan-2019"), NaiveDate::from_ymd_opt(2019, 1, 1));
/// assert_eq!(parse_counter_month("Jul-89"), NaiveDate::from_ymd_opt(1989, 7, 1));
/// assert_eq!(parse_counter_month("Foo-2019"), None);
/// ```
#[must_use]
pub fn parse_counter_month(text: &str) -> Option<NaiveDate> {
    let captures = COUNTER_MONTH_PATTERN.captures(text)?;
    let mut year: i32 = captures["year"].parse().ok()?;
    if year < 50 {
        year += 2000;
    } else if year < 100 {
        year += 1900;
    }
    let month = MONTH_ABBRS.iter().position(|abbr| *abbr == &captures["month"])?;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()? + 1, 1)
}

/// Parse a date in one of the layouts vendors actually send.
///
/// Accepts ISO dates and datetimes, `YYYY-MM`, `YYYY/MM/DD`, US-ordered
/// `MM/DD/YYYY` and named months (`Jan 2019`, `January-2019`, `Jan-19`).
/// Month-only inputs resolve to the first day of the month.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use counter_ingest::dates::parse_loose_date;
///
/// assert_eq!(parse_loose_date("2019-05-31"), NaiveDate::from_ymd_opt(2019, 5, 31));
/// assert_eq!(parse_loose_date("2019-05"), NaiveDate::from_ymd_opt(2019, 5, 1));
/// assert_eq!(parse_loose_date("1/31/2020"), NaiveDate::from_ymd_opt(2020, 1, 31));
/// assert_eq!(parse_loose_date("nonsense"), None);
/// ```
#[must_use]
pub fn parse_loose_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    for layout in ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, layout) {
            return Some(date);
        }
    }
    for layout in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(text, layout) {
            return Some(datetime.date());
        }
    }
    if let Ok(datetime) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    if let Some(date) = parse_year_month(text) {
        return Some(date);
    }
    if let Some(date) = parse_counter_month(text) {
        return Some(date);
    }
    parse_named_month(text)
}

fn parse_year_month(text: &str) -> Option<NaiveDate> {
    let (year, month) = text.split_once('-').or_else(|| text.split_once('/'))?;
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

fn parse_named_month(text: &str) -> Option<NaiveDate> {
    let captures = NAMED_MONTH_PATTERN.captures(text)?;
    let name = captures["month"].to_lowercase();
    let month = MONTH_NAMES
        .iter()
        .position(|full| *full == name || (name.len() == 3 && full.starts_with(&name)))?;
    NaiveDate::from_ymd_opt(
        captures["year"].parse().ok()?,
        u32::try_from(month).ok()? + 1,
        1,
    )
}

/// First day of the month containing `date`.
#[must_use]
pub fn begin_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use counter_ingest::dates::end_month;
///
/// let feb = NaiveDate::from_ymd_opt(2020, 2, 10).unwrap();
/// assert_eq!(end_month(feb), NaiveDate::from_ymd_opt(2020, 2, 29).unwrap());
/// ```
#[must_use]
pub fn end_month(date: NaiveDate) -> NaiveDate {
    next_month(begin_month(date))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

fn next_month(first: NaiveDate) -> Option<NaiveDate> {
    if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    }
}

/// First days of all months between `start` and `end`, both inclusive.
///
/// Empty when `end` precedes `start`.
#[must_use]
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = Some(begin_month(start));
    while let Some(month) = current.filter(|month| *month <= end) {
        months.push(month);
        current = next_month(month);
    }
    months
}

/// Memo for column-header month tokens.
///
/// Header cells repeat across files of the same layout and the set of
/// distinct calendar tokens is small, so entries are never evicted.
#[derive(Debug, Default)]
pub struct MonthTokenCache {
    entries: HashMap<String, Option<NaiveDate>>,
}

impl MonthTokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Month denoted by a column header, normalized to its first day.
    pub fn month(&mut self, token: &str) -> Option<NaiveDate> {
        if let Some(cached) = self.entries.get(token) {
            return *cached;
        }
        let parsed = parse_counter_month(token)
            .or_else(|| parse_year_month(token))
            .or_else(|| parse_named_month(token))
            .map(begin_month);
        self.entries.insert(token.to_string(), parsed);
        parsed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
