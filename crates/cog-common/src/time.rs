//! Time handling for CF-convention time axes and date-stamped filenames.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{CogError, CogResult};

const SECONDS_PER_DAY: i64 = 86_400;
const MILLIS_PER_DAY: i64 = SECONDS_PER_DAY * 1000;

/// Days before the first of each month in a 365-day year.
const NOLEAP_CUMULATIVE_DAYS: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
const NOLEAP_MONTH_DAYS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

// ============================================================================
// CF time units
// ============================================================================

/// Unit of a CF time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl TimeUnit {
    fn parse(s: &str) -> CogResult<Self> {
        match s.to_lowercase().as_str() {
            "days" | "day" | "d" => Ok(TimeUnit::Days),
            "hours" | "hour" | "hr" | "hrs" | "h" => Ok(TimeUnit::Hours),
            "minutes" | "minute" | "min" | "mins" => Ok(TimeUnit::Minutes),
            "seconds" | "second" | "sec" | "secs" | "s" => Ok(TimeUnit::Seconds),
            other => Err(CogError::InvalidTime(format!("unknown time unit '{}'", other))),
        }
    }

    fn seconds(self) -> f64 {
        match self {
            TimeUnit::Days => SECONDS_PER_DAY as f64,
            TimeUnit::Hours => 3600.0,
            TimeUnit::Minutes => 60.0,
            TimeUnit::Seconds => 1.0,
        }
    }
}

/// CF calendar attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Calendar {
    /// "standard" / "gregorian", decoded proleptically.
    #[default]
    Standard,
    ProlepticGregorian,
    /// "noleap" / "365_day"
    NoLeap,
}

impl Calendar {
    pub fn parse(s: &str) -> CogResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "gregorian" => Ok(Calendar::Standard),
            "proleptic_gregorian" => Ok(Calendar::ProlepticGregorian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            other => Err(CogError::UnsupportedCalendar(other.to_string())),
        }
    }
}

/// Parsed `"<unit> since <epoch>"` string.
#[derive(Debug, Clone, PartialEq)]
pub struct CfTimeUnits {
    pub unit: TimeUnit,
    pub epoch: NaiveDateTime,
}

impl CfTimeUnits {
    pub fn parse(units: &str) -> CogResult<Self> {
        let (unit, epoch) = units
            .split_once(" since ")
            .ok_or_else(|| CogError::InvalidTime(format!("expected '<unit> since <date>': {}", units)))?;

        Ok(Self {
            unit: TimeUnit::parse(unit.trim())?,
            epoch: parse_epoch(epoch)?,
        })
    }

    /// Convert an offset on this axis to a calendar timestamp.
    pub fn decode(&self, value: f64, calendar: Calendar) -> CogResult<NaiveDateTime> {
        if !value.is_finite() {
            return Err(CogError::InvalidTime(format!("non-finite time value {}", value)));
        }
        let millis = (value * self.unit.seconds() * 1000.0).round() as i64;

        let decoded = match calendar {
            Calendar::Standard | Calendar::ProlepticGregorian => self
                .epoch
                .checked_add_signed(Duration::milliseconds(millis)),
            Calendar::NoLeap => noleap_add(self.epoch, millis),
        };

        decoded.ok_or_else(|| {
            CogError::InvalidTime(format!("time value {} overflows from {}", value, self.epoch))
        })
    }
}

/// Decode one CF time value. A missing calendar means "standard".
pub fn decode_cf_time(value: f64, units: &str, calendar: Option<&str>) -> CogResult<NaiveDateTime> {
    let calendar = match calendar {
        Some(c) => Calendar::parse(c)?,
        None => Calendar::Standard,
    };
    CfTimeUnits::parse(units)?.decode(value, calendar)
}

fn parse_epoch(s: &str) -> CogResult<NaiveDateTime> {
    let invalid = || CogError::InvalidTime(format!("cannot parse reference date '{}'", s));

    let trimmed = s.trim().trim_end_matches("UTC").trim().trim_end_matches('Z');
    let (date_part, time_part) = match trimmed.split_once(|c| c == ' ' || c == 'T') {
        Some((d, t)) => (d, Some(t.trim())),
        None => (trimmed, None),
    };

    let mut fields = date_part.split('-');
    let year: i32 = fields.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
    let month: u32 = match fields.next() {
        Some(v) => v.parse().map_err(|_| invalid())?,
        None => 1,
    };
    let day: u32 = match fields.next() {
        Some(v) => v.parse().map_err(|_| invalid())?,
        None => 1,
    };
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;

    let time = match time_part {
        Some(t) if !t.is_empty() => {
            // Drop a trailing numeric offset such as "+00:00".
            let t = t.split('+').next().unwrap_or(t);
            let mut hms = t.split(':');
            let hour: u32 = hms.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
            let minute: u32 = match hms.next() {
                Some(v) => v.parse().map_err(|_| invalid())?,
                None => 0,
            };
            let second: f64 = match hms.next() {
                Some(v) => v.parse().map_err(|_| invalid())?,
                None => 0.0,
            };
            let whole = second.trunc() as u32;
            let nanos = ((second - second.trunc()) * 1e9).round() as u32;
            NaiveTime::from_hms_nano_opt(hour, minute, whole, nanos).ok_or_else(invalid)?
        }
        _ => NaiveTime::MIN,
    };

    Ok(date.and_time(time))
}

fn noleap_add(epoch: NaiveDateTime, millis: i64) -> Option<NaiveDateTime> {
    let month_idx = epoch.month0() as usize;
    let day = epoch.day().min(NOLEAP_MONTH_DAYS[month_idx]);
    let epoch_doy = (NOLEAP_CUMULATIVE_DAYS[month_idx] + day - 1) as i64;
    let epoch_days = epoch.year() as i64 * 365 + epoch_doy;

    let total = epoch_days
        .checked_mul(MILLIS_PER_DAY)?
        .checked_add(epoch.num_seconds_from_midnight() as i64 * 1000)?
        .checked_add(millis)?;

    let days = total.div_euclid(MILLIS_PER_DAY);
    let ms_of_day = total.rem_euclid(MILLIS_PER_DAY);
    let year = i32::try_from(days.div_euclid(365)).ok()?;
    let doy = days.rem_euclid(365) as u32;

    let month0 = NOLEAP_CUMULATIVE_DAYS
        .iter()
        .rposition(|&start| start <= doy)?;
    let day = doy - NOLEAP_CUMULATIVE_DAYS[month0] + 1;

    let secs = (ms_of_day / 1000) as u32;
    let nanos = ((ms_of_day % 1000) * 1_000_000) as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)?;
    NaiveDate::from_ymd_opt(year, month0 as u32 + 1, day).map(|d| d.and_time(time))
}

/// Calendar date from a year and 1-based day of year.
pub fn day_of_year_to_date(year: i32, doy: u32) -> Option<NaiveDate> {
    NaiveDate::from_yo_opt(year, doy)
}

/// English month name for 1-based `month`.
pub fn month_name(month: u32) -> Option<&'static str> {
    const NAMES: [&str; 12] = [
        "January",
        "February",
        "March",
        "April",
        "May",
        "June",
        "July",
        "August",
        "September",
        "October",
        "November",
        "December",
    ];
    NAMES.get((month as usize).checked_sub(1)?).copied()
}

// ============================================================================
// Filename dates
// ============================================================================

/// Temporal extent one catalog item covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatetimeRange {
    Day,
    Month,
    Year,
}

impl FromStr for DatetimeRange {
    type Err = CogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" => Ok(DatetimeRange::Day),
            "month" => Ok(DatetimeRange::Month),
            "year" => Ok(DatetimeRange::Year),
            other => Err(CogError::InvalidParameter {
                param: "datetime_range".to_string(),
                message: format!("expected day, month or year, got '{}'", other),
            }),
        }
    }
}

impl DatetimeRange {
    fn start_of(self, dt: NaiveDateTime) -> NaiveDateTime {
        let date = dt.date();
        let start = match self {
            DatetimeRange::Day => Some(date),
            DatetimeRange::Month => date.with_day(1),
            DatetimeRange::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        };
        start.unwrap_or(date).and_time(NaiveTime::MIN)
    }

    fn end_of(self, dt: NaiveDateTime) -> NaiveDateTime {
        let date = dt.date();
        let last_day = match self {
            DatetimeRange::Day => Some(date),
            DatetimeRange::Month => {
                let (y, m) = if date.month() == 12 {
                    (date.year() + 1, 1)
                } else {
                    (date.year(), date.month() + 1)
                };
                NaiveDate::from_ymd_opt(y, m, 1).and_then(|d| d.pred_opt())
            }
            DatetimeRange::Year => NaiveDate::from_ymd_opt(date.year(), 12, 31),
        };
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        last_day.unwrap_or(date).and_time(end_of_day)
    }
}

/// Dates recovered from a filename.
///
/// Either `start`/`end` are set (a range) or `single` is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DateExtraction {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub single: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DateShape {
    YearMonthDayDashed,
    YearMonthDay,
    YearMonthDashed,
    YearMonth,
    Year,
}

fn date_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_(\d[\d-]*)").expect("date token pattern is valid"))
}

fn classify_token(token: &str) -> Option<(DateShape, NaiveDateTime)> {
    let digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let num = |s: &str| s.parse::<u32>().ok();

    let (shape, y, m, d) = match token.len() {
        10 if token.as_bytes()[4] == b'-' && token.as_bytes()[7] == b'-' => (
            DateShape::YearMonthDayDashed,
            &token[0..4],
            Some(&token[5..7]),
            Some(&token[8..10]),
        ),
        8 if digits(token) => (
            DateShape::YearMonthDay,
            &token[0..4],
            Some(&token[4..6]),
            Some(&token[6..8]),
        ),
        7 if token.as_bytes()[4] == b'-' => {
            (DateShape::YearMonthDashed, &token[0..4], Some(&token[5..7]), None)
        }
        6 if digits(token) => (DateShape::YearMonth, &token[0..4], Some(&token[4..6]), None),
        4 if digits(token) => (DateShape::Year, &token[0..4], None, None),
        _ => return None,
    };

    let year = y.parse::<i32>().ok()?;
    let month = match m {
        Some(m) => num(m)?,
        None => 1,
    };
    let day = match d {
        Some(d) => num(d)?,
        None => 1,
    };
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some((shape, date.and_time(NaiveTime::MIN)))
}

/// Find `_`-prefixed date tokens in `text`.
///
/// Tokens are tried from the most to the least specific shape and only the
/// first shape that matches anything is used. With a `range`, the result
/// spans the enclosing periods of the earliest and latest date; without one
/// a single date gives `single` and several give `start`/`end`.
pub fn extract_dates(text: &str, range: Option<DatetimeRange>) -> Option<DateExtraction> {
    let mut found: Vec<(DateShape, NaiveDateTime)> = date_token_regex()
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| classify_token(m.as_str()))
        .collect();

    let best = found.iter().map(|(shape, _)| *shape).min()?;
    found.retain(|(shape, _)| *shape == best);

    let min = found.iter().map(|(_, dt)| *dt).min()?;
    let max = found.iter().map(|(_, dt)| *dt).max()?;

    let extraction = match range {
        Some(range) => DateExtraction {
            start: Some(range.start_of(min)),
            end: Some(range.end_of(max)),
            single: None,
        },
        None if min != max => DateExtraction {
            start: Some(min),
            end: Some(max),
            single: None,
        },
        None => DateExtraction {
            single: Some(min),
            ..Default::default()
        },
    };
    Some(extraction)
}
