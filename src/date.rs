//! Calendar handling for WDM date tuples.
//!
//! WDM stores dates as six integers (year, month, day, hour, minute, second)
//! and historically allows `hour == 24` to mean the end of a day. Everything
//! in here works on [`WdmDate`] and leans on `chrono` for the calendar
//! arithmetic, so month and year intervals are exact rather than fixed
//! second counts.

use std::fmt;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use nom::IResult;
use nom::Parser;
use nom::bytes::complete::take_till;
use nom::character::complete::digit1;
use nom::multi::many0;
use nom::sequence::preceded;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WdmError};

/// Time units a data set can be stepped in (`TCODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeCode {
    Second = 1,
    Minute = 2,
    Hour = 3,
    Day = 4,
    Month = 5,
    Year = 6,
}

impl TimeCode {
    pub const ALL: [TimeCode; 6] = [
        TimeCode::Second,
        TimeCode::Minute,
        TimeCode::Hour,
        TimeCode::Day,
        TimeCode::Month,
        TimeCode::Year,
    ];

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(TimeCode::Second),
            2 => Some(TimeCode::Minute),
            3 => Some(TimeCode::Hour),
            4 => Some(TimeCode::Day),
            5 => Some(TimeCode::Month),
            6 => Some(TimeCode::Year),
            _ => None,
        }
    }

    /// Like [`TimeCode::from_code`] but reports an out of table code as a bad date spec.
    pub fn try_from_code(code: i32) -> Result<Self> {
        Self::from_code(code)
            .ok_or_else(|| WdmError::InvalidDate(format!("time code {code} is not in 1..=6")))
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            TimeCode::Second => "second",
            TimeCode::Minute => "minute",
            TimeCode::Hour => "hour",
            TimeCode::Day => "day",
            TimeCode::Month => "month",
            TimeCode::Year => "year",
        }
    }

    /// Short frequency code used when naming the series interval.
    pub fn freq_alias(self) -> &'static str {
        match self {
            TimeCode::Second => "S",
            TimeCode::Minute => "T",
            TimeCode::Hour => "H",
            TimeCode::Day => "D",
            TimeCode::Month => "MS",
            TimeCode::Year => "AS",
        }
    }

    /// Length of one unit in seconds, for the fixed-length codes.
    fn fixed_seconds(self) -> Option<i64> {
        match self {
            TimeCode::Second => Some(1),
            TimeCode::Minute => Some(60),
            TimeCode::Hour => Some(3_600),
            TimeCode::Day => Some(86_400),
            TimeCode::Month | TimeCode::Year => None,
        }
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A WDM date tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WdmDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl Default for WdmDate {
    fn default() -> Self {
        WdmDate::new(1900, 1, 1, 0, 0, 0)
    }
}

impl WdmDate {
    pub const fn new(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        WdmDate { year, month, day, hour, minute, second }
    }

    pub const fn ymd(year: i32, month: u32, day: u32) -> Self {
        WdmDate::new(year, month, day, 0, 0, 0)
    }

    /// Build from the on-disk six integer representation.
    pub fn from_parts(parts: [i32; 6]) -> Result<Self> {
        if parts[1..].iter().any(|p| *p < 0) {
            return Err(WdmError::InvalidDate(format!("{parts:?}")));
        }
        let date = WdmDate::new(
            parts[0],
            parts[1] as u32,
            parts[2] as u32,
            parts[3] as u32,
            parts[4] as u32,
            parts[5] as u32,
        );
        date.validate()?;
        Ok(date)
    }

    pub fn to_parts(&self) -> [i32; 6] {
        [
            self.year,
            self.month as i32,
            self.day as i32,
            self.hour as i32,
            self.minute as i32,
            self.second as i32,
        ]
    }

    /// Checks field ranges; hour 24 is accepted only at minute and second zero.
    pub fn validate(&self) -> Result<()> {
        let day_ok = NaiveDate::from_ymd_opt(self.year, self.month, self.day).is_some();
        let time_ok = if self.hour == 24 {
            self.minute == 0 && self.second == 0
        } else {
            self.hour < 24 && self.minute < 60 && self.second < 60
        };
        if day_ok && time_ok {
            Ok(())
        } else {
            Err(WdmError::InvalidDate(self.to_string()))
        }
    }

    /// Rewrites the hour 24 form into hour 0 of the next day.
    ///
    /// Any other date is returned unchanged, which makes this idempotent.
    pub fn normalize(self) -> Result<Self> {
        if self.hour != 24 {
            return Ok(self);
        }
        let midnight = NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|d| d.succ_opt())
            .ok_or_else(|| WdmError::InvalidDate(self.to_string()))?;
        Ok(WdmDate::ymd(midnight.year(), midnight.month(), midnight.day()))
    }

    pub fn to_datetime(&self) -> Result<NaiveDateTime> {
        let n = self.normalize()?;
        NaiveDate::from_ymd_opt(n.year, n.month, n.day)
            .and_then(|d| d.and_hms_opt(n.hour, n.minute, n.second))
            .ok_or_else(|| WdmError::InvalidDate(self.to_string()))
    }

    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        WdmDate::new(dt.year(), dt.month(), dt.day(), dt.hour(), dt.minute(), dt.second())
    }

    /// Keeps only the fields that are significant for `tcode`; finer fields
    /// are reset to their first value.
    pub fn truncate(&self, tcode: TimeCode) -> Self {
        let code = tcode.code();
        WdmDate {
            year: self.year,
            month: if code <= 5 { self.month } else { 1 },
            day: if code <= 4 { self.day } else { 1 },
            hour: if code <= 3 { self.hour } else { 0 },
            minute: if code <= 2 { self.minute } else { 0 },
            second: if code <= 1 { self.second } else { 0 },
        }
    }

    /// Moves `count` intervals of `tsstep` units of `tcode` (negative counts go back).
    pub fn advance(&self, tcode: TimeCode, tsstep: i32, count: i64) -> Result<Self> {
        let start = self.to_datetime()?;
        let units = count
            .checked_mul(i64::from(tsstep))
            .ok_or_else(|| WdmError::InvalidDate(format!("{self} + {count} x {tsstep} {tcode}")))?;
        let moved = match tcode.fixed_seconds() {
            Some(secs) => units
                .checked_mul(secs)
                .and_then(TimeDelta::try_seconds)
                .and_then(|delta| start.checked_add_signed(delta)),
            None => {
                let months = if tcode == TimeCode::Year { units.checked_mul(12) } else { Some(units) };
                months.and_then(|m| add_months(start, m))
            }
        };
        moved
            .map(WdmDate::from_datetime)
            .ok_or_else(|| WdmError::InvalidDate(format!("{self} + {count} x {tsstep} {tcode}")))
    }
}

fn add_months(start: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        start.checked_add_months(Months::new(magnitude))
    } else {
        start.checked_sub_months(Months::new(magnitude))
    }
}

/// Number of whole `tsstep`-sized `tcode` intervals from `start` up to `end`.
///
/// Month and year intervals are counted on the calendar: an interval only
/// counts once `end` has reached the same day-of-month and time of day.
/// Returns a negative count when `end` precedes `start`.
pub fn time_difference(start: WdmDate, end: WdmDate, tcode: TimeCode, tsstep: i32) -> Result<i64> {
    if tsstep <= 0 {
        return Err(WdmError::InvalidDate(format!("time step {tsstep} must be positive")));
    }
    let s = start.to_datetime()?;
    let e = end.to_datetime()?;
    let units = match tcode.fixed_seconds() {
        Some(secs) => (e - s).num_seconds() / secs,
        None => {
            let mut months = i64::from(e.year() - s.year()) * 12
                + i64::from(e.month()) - i64::from(s.month());
            // Partial trailing month does not count.
            let s_rest = (s.day(), s.num_seconds_from_midnight());
            let e_rest = (e.day(), e.num_seconds_from_midnight());
            if months > 0 && e_rest < s_rest {
                months -= 1;
            } else if months < 0 && e_rest > s_rest {
                months += 1;
            }
            if tcode == TimeCode::Year { months / 12 } else { months }
        }
    };
    Ok(units / i64::from(tsstep))
}

fn digit_groups(input: &str) -> IResult<&str, Vec<&str>> {
    many0(preceded(take_till(|c: char| c.is_ascii_digit()), digit1)).parse(input)
}

/// Parses free-form date text by pulling out the groups of digits.
///
/// `"1970-01-01T00:00"`, `"1970 1 1"` and `"1970"` are all accepted; missing
/// trailing fields default to `1900-01-01 00:00:00`'s fields and anything
/// after the sixth group is ignored.
pub fn parse_date(text: &str) -> Result<WdmDate> {
    let (_, groups) = digit_groups(text).map_err(|_| WdmError::InvalidDate(text.to_string()))?;
    if groups.is_empty() {
        return Err(WdmError::InvalidDate(text.to_string()));
    }
    let mut parts = WdmDate::default().to_parts();
    for (slot, group) in parts.iter_mut().zip(groups) {
        *slot = group
            .parse::<i32>()
            .map_err(|_| WdmError::InvalidDate(text.to_string()))?;
    }
    WdmDate::from_parts(parts)
}

impl std::str::FromStr for WdmDate {
    type Err = WdmError;

    fn from_str(s: &str) -> Result<Self> {
        parse_date(s)
    }
}

impl fmt::Display for WdmDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
