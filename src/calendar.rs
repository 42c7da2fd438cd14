//! UTC civil calendar helpers shared by the block kinds.
use crate::Error;

use core::fmt;
use hifitime::{Epoch, Unit};

pub(crate) fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

pub(crate) fn days_in_year(year: i32) -> u16 {
    if is_leap_year(year) {
        366
    } else {
        365
    }
}

pub(crate) fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        },
        _ => 0,
    }
}

/// One-based day of year of a (validated) calendar date.
pub(crate) fn day_of_year(year: i32, month: u8, day: u8) -> u16 {
    let mut doy = day as u16;
    for m in 1..month {
        doy += days_in_month(year, m) as u16;
    }
    doy
}

/// A UTC calendar day, as serialized in forty-eight hour section headers
/// and block identities (u16 year, u8 month, u8 day).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

impl Date {
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self, Error> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidDate);
        }
        if day == 0 || day > days_in_month(year as i32, month) {
            return Err(Error::InvalidDate);
        }
        Ok(Self { year, month, day })
    }

    /// UTC calendar day containing this instant. None if the year does
    /// not fit the serialized u16 range.
    pub fn from_epoch(t: Epoch) -> Option<Self> {
        let (y, m, d, _, _, _, _) = t.to_gregorian_utc();
        if !(0..=u16::MAX as i32).contains(&y) {
            return None;
        }
        Some(Self {
            year: y as u16,
            month: m,
            day: d,
        })
    }

    /// Midnight UTC opening this day.
    pub fn midnight(&self) -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(self.year as i32, self.month, self.day)
    }

    pub fn add_days(&self, days: i64) -> Option<Self> {
        let t = self.midnight() + (days as f64) * Unit::Day;
        Self::from_epoch(t)
    }

    pub fn next_day(&self) -> Option<Self> {
        self.add_days(1)
    }

    /// Whole days from self to other (negative when other is earlier).
    pub fn days_until(&self, other: &Self) -> i64 {
        (other.midnight() - self.midnight()).to_unit(Unit::Day).round() as i64
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}
