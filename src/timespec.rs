//! Time specifications for multi-instant queries, and Julian date
//! conversions.
use crate::Error;

use hifitime::{Duration, Epoch, Unit};
use std::str::FromStr;

/// Days between the Julian epoch and the Unix epoch.
const UNIX_EPOCH_JD: f64 = 2440587.5;

/// Julian date of a UTC instant.
pub fn julian_date(t: Epoch) -> f64 {
    t.to_unix_seconds() / 86400.0 + UNIX_EPOCH_JD
}

/// UTC instant of a Julian date.
pub fn epoch_from_julian(jd: f64) -> Epoch {
    Epoch::from_unix_seconds((jd - UNIX_EPOCH_JD) * 86400.0)
}

/// Parses a step size string `<n>d`, `<n>h` or `<n>m` with positive `n`.
pub fn parse_step(step: &str) -> Result<Duration, Error> {
    let invalid = || Error::InvalidStep(step.to_string());
    if step.len() < 2 {
        return Err(invalid());
    }
    let (digits, unit) = step.split_at(step.len() - 1);
    let n = u32::from_str(digits).map_err(|_| invalid())?;
    if n == 0 {
        return Err(invalid());
    }
    let unit = match unit {
        "d" => Unit::Day,
        "h" => Unit::Hour,
        "m" => Unit::Minute,
        _ => return Err(invalid()),
    };
    Ok(n as f64 * unit)
}

/// The instants a multi-time query targets: either an explicit list, or a
/// `[start, stop]` range walked at a fixed step.
#[derive(Debug, Clone, PartialEq)]
pub enum TimeSpec {
    Dates(Vec<Epoch>),
    Range {
        start: Epoch,
        stop: Epoch,
        step: Duration,
    },
}

impl TimeSpec {
    pub fn from_dates(dates: Vec<Epoch>) -> Self {
        Self::Dates(dates)
    }

    pub fn from_range(start: Epoch, stop: Epoch, step: &str) -> Result<Self, Error> {
        let step = parse_step(step)?;
        Ok(Self::Range { start, stop, step })
    }

    /// Materializes every instant this spec covers, in order. Range stops
    /// are inclusive when the step lands on them.
    pub fn time_points(&self) -> Vec<Epoch> {
        match self {
            Self::Dates(dates) => dates.clone(),
            Self::Range { start, stop, step } => {
                let mut points = Vec::new();
                let mut current = *start;
                while current <= *stop {
                    points.push(current);
                    current = current + *step;
                }
                points
            },
        }
    }
}
