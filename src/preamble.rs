//! The `.weft` text preamble.
//!
//! A single ASCII line of space separated tokens, terminated by one blank
//! line, describing what the block stream holds:
//!
//! ```text
//! #weft! v0.02 mars jpl:horizons 2000s 32bit ecliptic_longitude wrapping[0,360] chebychevs generated@2024-01-05T12:00:00Z
//! ```
//!
//! Body, source tag, precision, quantity and behavior are semantic; the
//! timespan and generation stamp are informational and never compared.
use crate::{behavior::ValueBehavior, Error};

use core::fmt;
use hifitime::Epoch;
use std::str::FromStr;

/// Leading magic token of every `.weft` file.
pub const MAGIC: &str = "#weft!";

/// Format revision this crate reads and writes.
pub const VERSION: &str = "v0.02";

/// Coefficient storage precision tag.
pub const PRECISION_32BIT: &str = "32bit";

/// Approximation scheme tag.
pub const SCHEME: &str = "chebychevs";

#[derive(Debug, Clone, PartialEq)]
pub struct Preamble {
    /// Format revision, e.g. `v0.02`.
    pub version: String,
    /// Body identifier (planet, moon, node..). The format is agnostic to
    /// its meaning.
    pub body: String,
    /// Raw data source tag, e.g. `jpl:horizons`.
    pub source: String,
    /// Human readable timespan, informational only.
    pub timespan: String,
    /// Coefficient precision tag.
    pub precision: String,
    /// Quantity name, e.g. `ecliptic_longitude`.
    pub quantity: String,
    /// Declared value behavior.
    pub behavior: ValueBehavior,
    /// Generation stamp (`generated@` payload), informational only.
    pub generated_at: String,
}

impl Preamble {
    /// Builds a preamble for a freshly generated file, stamped with the
    /// current UTC instant.
    pub fn new(
        body: &str,
        source: &str,
        timespan: &str,
        quantity: &str,
        behavior: ValueBehavior,
    ) -> Result<Self, Error> {
        let now = Epoch::now().map_err(|_| Error::SystemTime)?;
        Ok(Self {
            version: VERSION.to_string(),
            body: body.to_string(),
            source: source.to_string(),
            timespan: timespan.to_string(),
            precision: PRECISION_32BIT.to_string(),
            quantity: quantity.to_string(),
            behavior,
            generated_at: format_utc_stamp(now),
        })
    }

    /// Same semantic content under a new timespan, with a fresh stamp.
    /// Used by the combine operation.
    pub fn with_timespan(&self, timespan: &str) -> Result<Self, Error> {
        let now = Epoch::now().map_err(|_| Error::SystemTime)?;
        let mut preamble = self.clone();
        preamble.timespan = timespan.to_string();
        preamble.generated_at = format_utc_stamp(now);
        Ok(preamble)
    }

    /// Verifies that two files may be combined: body, source tag,
    /// precision, quantity and behavior must agree. Timespan and stamp are
    /// free to differ.
    pub fn check_compatible(&self, rhs: &Self) -> Result<(), Error> {
        if self.body != rhs.body {
            return Err(Error::IncompatibleFiles("body"));
        }
        if self.source != rhs.source {
            return Err(Error::IncompatibleFiles("data source"));
        }
        if self.precision != rhs.precision {
            return Err(Error::IncompatibleFiles("precision"));
        }
        if self.quantity != rhs.quantity {
            return Err(Error::IncompatibleFiles("quantity"));
        }
        if self.behavior != rhs.behavior {
            return Err(Error::IncompatibleFiles("value behavior"));
        }
        Ok(())
    }
}

impl fmt::Display for Preamble {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {} {} {} generated@{}",
            MAGIC,
            self.version,
            self.body,
            self.source,
            self.timespan,
            self.precision,
            self.quantity,
            self.behavior,
            SCHEME,
            self.generated_at,
        )
    }
}

impl FromStr for Preamble {
    type Err = Error;
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = line.trim_end().split(' ').collect();
        if tokens.len() != 10 {
            return Err(Error::InvalidPreamble);
        }
        if tokens[0] != MAGIC || tokens[8] != SCHEME {
            return Err(Error::InvalidPreamble);
        }
        let generated_at = tokens[9]
            .strip_prefix("generated@")
            .ok_or(Error::InvalidPreamble)?;
        Ok(Self {
            version: tokens[1].to_string(),
            body: tokens[2].to_string(),
            source: tokens[3].to_string(),
            timespan: tokens[4].to_string(),
            precision: tokens[5].to_string(),
            quantity: tokens[6].to_string(),
            behavior: ValueBehavior::from_str(tokens[7])?,
            generated_at: generated_at.to_string(),
        })
    }
}

/// ISO-8601 UTC stamp, second resolution.
pub(crate) fn format_utc_stamp(t: Epoch) -> String {
    let (y, m, d, hh, mm, ss, _) = t.to_gregorian_utc();
    format!("{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z", y, m, d, hh, mm, ss)
}
