#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]

use hifitime::Epoch;
use thiserror::Error;

pub mod behavior;
pub mod blocks;
pub mod calendar;
pub mod chebyshev;
pub mod datasource;
pub mod ephemeris;
pub mod file;
pub mod preamble;
pub mod reader;
pub mod selection;
pub mod timespan;
pub mod timespec;
pub mod weftball;
pub mod writer;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::{
        behavior::ValueBehavior,
        blocks::{
            Block, FortyEightHourBlock, FortyEightHourSectionHeader, MonthlyBlock, MultiYearBlock,
        },
        calendar::Date,
        datasource::{DataSource, EphemerisDataSource},
        ephemeris::{Ephemeris, Position, Quantity},
        file::WeftFile,
        preamble::Preamble,
        reader::WeftReader,
        timespec::TimeSpec,
        weftball::{Weftball, WeftEphemeris},
        writer::WeftWriter,
        Error,
    };
    // re-export
    pub use hifitime::{Duration, Epoch, Unit};
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("not enough bytes available")]
    NotEnoughBytes,
    #[error("invalid preamble")]
    InvalidPreamble,
    #[error("unknown block marker 0x{0:04x}")]
    UnknownMarker(u16),
    #[error("forty-eight hour block without a preceding section header")]
    MissingSectionHeader,
    #[error("section advertises {expected} blocks, stream holds {found}")]
    TruncatedSection { expected: u32, found: u32 },
    #[error("section advertises {expected} bytes per block, found {found}")]
    BlockSizeMismatch { expected: u16, found: usize },
    #[error("coefficients cannot be NaN")]
    NanCoefficient,
    #[error("invalid calendar date")]
    InvalidDate,
    #[error("month must be within 1-12")]
    InvalidMonth,
    #[error("day count must be within 28-31")]
    InvalidDayCount,
    #[error("multi-year duration must be at least one year")]
    InvalidDuration,
    #[error("section block size {0} cannot hold a marker, a date and a coefficient")]
    InvalidBlockSize(u16),
    #[error("section end day must lie 1 to 400 days after start day")]
    InvalidSectionSpan,
    #[error("x={0} is outside [-1, 1]")]
    OutOfDomain(f64),
    #[error("invalid step size \"{0}\": expecting <n>d, <n>h or <n>m")]
    InvalidStep(String),
    #[error("sample {0} is outside the declared timespan")]
    SampleOutsideTimespan(Epoch),
    #[error("data source holds no samples")]
    EmptyDataSource,
    #[error("data source has no value for {0}")]
    MissingSample(Epoch),
    #[error("quantity {0} is not part of a position triple")]
    NonPositionQuantity(&'static str),
    #[error("instant is outside this block's span")]
    OutOfRange,
    #[error("no block covers {0}")]
    NoBlock(Epoch),
    #[error("files disagree on {0}")]
    IncompatibleFiles(&'static str),
    #[error("least squares fit did not converge")]
    FitFailure,
    #[error("failed to read system clock")]
    SystemTime,
    #[error("i/o error")]
    IoError(#[from] std::io::Error),
    #[error("archive is missing member \"{0}\"")]
    MissingMember(String),
}
