//! Section headers index the run of forty-eight hour blocks that follows
//! them in the stream.
//!
//! All blocks under one header share one serialized size, so a reader can
//! address the block centered on any day of the section by arithmetic
//! alone. The header's `block_size` is the source of truth for the
//! per-block coefficient count.
use crate::{
    blocks::{read_u16, read_u32, read_u8, write_u16, write_u32, write_u8},
    calendar::Date,
    Error,
};

use hifitime::Epoch;

/// Longest section span the format accepts, in days.
pub const MAX_SECTION_DAYS: i64 = 400;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FortyEightHourSectionHeader {
    /// First center date of the section.
    pub start_day: Date,
    /// Day right after the last center date (exclusive).
    pub end_day: Date,
    /// Exact serialized size of each block under this header, marker
    /// included.
    pub block_size: u16,
    /// Number of forty-eight hour blocks physically present before the
    /// next header (or end of stream).
    pub block_count: u32,
}

impl FortyEightHourSectionHeader {
    pub const MARKER: u16 = 0x0002;

    /// Serialized size of a header, marker included.
    pub const ENCODING_SIZE: usize = 2 + 4 + 4 + 2 + 4;

    pub fn new(start_day: Date, end_day: Date, block_size: u16, block_count: u32) -> Result<Self, Error> {
        let span = start_day.days_until(&end_day);
        if span < 1 || span > MAX_SECTION_DAYS {
            return Err(Error::InvalidSectionSpan);
        }
        if block_count > 0 && (block_size < 10 || (block_size as usize - 6) % 4 != 0) {
            return Err(Error::InvalidBlockSize(block_size));
        }
        Ok(Self {
            start_day,
            end_day,
            block_size,
            block_count,
        })
    }

    /// Per-block coefficient count, derived from `block_size`:
    /// marker (2) + center date (4) + 4 bytes per coefficient.
    pub fn coefficient_count(&self) -> usize {
        (self.block_size as usize).saturating_sub(6) / 4
    }

    pub fn encoding_size(&self) -> usize {
        Self::ENCODING_SIZE
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut ptr = 0;
        write_u16(buf, &mut ptr, Self::MARKER)?;
        write_u16(buf, &mut ptr, self.start_day.year)?;
        write_u8(buf, &mut ptr, self.start_day.month)?;
        write_u8(buf, &mut ptr, self.start_day.day)?;
        write_u16(buf, &mut ptr, self.end_day.year)?;
        write_u8(buf, &mut ptr, self.end_day.month)?;
        write_u8(buf, &mut ptr, self.end_day.day)?;
        write_u16(buf, &mut ptr, self.block_size)?;
        write_u32(buf, &mut ptr, self.block_count)?;
        Ok(ptr)
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), Error> {
        let mut ptr = 0;
        let start_year = read_u16(buf, &mut ptr)?;
        let start_month = read_u8(buf, &mut ptr)?;
        let start_day = read_u8(buf, &mut ptr)?;
        let end_year = read_u16(buf, &mut ptr)?;
        let end_month = read_u8(buf, &mut ptr)?;
        let end_day = read_u8(buf, &mut ptr)?;
        let block_size = read_u16(buf, &mut ptr)?;
        let block_count = read_u32(buf, &mut ptr)?;
        let header = Self::new(
            Date::new(start_year, start_month, start_day)?,
            Date::new(end_year, end_month, end_day)?,
            block_size,
            block_count,
        )?;
        Ok((header, ptr))
    }

    /// Whether a center date belongs to this section (`end_day` exclusive).
    pub fn contains_date(&self, date: &Date) -> bool {
        *date >= self.start_day && *date < self.end_day
    }

    pub fn contains(&self, t: Epoch) -> bool {
        match Date::from_epoch(t) {
            Some(date) => self.contains_date(&date),
            None => false,
        }
    }
}
