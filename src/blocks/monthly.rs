//! Monthly blocks: one calendar month per polynomial, the middle
//! precision layer.
use crate::{
    blocks::{check_coeffs, read_f32, read_i16, read_u32, read_u8, write_f32, write_i16, write_u16, write_u32, write_u8},
    calendar::days_in_month,
    chebyshev,
    Error,
};

use hifitime::Epoch;

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyBlock {
    pub year: i16,
    /// Month number, 1-12.
    pub month: u8,
    /// Real day count of the calendar month, 28-31.
    pub day_count: u8,
    pub coeffs: Vec<f32>,
}

impl MonthlyBlock {
    pub const MARKER: u16 = 0x0000;

    pub fn new(year: i16, month: u8, day_count: u8, coeffs: Vec<f32>) -> Result<Self, Error> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidMonth);
        }
        if !(28..=31).contains(&day_count) {
            return Err(Error::InvalidDayCount);
        }
        check_coeffs(&coeffs)?;
        Ok(Self {
            year,
            month,
            day_count,
            coeffs,
        })
    }

    pub fn encoding_size(&self) -> usize {
        2 + 2 + 1 + 1 + 4 + 4 * self.coeffs.len()
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut ptr = 0;
        write_u16(buf, &mut ptr, Self::MARKER)?;
        write_i16(buf, &mut ptr, self.year)?;
        write_u8(buf, &mut ptr, self.month)?;
        write_u8(buf, &mut ptr, self.day_count)?;
        write_u32(buf, &mut ptr, self.coeffs.len() as u32)?;
        for &c in &self.coeffs {
            write_f32(buf, &mut ptr, c)?;
        }
        Ok(ptr)
    }

    pub fn decode(buf: &[u8]) -> Result<(Self, usize), Error> {
        let mut ptr = 0;
        let year = read_i16(buf, &mut ptr)?;
        let month = read_u8(buf, &mut ptr)?;
        let day_count = read_u8(buf, &mut ptr)?;
        let count = read_u32(buf, &mut ptr)? as usize;
        let mut coeffs = Vec::with_capacity(count);
        for _ in 0..count {
            coeffs.push(read_f32(buf, &mut ptr)?);
        }
        let block = Self::new(year, month, day_count, coeffs)?;
        Ok((block, ptr))
    }

    /// Midnight UTC opening this month.
    pub fn month_start(&self) -> Epoch {
        Epoch::from_gregorian_utc_at_midnight(self.year as i32, self.month, 1)
    }

    /// Midnight UTC opening the following month.
    pub fn month_end(&self) -> Epoch {
        if self.month == 12 {
            Epoch::from_gregorian_utc_at_midnight(self.year as i32 + 1, 1, 1)
        } else {
            Epoch::from_gregorian_utc_at_midnight(self.year as i32, self.month + 1, 1)
        }
    }

    pub fn contains(&self, t: Epoch) -> bool {
        let (year, month, _, _, _, _, _) = t.to_gregorian_utc();
        year == self.year as i32 && month == self.month
    }

    /// Maps `t` to `[-1, 1]` over the month by elapsed seconds.
    pub fn normalize(&self, t: Epoch) -> f64 {
        let total = (self.month_end() - self.month_start()).to_seconds();
        let elapsed = (t - self.month_start()).to_seconds();
        2.0 * (elapsed / total) - 1.0
    }

    pub fn evaluate(&self, t: Epoch) -> Result<f64, Error> {
        if !self.contains(t) {
            return Err(Error::OutOfRange);
        }
        chebyshev::eval_f32(&self.coeffs, self.normalize(t))
    }

    /// The calendar length of `(year, month)`, what `day_count` must hold.
    pub fn expected_day_count(year: i16, month: u8) -> u8 {
        days_in_month(year as i32, month)
    }
}
