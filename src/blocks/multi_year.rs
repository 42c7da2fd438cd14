//! Multi-year blocks: whole-year spans under a single polynomial.
//!
//! The most space efficient kind, and the least precise. The writer emits
//! one per decade and one per year touching the generated span; slow
//! movers (outer planets) are well served by this layer alone.
use crate::{
    blocks::{check_coeffs, read_f32, read_i16, read_u16, read_u32, write_f32, write_i16, write_u16, write_u32},
    calendar::{day_of_year, days_in_year},
    chebyshev,
    Error,
};

use hifitime::Epoch;

#[derive(Debug, Clone, PartialEq)]
pub struct MultiYearBlock {
    /// First year covered.
    pub start_year: i16,
    /// Number of whole years covered.
    pub duration: u16,
    /// Chebyshev coefficients over the span, float32 storage precision.
    pub coeffs: Vec<f32>,
}

impl MultiYearBlock {
    pub const MARKER: u16 = 0x0003;

    pub fn new(start_year: i16, duration: u16, coeffs: Vec<f32>) -> Result<Self, Error> {
        if duration == 0 {
            return Err(Error::InvalidDuration);
        }
        check_coeffs(&coeffs)?;
        Ok(Self {
            start_year,
            duration,
            coeffs,
        })
    }

    /// Total serialized size, marker included.
    pub fn encoding_size(&self) -> usize {
        2 + 2 + 2 + 4 + 4 * self.coeffs.len()
    }

    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let mut ptr = 0;
        write_u16(buf, &mut ptr, Self::MARKER)?;
        write_i16(buf, &mut ptr, self.start_year)?;
        write_u16(buf, &mut ptr, self.duration)?;
        write_u32(buf, &mut ptr, self.coeffs.len() as u32)?;
        for &c in &self.coeffs {
            write_f32(buf, &mut ptr, c)?;
        }
        Ok(ptr)
    }

    /// Decodes the block body, `buf` positioned right after the marker.
    /// Returns the block and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), Error> {
        let mut ptr = 0;
        let start_year = read_i16(buf, &mut ptr)?;
        let duration = read_u16(buf, &mut ptr)?;
        let count = read_u32(buf, &mut ptr)? as usize;
        let mut coeffs = Vec::with_capacity(count);
        for _ in 0..count {
            coeffs.push(read_f32(buf, &mut ptr)?);
        }
        let block = Self::new(start_year, duration, coeffs)?;
        Ok((block, ptr))
    }

    /// Whether `t` lies in `[start_year, start_year + duration)`.
    pub fn contains(&self, t: Epoch) -> bool {
        let (year, _, _, _, _, _, _) = t.to_gregorian_utc();
        let start = self.start_year as i32;
        year >= start && year < start + self.duration as i32
    }

    /// Maps `t` to `[-1, 1]` over the year span. The day of year positions
    /// the instant inside its year as a fraction.
    pub fn normalize(&self, t: Epoch) -> f64 {
        let (year, month, day, _, _, _, _) = t.to_gregorian_utc();
        let doy = day_of_year(year, month, day);
        let year_float = year as f64 + (doy as f64 - 1.0) / days_in_year(year) as f64;
        2.0 * (year_float - self.start_year as f64) / self.duration as f64 - 1.0
    }

    pub fn evaluate(&self, t: Epoch) -> Result<f64, Error> {
        if !self.contains(t) {
            return Err(Error::OutOfRange);
        }
        chebyshev::eval_f32(&self.coeffs, self.normalize(t))
    }
}
