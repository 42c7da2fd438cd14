//! Forty-eight hour blocks: the finest precision layer.
//!
//! Each block covers the 48 h window `[d-24h, d+24h)` around midnight UTC
//! of its center date, so adjacent daily blocks overlap by a full day and
//! the evaluator can blend them. On the wire a block carries no explicit
//! coefficient count: it is padded with trailing zeros to its section's
//! count, and stripped again on decode.
use crate::{
    blocks::{check_coeffs, read_f32, read_u16, read_u8, write_f32, write_u16, write_u8},
    calendar::Date,
    chebyshev,
    Error,
};

use hifitime::Epoch;

const HALF_WINDOW_SECONDS: f64 = 24.0 * 3600.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FortyEightHourBlock {
    /// Center date; the block spans midnight of this day ± 24 h.
    pub center: Date,
    /// Significant coefficients, trailing zeros stripped.
    pub coeffs: Vec<f32>,
}

impl FortyEightHourBlock {
    pub const MARKER: u16 = 0x0001;

    pub fn new(center: Date, mut coeffs: Vec<f32>) -> Result<Self, Error> {
        check_coeffs(&coeffs)?;
        while coeffs.len() > 1 && coeffs[coeffs.len() - 1] == 0.0 {
            coeffs.pop();
        }
        if coeffs.is_empty() {
            coeffs.push(0.0);
        }
        Ok(Self { center, coeffs })
    }

    /// Serialized size under a section storing `coefficient_count`
    /// coefficients per block, marker included.
    pub fn encoding_size(coefficient_count: usize) -> usize {
        2 + 4 + 4 * coefficient_count
    }

    /// Encodes the block, padding (or truncating) the coefficients to the
    /// section's count.
    pub fn encode(&self, coefficient_count: usize, buf: &mut [u8]) -> Result<usize, Error> {
        let mut ptr = 0;
        write_u16(buf, &mut ptr, Self::MARKER)?;
        write_u16(buf, &mut ptr, self.center.year)?;
        write_u8(buf, &mut ptr, self.center.month)?;
        write_u8(buf, &mut ptr, self.center.day)?;
        for k in 0..coefficient_count {
            let c = self.coeffs.get(k).copied().unwrap_or(0.0);
            write_f32(buf, &mut ptr, c)?;
        }
        Ok(ptr)
    }

    /// Decodes a block body (`buf` positioned after the marker) holding
    /// exactly `coefficient_count` stored coefficients.
    pub fn decode(buf: &[u8], coefficient_count: usize) -> Result<(Self, usize), Error> {
        let mut ptr = 0;
        let year = read_u16(buf, &mut ptr)?;
        let month = read_u8(buf, &mut ptr)?;
        let day = read_u8(buf, &mut ptr)?;
        let center = Date::new(year, month, day)?;
        let mut coeffs = Vec::with_capacity(coefficient_count);
        for _ in 0..coefficient_count {
            coeffs.push(read_f32(buf, &mut ptr)?);
        }
        let block = Self::new(center, coeffs)?;
        Ok((block, ptr))
    }

    /// Midnight UTC of the center date.
    pub fn center_midnight(&self) -> Epoch {
        self.center.midnight()
    }

    /// Whether `t` lies in `[center - 24h, center + 24h)`.
    pub fn contains(&self, t: Epoch) -> bool {
        let offset = (t - self.center_midnight()).to_seconds();
        (-HALF_WINDOW_SECONDS..HALF_WINDOW_SECONDS).contains(&offset)
    }

    /// Maps `t` to `[-1, 1]`: -1 at `center - 24h`, 0 at midnight of the
    /// center date, +1 at `center + 24h`.
    pub fn normalize(&self, t: Epoch) -> f64 {
        (t - self.center_midnight()).to_seconds() / HALF_WINDOW_SECONDS
    }

    /// Triangular blending weight of `t` inside this block's window: 0 at
    /// either edge, 1 at the center.
    pub(crate) fn blend_weight(&self, t: Epoch) -> f64 {
        let s = (self.normalize(t) + 1.0) / 2.0;
        (1.0 - (2.0 * s - 1.0).abs()).max(0.0)
    }

    pub fn evaluate(&self, t: Epoch) -> Result<f64, Error> {
        if !self.contains(t) {
            return Err(Error::OutOfRange);
        }
        chebyshev::eval_f32(&self.coeffs, self.normalize(t))
    }
}
