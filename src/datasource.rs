//! Sampled data consumed by the writer.
use crate::{
    ephemeris::{Ephemeris, Quantity},
    timespec::{epoch_from_julian, TimeSpec},
    Error,
};

use hifitime::Epoch;
use log::debug;

/// A densely sampled scalar time series over a contiguous range. The
/// writer only ever asks for values on the declared timestamp grid.
pub trait DataSource {
    /// Closed interval of available data.
    fn timespan(&self) -> (Epoch, Epoch);

    /// The raw sample grid, sorted ascending.
    fn timestamps(&self) -> &[Epoch];

    /// Dictionary style lookup on one of the declared timestamps.
    fn value_at(&self, t: Epoch) -> Option<f64>;
}

/// In-memory sample table backing `.weft` generation.
#[derive(Debug, Clone)]
pub struct EphemerisDataSource {
    times: Vec<Epoch>,
    values: Vec<f64>,
}

impl EphemerisDataSource {
    /// Builds the table from raw samples; they are sorted by time. At
    /// least one sample is required.
    pub fn from_samples(mut samples: Vec<(Epoch, f64)>) -> Result<Self, Error> {
        if samples.is_empty() {
            return Err(Error::EmptyDataSource);
        }
        samples.sort_by_key(|(t, _)| *t);
        let (times, values) = samples.into_iter().unzip();
        Ok(Self { times, values })
    }

    /// Samples one positional quantity of `body` from an ephemeris
    /// backend over `[start, stop]` at `step` (`<n>d`, `<n>h` or `<n>m`).
    pub fn from_ephemeris<E: Ephemeris>(
        ephemeris: &E,
        body: &str,
        quantity: Quantity,
        start: Epoch,
        stop: Epoch,
        step: &str,
    ) -> Result<Self, Error> {
        let spec = TimeSpec::from_range(start, stop, step)?;
        let positions = ephemeris.get_positions(body, &spec)?;
        debug!("fetched {} samples of {} for {}", positions.len(), quantity, body);
        let mut samples = Vec::with_capacity(positions.len());
        for (jd, position) in positions {
            samples.push((epoch_from_julian(jd), quantity.extract(&position)?));
        }
        Self::from_samples(samples)
    }
}

impl DataSource for EphemerisDataSource {
    fn timespan(&self) -> (Epoch, Epoch) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    fn timestamps(&self) -> &[Epoch] {
        &self.times
    }

    fn value_at(&self, t: Epoch) -> Option<f64> {
        self.times.binary_search(&t).ok().map(|i| self.values[i])
    }
}
