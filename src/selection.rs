//! Block inclusion heuristics.
//!
//! Whether a block is worth emitting depends on how much of its span the
//! source actually covers and how densely it is sampled. The thresholds
//! are shared by the writer's per-block decisions and by the layer
//! recommendation derived from the overall data set.
use crate::{calendar::Date, datasource::DataSource, Error};

use hifitime::{Epoch, Unit};
use log::debug;

/// Minimum fraction of a block span that must lie between the first and
/// last available sample.
pub const MIN_COVERAGE: f64 = 2.0 / 3.0;

/// Minimum samples per day for monthly and forty-eight hour blocks.
pub const MIN_DENSITY_PER_DAY: f64 = 4.0;

/// Minimum overall samples per day to enable the forty-eight hour layer.
pub const MIN_DAILY_LAYER_DENSITY: f64 = 8.0;

/// Per-layer generation settings.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LayerConfig {
    pub enabled: bool,
    pub polynomial_degree: usize,
}

/// Which block layers to emit and at which polynomial degree.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GenerationConfig {
    pub multi_year: LayerConfig,
    pub monthly: LayerConfig,
    pub forty_eight_hour: LayerConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            multi_year: LayerConfig {
                enabled: false,
                polynomial_degree: 63,
            },
            monthly: LayerConfig {
                enabled: false,
                polynomial_degree: 23,
            },
            forty_eight_hour: LayerConfig {
                enabled: false,
                polynomial_degree: 11,
            },
        }
    }
}

/// Derives the layer enablement from the overall sampling density and
/// total span: multi-year blocks once the span reaches two thirds of a
/// year, monthly at 4 samples/day, forty-eight hour at 8 samples/day.
pub fn recommended_config<D: DataSource>(source: &D) -> GenerationConfig {
    let (start, end) = source.timespan();
    let span_days = (end - start).to_unit(Unit::Day);
    let density = if span_days > 0.0 {
        source.timestamps().len() as f64 / span_days
    } else {
        0.0
    };
    debug!("data spans {:.1} days at {:.1} samples/day", span_days, density);

    let mut config = GenerationConfig::default();
    if span_days >= 365.0 * MIN_COVERAGE {
        config.multi_year.enabled = true;
    }
    if density >= MIN_DENSITY_PER_DAY {
        config.monthly.enabled = true;
    }
    if density >= MIN_DAILY_LAYER_DENSITY {
        config.forty_eight_hour.enabled = true;
    }
    config
}

/// Coverage fraction and samples-per-day of the source over the closed
/// interval `[start, end]`.
pub(crate) fn analyze_coverage<D: DataSource>(source: &D, start: Epoch, end: Epoch) -> (f64, f64) {
    let timestamps = source.timestamps();
    let lo = timestamps.partition_point(|t| *t < start);
    let hi = timestamps.partition_point(|t| *t <= end);
    let in_range = &timestamps[lo..hi];
    if in_range.is_empty() {
        return (0.0, 0.0);
    }

    let total_days = (end - start).to_unit(Unit::Day);
    if total_days < 1e-4 {
        return (1.0, in_range.len() as f64);
    }

    let covered_days =
        (in_range[in_range.len() - 1] - in_range[0]).to_unit(Unit::Day);
    let coverage = (covered_days / total_days).min(1.0);
    let density = in_range.len() as f64 / total_days;
    (coverage, density)
}

pub fn should_include_multi_year<D: DataSource>(source: &D, start_year: i16, duration: u16) -> bool {
    let start = Epoch::from_gregorian_utc_at_midnight(start_year as i32, 1, 1);
    let end = Epoch::from_gregorian_utc_at_midnight(start_year as i32 + duration as i32, 1, 1);
    let (coverage, _) = analyze_coverage(source, start, end);
    coverage >= MIN_COVERAGE
}

pub fn should_include_monthly<D: DataSource>(source: &D, year: i16, month: u8) -> bool {
    let start = Epoch::from_gregorian_utc_at_midnight(year as i32, month, 1);
    let end = if month == 12 {
        Epoch::from_gregorian_utc_at_midnight(year as i32 + 1, 1, 1)
    } else {
        Epoch::from_gregorian_utc_at_midnight(year as i32, month + 1, 1)
    };
    let (coverage, density) = analyze_coverage(source, start, end);
    coverage >= MIN_COVERAGE && density >= MIN_DENSITY_PER_DAY
}

pub fn should_include_forty_eight_hour<D: DataSource>(source: &D, center: &Date) -> bool {
    let midnight = center.midnight();
    let start = midnight - 1.0 * Unit::Day;
    let end = midnight + 1.0 * Unit::Day;
    let (coverage, density) = analyze_coverage(source, start, end);
    coverage >= MIN_COVERAGE && density >= MIN_DENSITY_PER_DAY
}

/// Validates that every declared timestamp lies inside the declared
/// timespan, per the data source contract.
pub(crate) fn validate_source<D: DataSource>(source: &D) -> Result<(), Error> {
    let (start, end) = source.timespan();
    for t in source.timestamps() {
        if *t < start || *t > end {
            return Err(Error::SampleOutsideTimespan(*t));
        }
    }
    Ok(())
}
