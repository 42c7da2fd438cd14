//! `.weft` file production.
//!
//! The writer turns a densely sampled [DataSource] into a layered block
//! stream: it decides which layers and which individual blocks are worth
//! emitting (see [crate::selection]), fits Chebyshev coefficients per
//! block by least squares over the samples, and assembles the canonical
//! stream order.
use crate::{
    behavior::ValueBehavior,
    blocks::{
        Block, FortyEightHourBlock, FortyEightHourSectionHeader, MonthlyBlock, MultiYearBlock,
    },
    calendar::{days_in_month, Date},
    chebyshev,
    datasource::DataSource,
    ephemeris::Quantity,
    file::WeftFile,
    preamble::Preamble,
    selection::{self, GenerationConfig},
    timespan::descriptive_timespan,
    Error,
};

use hifitime::{Epoch, Unit};
use log::debug;
use std::path::Path;

/// Days of forty-eight hour blocks per section, under the format's
/// 400 day section limit.
const SECTION_CHUNK_DAYS: usize = 365;

/// Default raw-data source tag recorded in generated preambles.
const DEFAULT_SOURCE_TAG: &str = "jpl:horizons";

/// Builds `.weft` files for one quantity of one body.
#[derive(Debug, Clone)]
pub struct WeftWriter {
    quantity: Quantity,
    behavior: ValueBehavior,
    source_tag: String,
    config: Option<GenerationConfig>,
}

impl WeftWriter {
    /// A writer for `quantity`, using its default value behavior.
    pub fn new(quantity: Quantity) -> Self {
        Self {
            quantity,
            behavior: quantity.default_behavior(),
            source_tag: DEFAULT_SOURCE_TAG.to_string(),
            config: None,
        }
    }

    /// Overrides the raw-data source tag recorded in the preamble.
    pub fn with_source_tag(mut self, tag: &str) -> Self {
        self.source_tag = tag.to_string();
        self
    }

    /// Overrides the recommended layer configuration.
    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Fits and assembles a complete file over `[start, end]`.
    pub fn create_file<D: DataSource>(
        &self,
        source: &D,
        body: &str,
        start: Epoch,
        end: Epoch,
        custom_timespan: Option<&str>,
    ) -> Result<WeftFile, Error> {
        selection::validate_source(source)?;
        let config = match self.config {
            Some(config) => config,
            None => selection::recommended_config(source),
        };

        let mut blocks: Vec<Block> = Vec::new();

        if config.multi_year.enabled {
            let degree = config.multi_year.polynomial_degree;
            let (start_year, _, _, _, _, _, _) = start.to_gregorian_utc();
            let (end_year, _, _, _, _, _, _) = end.to_gregorian_utc();

            let mut decade = start_year.div_euclid(10) * 10;
            while decade <= end_year {
                if let Some(block) = self.create_multi_year_block(source, decade as i16, 10, degree)? {
                    debug!("emitting decade block {}-{}", decade, decade + 9);
                    blocks.push(Block::MultiYear(block));
                }
                decade += 10;
            }
            for year in start_year..=end_year {
                if let Some(block) = self.create_multi_year_block(source, year as i16, 1, degree)? {
                    debug!("emitting year block {}", year);
                    blocks.push(Block::MultiYear(block));
                }
            }
        }

        if config.monthly.enabled {
            let monthly =
                self.create_monthly_blocks(source, start, end, config.monthly.polynomial_degree)?;
            blocks.extend(monthly.into_iter().map(Block::Monthly));
        }

        if config.forty_eight_hour.enabled {
            let sections = self.create_forty_eight_hour_sections(
                source,
                start,
                end,
                config.forty_eight_hour.polynomial_degree,
            )?;
            blocks.extend(sections);
        }

        let timespan = descriptive_timespan(start, end, custom_timespan);
        let preamble = Preamble::new(
            body,
            &self.source_tag,
            &timespan,
            self.quantity.name(),
            self.behavior,
        )?;
        Ok(WeftFile::new(preamble, blocks))
    }

    /// [Self::create_file], then an atomic write to `path`.
    pub fn write_file<D: DataSource, P: AsRef<Path>>(
        &self,
        source: &D,
        body: &str,
        start: Epoch,
        end: Epoch,
        custom_timespan: Option<&str>,
        path: P,
    ) -> Result<WeftFile, Error> {
        let file = self.create_file(source, body, start, end, custom_timespan)?;
        file.write_to_file(path)?;
        Ok(file)
    }

    fn create_multi_year_block<D: DataSource>(
        &self,
        source: &D,
        start_year: i16,
        duration: u16,
        degree: usize,
    ) -> Result<Option<MultiYearBlock>, Error> {
        if !selection::should_include_multi_year(source, start_year, duration) {
            return Ok(None);
        }
        let mut block = MultiYearBlock::new(start_year, duration, vec![0.0])?;
        let t0 = Epoch::from_gregorian_utc_at_midnight(start_year as i32, 1, 1);
        let t1 = Epoch::from_gregorian_utc_at_midnight(start_year as i32 + duration as i32, 1, 1);
        let coeffs = self.fit_coeffs(source, t0, t1, degree, |t| block.normalize(t))?;
        block.coeffs = coeffs;
        Ok(Some(block))
    }

    fn create_monthly_blocks<D: DataSource>(
        &self,
        source: &D,
        start: Epoch,
        end: Epoch,
        degree: usize,
    ) -> Result<Vec<MonthlyBlock>, Error> {
        let (mut year, mut month, _, _, _, _, _) = start.to_gregorian_utc();
        let (end_year, end_month, _, _, _, _, _) = end.to_gregorian_utc();

        let mut blocks = Vec::new();
        while (year, month) <= (end_year, end_month) {
            if selection::should_include_monthly(source, year as i16, month) {
                let day_count = days_in_month(year, month);
                let mut block = MonthlyBlock::new(year as i16, month, day_count, vec![0.0])?;
                let coeffs = self.fit_coeffs(
                    source,
                    block.month_start(),
                    block.month_end(),
                    degree,
                    |t| block.normalize(t),
                )?;
                block.coeffs = coeffs;
                debug!("emitting monthly block {}-{:02}", year, month);
                blocks.push(block);
            }
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        Ok(blocks)
    }

    fn create_forty_eight_hour_sections<D: DataSource>(
        &self,
        source: &D,
        start: Epoch,
        end: Epoch,
        degree: usize,
    ) -> Result<Vec<Block>, Error> {
        let (Some(first), Some(last)) = (Date::from_epoch(start), Date::from_epoch(end)) else {
            return Ok(Vec::new());
        };

        let mut fitted: Vec<FortyEightHourBlock> = Vec::new();
        let mut day = first;
        while day <= last {
            if selection::should_include_forty_eight_hour(source, &day) {
                let probe = FortyEightHourBlock::new(day, vec![0.0])?;
                let t0 = day.midnight() - 1.0 * Unit::Day;
                let t1 = day.midnight() + 1.0 * Unit::Day;
                let coeffs = self.fit_coeffs(source, t0, t1, degree, |t| probe.normalize(t))?;
                fitted.push(FortyEightHourBlock::new(day, coeffs)?);
            }
            match day.next_day() {
                Some(next) => day = next,
                None => break,
            }
        }

        // one header per contiguous run of surviving center dates, so the
        // in-section offset arithmetic of the reader is always exact
        let mut blocks = Vec::new();
        let mut run: Vec<FortyEightHourBlock> = Vec::new();
        for block in fitted {
            let contiguous = match run.last() {
                Some(prev) => prev.center.days_until(&block.center) == 1,
                None => true,
            };
            if !contiguous {
                flush_sections(&mut blocks, std::mem::take(&mut run))?;
            }
            run.push(block);
        }
        flush_sections(&mut blocks, run)?;
        Ok(blocks)
    }

    /// Samples `[t0, t1)`, maps each timestamp through the block's own
    /// domain normalization, unwraps wrapping quantities, and fits.
    fn fit_coeffs<D: DataSource>(
        &self,
        source: &D,
        t0: Epoch,
        t1: Epoch,
        degree: usize,
        normalize: impl Fn(Epoch) -> f64,
    ) -> Result<Vec<f32>, Error> {
        let timestamps = source.timestamps();
        let lo = timestamps.partition_point(|t| *t < t0);
        let hi = timestamps.partition_point(|t| *t < t1);
        let selected = &timestamps[lo..hi];
        if selected.is_empty() {
            return Ok(vec![0.0]);
        }

        let mut xs = Vec::with_capacity(selected.len());
        let mut values = Vec::with_capacity(selected.len());
        for t in selected {
            xs.push(normalize(*t));
            values.push(source.value_at(*t).ok_or(Error::MissingSample(*t))?);
        }
        if let Some((lo, hi)) = self.behavior.wrapping_range() {
            values = chebyshev::unwrap_angles(&values, lo, hi);
        }

        let coeffs = chebyshev::fit(&xs, &values, degree)?;
        Ok(coeffs.into_iter().map(|c| c as f32).collect())
    }
}

/// Emits one or more section headers for a contiguous run of blocks,
/// chunked under the format's section span limit. All blocks of a chunk
/// share the chunk's widest coefficient count.
fn flush_sections(blocks: &mut Vec<Block>, run: Vec<FortyEightHourBlock>) -> Result<(), Error> {
    for chunk in run.chunks(SECTION_CHUNK_DAYS) {
        let (Some(first), Some(last)) = (chunk.first(), chunk.last()) else {
            continue;
        };
        let count = chunk.iter().map(|b| b.coeffs.len()).max().unwrap_or(1);
        let block_size = FortyEightHourBlock::encoding_size(count) as u16;
        let end_day = last.center.next_day().ok_or(Error::InvalidDate)?;
        let header = FortyEightHourSectionHeader::new(
            first.center,
            end_day,
            block_size,
            chunk.len() as u32,
        )?;
        debug!(
            "emitting section {}..{} ({} blocks, {} coefficients)",
            header.start_day, header.end_day, header.block_count, count
        );
        blocks.push(Block::SectionHeader(header));
        blocks.extend(chunk.iter().cloned().map(Block::FortyEightHour));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datasource::EphemerisDataSource;
    use crate::selection::LayerConfig;

    fn daily_only_config() -> GenerationConfig {
        GenerationConfig {
            multi_year: LayerConfig {
                enabled: false,
                polynomial_degree: 63,
            },
            monthly: LayerConfig {
                enabled: false,
                polynomial_degree: 23,
            },
            forty_eight_hour: LayerConfig {
                enabled: true,
                polynomial_degree: 11,
            },
        }
    }

    #[test]
    fn sections_are_contiguous_runs() {
        let start = Epoch::from_gregorian_utc_at_midnight(2022, 3, 1);
        // two separate sampled stretches with a gap between them
        let mut samples: Vec<(Epoch, f64)> = Vec::new();
        for h in 0..(4 * 24) {
            samples.push((start + h as f64 * Unit::Hour, 1.0));
        }
        let resume = Epoch::from_gregorian_utc_at_midnight(2022, 3, 20);
        for h in 0..(4 * 24) {
            samples.push((resume + h as f64 * Unit::Hour, 2.0));
        }
        let source = EphemerisDataSource::from_samples(samples).unwrap();

        let writer = WeftWriter::new(Quantity::Distance).with_config(daily_only_config());
        let end = Epoch::from_gregorian_utc_at_midnight(2022, 3, 31);
        let file = writer.create_file(&source, "mars", start, end, None).unwrap();

        let headers: Vec<&FortyEightHourSectionHeader> = file
            .blocks
            .iter()
            .filter_map(Block::as_section_header)
            .collect();
        assert_eq!(headers.len(), 2, "one section per sampled stretch");
        for header in headers {
            // each section is dense: span equals block count
            let span = header.start_day.days_until(&header.end_day);
            assert_eq!(span as u32, header.block_count);
        }

        // the stream parses back
        let bytes = file.to_bytes().unwrap();
        assert_eq!(WeftFile::from_bytes(&bytes).unwrap(), file);
    }

    #[test]
    fn long_runs_split_under_the_section_limit() {
        let run: Vec<FortyEightHourBlock> = {
            let mut day = Date::new(2020, 1, 1).unwrap();
            let mut run = Vec::new();
            for _ in 0..500 {
                run.push(FortyEightHourBlock::new(day, vec![1.0]).unwrap());
                day = day.next_day().unwrap();
            }
            run
        };
        let mut blocks = Vec::new();
        flush_sections(&mut blocks, run).unwrap();
        let headers: Vec<_> = blocks.iter().filter_map(Block::as_section_header).collect();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].block_count, 365);
        assert_eq!(headers[1].block_count, 135);
    }

    #[test]
    fn constant_signal_yields_single_coefficient_blocks() {
        let start = Epoch::from_gregorian_utc_at_midnight(2022, 3, 1);
        let samples: Vec<(Epoch, f64)> =
            (0..31 * 24).map(|h| (start + h as f64 * Unit::Hour, 42.0)).collect();
        let source = EphemerisDataSource::from_samples(samples).unwrap();

        let writer = WeftWriter::new(Quantity::Distance).with_config(daily_only_config());
        let end = Epoch::from_gregorian_utc_at_midnight(2022, 3, 31);
        let file = writer.create_file(&source, "mars", start, end, None).unwrap();

        for block in file.blocks.iter().filter_map(Block::as_forty_eight_hour) {
            assert_eq!(block.coeffs.len(), 1, "constant fits to one coefficient");
            assert!((block.coeffs[0] - 42.0).abs() < 1e-5);
        }
    }
}
