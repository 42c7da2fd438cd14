//! Lazy `.weft` reader for production evaluation.
//!
//! Multi-year blocks, monthly blocks and section headers are parsed
//! eagerly; forty-eight hour blocks stay raw bytes until evaluation
//! touches them. All blocks under one header share one serialized size,
//! so the block centered on a given day sits at a computed offset: one
//! O(log N) header search, one O(1) address calculation, one decode.
use crate::{
    behavior::ValueBehavior,
    blocks::{
        FortyEightHourBlock, FortyEightHourSectionHeader, MonthlyBlock, MultiYearBlock,
    },
    calendar::Date,
    file::blend_forty_eight_hour,
    preamble::Preamble,
    Error,
};

use hifitime::{Epoch, Unit};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[cfg(feature = "flate2")]
use flate2::read::GzDecoder;
#[cfg(feature = "flate2")]
use std::io::Read;

/// One indexed run of forty-eight hour blocks.
#[derive(Debug, Clone)]
struct Section {
    header: FortyEightHourSectionHeader,
    /// Byte offset of the first block's marker in the file image.
    data_offset: usize,
}

/// Summary of a loaded file, as reported by [WeftReader::info].
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub preamble: Preamble,
    pub multi_year_blocks: usize,
    pub monthly_blocks: usize,
    pub sections: usize,
    pub forty_eight_hour_blocks: usize,
}

/// Single-consumer reader over an immutable file image. Decoded
/// forty-eight hour blocks are cached on first touch.
#[derive(Debug)]
pub struct WeftReader {
    preamble: Preamble,
    data: Vec<u8>,
    multi_year: Vec<MultiYearBlock>,
    monthly: Vec<MonthlyBlock>,
    sections: Vec<Section>,
    cache: RefCell<HashMap<usize, FortyEightHourBlock>>,
}

impl WeftReader {
    /// Indexes a complete file image, taking ownership of the bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, Error> {
        let (preamble, mut ptr) = crate::file::split_preamble(&data)?;

        let mut multi_year = Vec::new();
        let mut monthly = Vec::new();
        let mut sections: Vec<Section> = Vec::new();

        while ptr < data.len() {
            if data.len() < ptr + 2 {
                return Err(Error::NotEnoughBytes);
            }
            let marker = u16::from_be_bytes([data[ptr], data[ptr + 1]]);
            ptr += 2;
            match marker {
                MultiYearBlock::MARKER => {
                    let (block, consumed) = MultiYearBlock::decode(&data[ptr..])?;
                    ptr += consumed;
                    multi_year.push(block);
                },
                MonthlyBlock::MARKER => {
                    let (block, consumed) = MonthlyBlock::decode(&data[ptr..])?;
                    ptr += consumed;
                    monthly.push(block);
                },
                FortyEightHourSectionHeader::MARKER => {
                    let (header, consumed) = FortyEightHourSectionHeader::decode(&data[ptr..])?;
                    ptr += consumed;
                    let section_bytes = header.block_count as usize * header.block_size as usize;
                    if data.len() < ptr + section_bytes {
                        let available = (data.len() - ptr) / header.block_size.max(1) as usize;
                        return Err(Error::TruncatedSection {
                            expected: header.block_count,
                            found: available as u32,
                        });
                    }
                    sections.push(Section {
                        header,
                        data_offset: ptr,
                    });
                    ptr += section_bytes;
                },
                FortyEightHourBlock::MARKER => {
                    return Err(Error::MissingSectionHeader);
                },
                unknown => {
                    return Err(Error::UnknownMarker(unknown));
                },
            }
        }

        sections.sort_by_key(|s| s.header.start_day);

        Ok(Self {
            preamble,
            data,
            multi_year,
            monthly,
            sections,
            cache: RefCell::new(HashMap::new()),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Reads a gzip compressed `.weft.gz` image.
    #[cfg(feature = "flate2")]
    #[cfg_attr(docsrs, doc(cfg(feature = "flate2")))]
    pub fn from_gzip_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let compressed = fs::read(path)?;
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut data = Vec::new();
        decoder.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    pub fn preamble(&self) -> &Preamble {
        &self.preamble
    }

    pub fn behavior(&self) -> &ValueBehavior {
        &self.preamble.behavior
    }

    /// Evaluates the file at `t`, finest covering layer first, and applies
    /// the declared value behavior.
    pub fn get_value(&self, t: Epoch) -> Result<f64, Error> {
        let raw = self.get_value_raw(t)?;
        Ok(self.preamble.behavior.apply(raw))
    }

    fn get_value_raw(&self, t: Epoch) -> Result<f64, Error> {
        // the two daily windows that can contain t: centers on t's own
        // date and on the following day
        let mut daily: Vec<FortyEightHourBlock> = Vec::with_capacity(2);
        if let Some(date) = Date::from_epoch(t) {
            for center in [Some(date), date.next_day()].into_iter().flatten() {
                if let Some(block) = self.lookup_forty_eight_hour(&center)? {
                    if block.contains(t) {
                        daily.push(block);
                    }
                }
            }
        }

        match daily.len() {
            0 => {},
            1 => return daily[0].evaluate(t),
            _ => {
                debug!("blending {} 48h blocks at {}", daily.len(), t);
                let refs: Vec<&FortyEightHourBlock> = daily.iter().collect();
                return blend_forty_eight_hour(&refs, t, self.preamble.behavior.wrapping_range());
            },
        }

        if let Some(block) = self.monthly.iter().find(|b| b.contains(t)) {
            return block.evaluate(t);
        }
        if let Some(block) = self.multi_year.iter().find(|b| b.contains(t)) {
            return block.evaluate(t);
        }
        Err(Error::NoBlock(t))
    }

    /// Finds the decoded block centered on `center`, if the file holds
    /// one. Dense sections resolve by offset arithmetic; the decoded
    /// center is verified and a linear section scan covers sparse
    /// sections written by other producers.
    fn lookup_forty_eight_hour(&self, center: &Date) -> Result<Option<FortyEightHourBlock>, Error> {
        let idx = self
            .sections
            .partition_point(|s| s.header.start_day <= *center);
        if idx == 0 {
            return Ok(None);
        }
        let section = &self.sections[idx - 1];
        if !section.header.contains_date(center) {
            return Ok(None);
        }

        let block_size = section.header.block_size as usize;
        let day_index = section.header.start_day.days_until(center);
        if day_index >= 0 && (day_index as u32) < section.header.block_count {
            let offset = section.data_offset + day_index as usize * block_size;
            let block = self.decode_at(section, offset)?;
            if block.center == *center {
                return Ok(Some(block));
            }
        }

        // sparse section: scan
        for i in 0..section.header.block_count as usize {
            let offset = section.data_offset + i * block_size;
            let block = self.decode_at(section, offset)?;
            if block.center == *center {
                return Ok(Some(block));
            }
        }
        Ok(None)
    }

    fn decode_at(&self, section: &Section, offset: usize) -> Result<FortyEightHourBlock, Error> {
        if let Some(block) = self.cache.borrow().get(&offset) {
            return Ok(block.clone());
        }
        if self.data.len() < offset + 2 {
            return Err(Error::NotEnoughBytes);
        }
        let marker = u16::from_be_bytes([self.data[offset], self.data[offset + 1]]);
        if marker != FortyEightHourBlock::MARKER {
            return Err(Error::UnknownMarker(marker));
        }
        let (block, consumed) = FortyEightHourBlock::decode(
            &self.data[offset + 2..],
            section.header.coefficient_count(),
        )?;
        if consumed + 2 != section.header.block_size as usize {
            return Err(Error::BlockSizeMismatch {
                expected: section.header.block_size,
                found: consumed + 2,
            });
        }
        self.cache.borrow_mut().insert(offset, block.clone());
        Ok(block)
    }

    /// The full UTC range covered by any block, `None` for an empty file.
    pub fn date_range(&self) -> Option<(Epoch, Epoch)> {
        let mut range: Option<(Epoch, Epoch)> = None;
        let mut widen = |start: Epoch, end: Epoch| {
            range = Some(match range {
                None => (start, end),
                Some((lo, hi)) => (lo.min(start), hi.max(end)),
            });
        };

        for block in &self.multi_year {
            let start = Epoch::from_gregorian_utc_at_midnight(block.start_year as i32, 1, 1);
            let end = Epoch::from_gregorian_utc_at_midnight(
                block.start_year as i32 + block.duration as i32,
                1,
                1,
            );
            widen(start, end);
        }
        for block in &self.monthly {
            widen(block.month_start(), block.month_end());
        }
        for section in &self.sections {
            let start = section.header.start_day.midnight() - 1.0 * Unit::Day;
            let end = section.header.end_day.midnight();
            widen(start, end);
        }
        range
    }

    pub fn info(&self) -> FileInfo {
        FileInfo {
            preamble: self.preamble.clone(),
            multi_year_blocks: self.multi_year.len(),
            monthly_blocks: self.monthly.len(),
            sections: self.sections.len(),
            forty_eight_hour_blocks: self
                .sections
                .iter()
                .map(|s| s.header.block_count as usize)
                .sum(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::blocks::Block;
    use crate::file::WeftFile;
    use std::str::FromStr;

    fn date(y: u16, m: u8, d: u8) -> Date {
        Date::new(y, m, d).unwrap()
    }

    fn preamble(behavior: &str) -> Preamble {
        Preamble::from_str(&format!(
            "#weft! v0.02 mars jpl:horizons 2020s 32bit ecliptic_longitude {} chebychevs generated@2024-01-05T12:00:00Z",
            behavior
        ))
        .unwrap()
    }

    fn sample_image() -> Vec<u8> {
        let header = FortyEightHourSectionHeader::new(
            date(2022, 3, 14),
            date(2022, 3, 17),
            2 + 4 + 4 * 2,
            3,
        )
        .unwrap();
        let file = WeftFile::new(
            preamble("unbounded"),
            vec![
                Block::MultiYear(MultiYearBlock::new(2020, 5, vec![1.0]).unwrap()),
                Block::Monthly(MonthlyBlock::new(2022, 3, 31, vec![2.0]).unwrap()),
                Block::SectionHeader(header),
                Block::FortyEightHour(
                    FortyEightHourBlock::new(date(2022, 3, 14), vec![3.0]).unwrap(),
                ),
                Block::FortyEightHour(
                    FortyEightHourBlock::new(date(2022, 3, 15), vec![4.0]).unwrap(),
                ),
                Block::FortyEightHour(
                    FortyEightHourBlock::new(date(2022, 3, 16), vec![5.0]).unwrap(),
                ),
            ],
        );
        file.to_bytes().unwrap()
    }

    #[test]
    fn lazy_index_matches_eager_evaluation() {
        let image = sample_image();
        let eager = WeftFile::from_bytes(&image).unwrap();
        let lazy = WeftReader::from_bytes(image).unwrap();

        for (y, m, d, hh) in [
            (2022, 3, 14, 6),
            (2022, 3, 15, 0),
            (2022, 3, 16, 23),
            (2022, 3, 25, 12),
            (2021, 7, 1, 0),
        ] {
            let t = Epoch::from_gregorian_utc(y, m, d, hh, 0, 0, 0);
            let a = eager.evaluate(t).unwrap();
            let b = lazy.get_value(t).unwrap();
            assert!((a - b).abs() < 1e-9, "{}: {} vs {}", t, a, b);
        }
    }

    #[test]
    fn no_block_outside_coverage() {
        let lazy = WeftReader::from_bytes(sample_image()).unwrap();
        let t = Epoch::from_gregorian_utc_at_midnight(2040, 1, 1);
        assert!(matches!(lazy.get_value(t), Err(Error::NoBlock(_))));
    }

    #[test]
    fn cache_populates_on_first_touch() {
        let lazy = WeftReader::from_bytes(sample_image()).unwrap();
        assert!(lazy.cache.borrow().is_empty());
        let t = Epoch::from_gregorian_utc(2022, 3, 15, 12, 0, 0, 0);
        let first = lazy.get_value(t).unwrap();
        let cached = lazy.cache.borrow().len();
        assert!(cached >= 1);
        let second = lazy.get_value(t).unwrap();
        assert_eq!(first, second);
        assert_eq!(lazy.cache.borrow().len(), cached);
    }

    #[test]
    fn info_and_range() {
        let lazy = WeftReader::from_bytes(sample_image()).unwrap();
        let info = lazy.info();
        assert_eq!(info.multi_year_blocks, 1);
        assert_eq!(info.monthly_blocks, 1);
        assert_eq!(info.sections, 1);
        assert_eq!(info.forty_eight_hour_blocks, 3);

        let (start, end) = lazy.date_range().unwrap();
        assert_eq!(start, Epoch::from_gregorian_utc_at_midnight(2020, 1, 1));
        assert_eq!(end, Epoch::from_gregorian_utc_at_midnight(2025, 1, 1));
    }

    #[test]
    fn truncated_section_detected_up_front() {
        let mut image = sample_image();
        image.truncate(image.len() - 4);
        assert!(WeftReader::from_bytes(image).is_err());
    }
}
