//! `.weft` file container: preamble + ordered block stream, with the
//! priority evaluator and the whole-file combine operation.
use crate::{
    behavior::ValueBehavior,
    blocks::{
        Block, FortyEightHourBlock, FortyEightHourSectionHeader, MonthlyBlock, MultiYearBlock,
    },
    preamble::Preamble,
    Error,
};

use hifitime::Epoch;
use itertools::Itertools;
use log::debug;
use std::cmp::Reverse;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "flate2")]
use flate2::read::GzDecoder;
#[cfg(feature = "flate2")]
use std::io::Read;

/// Longest preamble the parser accepts, in bytes.
const MAX_PREAMBLE_LEN: usize = 1000;

/// A parsed (or assembled) `.weft` file.
///
/// Blocks are kept in stream order: multi-year, then monthly, then each
/// section header followed by its forty-eight hour blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct WeftFile {
    pub preamble: Preamble,
    pub blocks: Vec<Block>,
}

impl WeftFile {
    pub fn new(preamble: Preamble, blocks: Vec<Block>) -> Self {
        Self { preamble, blocks }
    }

    /// Parses a complete file image.
    pub fn from_bytes(data: &[u8]) -> Result<Self, Error> {
        let (preamble, mut ptr) = split_preamble(data)?;

        let mut blocks = Vec::new();
        // blocks remaining under the active section header
        let mut section: Option<(FortyEightHourSectionHeader, u32)> = None;

        while ptr < data.len() {
            if data.len() < ptr + 2 {
                return Err(Error::NotEnoughBytes);
            }
            let marker = u16::from_be_bytes([data[ptr], data[ptr + 1]]);
            ptr += 2;

            if let Some((header, remaining)) = &section {
                if *remaining > 0 && marker != FortyEightHourBlock::MARKER {
                    return Err(Error::TruncatedSection {
                        expected: header.block_count,
                        found: header.block_count - remaining,
                    });
                }
            }

            match marker {
                MultiYearBlock::MARKER => {
                    let (block, consumed) = MultiYearBlock::decode(&data[ptr..])?;
                    ptr += consumed;
                    blocks.push(Block::MultiYear(block));
                },
                MonthlyBlock::MARKER => {
                    let (block, consumed) = MonthlyBlock::decode(&data[ptr..])?;
                    ptr += consumed;
                    blocks.push(Block::Monthly(block));
                },
                FortyEightHourSectionHeader::MARKER => {
                    let (header, consumed) = FortyEightHourSectionHeader::decode(&data[ptr..])?;
                    ptr += consumed;
                    section = Some((header.clone(), header.block_count));
                    blocks.push(Block::SectionHeader(header));
                },
                FortyEightHourBlock::MARKER => {
                    let Some((header, remaining)) = section.as_mut() else {
                        return Err(Error::MissingSectionHeader);
                    };
                    if *remaining == 0 {
                        // the stream holds more blocks than the section advertised
                        return Err(Error::MissingSectionHeader);
                    }
                    let (block, consumed) =
                        FortyEightHourBlock::decode(&data[ptr..], header.coefficient_count())?;
                    if consumed + 2 != header.block_size as usize {
                        return Err(Error::BlockSizeMismatch {
                            expected: header.block_size,
                            found: consumed + 2,
                        });
                    }
                    ptr += consumed;
                    *remaining -= 1;
                    blocks.push(Block::FortyEightHour(block));
                },
                unknown => {
                    return Err(Error::UnknownMarker(unknown));
                },
            }
        }

        if let Some((header, remaining)) = &section {
            if *remaining > 0 {
                return Err(Error::TruncatedSection {
                    expected: header.block_count,
                    found: header.block_count - remaining,
                });
            }
        }

        Ok(Self { preamble, blocks })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let data = fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Parses a gzip compressed `.weft.gz` image.
    #[cfg(feature = "flate2")]
    #[cfg_attr(docsrs, doc(cfg(feature = "flate2")))]
    pub fn from_gzip_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let compressed = fs::read(path)?;
        let mut decoder = GzDecoder::new(&compressed[..]);
        let mut data = Vec::new();
        decoder.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Serializes the whole file, preamble first.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut out = self.preamble.to_string().into_bytes();
        out.extend_from_slice(b"\n\n");

        let mut section: Option<FortyEightHourSectionHeader> = None;
        for block in &self.blocks {
            match block {
                Block::MultiYear(b) => {
                    let start = out.len();
                    out.resize(start + b.encoding_size(), 0);
                    b.encode(&mut out[start..])?;
                },
                Block::Monthly(b) => {
                    let start = out.len();
                    out.resize(start + b.encoding_size(), 0);
                    b.encode(&mut out[start..])?;
                },
                Block::SectionHeader(h) => {
                    let start = out.len();
                    out.resize(start + h.encoding_size(), 0);
                    h.encode(&mut out[start..])?;
                    section = Some(h.clone());
                },
                Block::FortyEightHour(b) => {
                    let Some(header) = &section else {
                        return Err(Error::MissingSectionHeader);
                    };
                    let start = out.len();
                    out.resize(start + header.block_size as usize, 0);
                    b.encode(header.coefficient_count(), &mut out[start..])?;
                },
            }
        }
        Ok(out)
    }

    /// Writes the file to disk. The image goes to a temporary sibling
    /// path first and is renamed into place, so a failed run leaves no
    /// partial output.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Evaluates the file at `t` and applies the declared value behavior.
    ///
    /// The finest layer covering `t` wins: forty-eight hour blocks first
    /// (blending the two overlapping ones where both apply), then monthly,
    /// then multi-year.
    pub fn evaluate(&self, t: Epoch) -> Result<f64, Error> {
        let raw = self.evaluate_raw(t)?;
        Ok(self.preamble.behavior.apply(raw))
    }

    fn evaluate_raw(&self, t: Epoch) -> Result<f64, Error> {
        let daily: Vec<&FortyEightHourBlock> = self
            .blocks
            .iter()
            .filter_map(Block::as_forty_eight_hour)
            .filter(|b| b.contains(t))
            .collect();

        match daily.len() {
            0 => {},
            1 => {
                debug!("48h block {} covers {}", daily[0].center, t);
                return daily[0].evaluate(t);
            },
            _ => {
                debug!("blending {} 48h blocks at {}", daily.len(), t);
                return blend_forty_eight_hour(&daily, t, self.preamble.behavior.wrapping_range());
            },
        }

        if let Some(block) = self
            .blocks
            .iter()
            .filter_map(Block::as_monthly)
            .find(|b| b.contains(t))
        {
            debug!("monthly block {}-{:02} covers {}", block.year, block.month, t);
            return block.evaluate(t);
        }

        if let Some(block) = self
            .blocks
            .iter()
            .filter_map(Block::as_multi_year)
            .find(|b| b.contains(t))
        {
            debug!(
                "multi-year block {}+{}y covers {}",
                block.start_year, block.duration, t
            );
            return block.evaluate(t);
        }

        Err(Error::NoBlock(t))
    }

    /// Combines two compatible files into one, under a new timespan
    /// descriptor. Blocks are deduplicated and reordered canonically.
    pub fn combine(file1: &Self, file2: &Self, timespan: &str) -> Result<Self, Error> {
        file1.preamble.check_compatible(&file2.preamble)?;

        let all = file1.blocks.iter().chain(file2.blocks.iter());

        let mut multi_year: Vec<MultiYearBlock> = Vec::new();
        let mut monthly: Vec<MonthlyBlock> = Vec::new();
        let mut headers: Vec<FortyEightHourSectionHeader> = Vec::new();
        let mut daily: Vec<FortyEightHourBlock> = Vec::new();

        for block in all {
            match block {
                Block::MultiYear(b) => multi_year.push(b.clone()),
                Block::Monthly(b) => monthly.push(b.clone()),
                Block::SectionHeader(h) => headers.push(h.clone()),
                Block::FortyEightHour(b) => daily.push(b.clone()),
            }
        }

        // longest spans first, then chronological
        let multi_year: Vec<_> = multi_year
            .into_iter()
            .sorted_by_key(|b| (Reverse(b.duration), b.start_year))
            .unique_by(|b| (b.duration, b.start_year))
            .collect();
        let monthly: Vec<_> = monthly
            .into_iter()
            .sorted_by_key(|b| (b.year, b.month))
            .unique_by(|b| (b.year, b.month))
            .collect();

        let mut unique_headers: Vec<FortyEightHourSectionHeader> = Vec::new();
        for header in headers.into_iter().sorted_by_key(|h| h.start_day) {
            match unique_headers.last() {
                Some(kept) if kept.start_day == header.start_day => {
                    if kept.end_day != header.end_day || kept.block_size != header.block_size {
                        return Err(Error::IncompatibleFiles("forty-eight hour sections"));
                    }
                },
                _ => unique_headers.push(header),
            }
        }

        let daily: Vec<_> = daily
            .into_iter()
            .sorted_by_key(|b| b.center)
            .unique_by(|b| b.center)
            .collect();

        let mut blocks: Vec<Block> = Vec::new();
        blocks.extend(multi_year.into_iter().map(Block::MultiYear));
        blocks.extend(monthly.into_iter().map(Block::Monthly));

        let mut unclaimed = daily;
        for mut header in unique_headers {
            let (members, rest): (Vec<_>, Vec<_>) = unclaimed
                .into_iter()
                .partition(|b| header.contains_date(&b.center));
            unclaimed = rest;
            if members.is_empty() {
                continue;
            }
            header.block_count = members.len() as u32;
            blocks.push(Block::SectionHeader(header));
            blocks.extend(members.into_iter().map(Block::FortyEightHour));
        }
        if !unclaimed.is_empty() {
            return Err(Error::MissingSectionHeader);
        }

        let preamble = file1.preamble.with_timespan(timespan)?;
        Ok(Self { preamble, blocks })
    }
}

/// Blends overlapping forty-eight hour blocks at `t` with symmetric
/// triangular weights, normalized to sum to one. At an exact shared
/// boundary (both weights zero) the plain mean is used. For wrapping
/// quantities, values are first unwrapped into the neighborhood of the
/// first block's output; the caller re-normalizes the result into range.
pub(crate) fn blend_forty_eight_hour(
    blocks: &[&FortyEightHourBlock],
    t: Epoch,
    wrapping: Option<(f64, f64)>,
) -> Result<f64, Error> {
    let mut values = Vec::with_capacity(blocks.len());
    let mut weights = Vec::with_capacity(blocks.len());
    for block in blocks {
        values.push(block.evaluate(t)?);
        weights.push(block.blend_weight(t));
    }

    if let Some((lo, hi)) = wrapping {
        let range = hi - lo;
        let reference = values[0];
        for value in values.iter_mut().skip(1) {
            while *value - reference > range / 2.0 {
                *value -= range;
            }
            while *value - reference < -range / 2.0 {
                *value += range;
            }
        }
    }

    let total: f64 = weights.iter().sum();
    if total == 0.0 {
        return Ok(values.iter().sum::<f64>() / values.len() as f64);
    }
    Ok(values
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| v * w / total)
        .sum())
}

/// Splits the byte image into preamble and block stream. The preamble
/// must open with the magic token and close with one blank line.
pub(crate) fn split_preamble(data: &[u8]) -> Result<(Preamble, usize), Error> {
    let window = &data[..data.len().min(MAX_PREAMBLE_LEN)];
    let end = window
        .windows(2)
        .position(|pair| pair == b"\n\n")
        .ok_or(Error::InvalidPreamble)?;
    let text = core::str::from_utf8(&window[..end]).map_err(|_| Error::InvalidPreamble)?;
    let preamble = Preamble::from_str(text)?;
    Ok((preamble, end + 2))
}
