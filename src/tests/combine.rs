//! Whole-file combination scenarios.
#[cfg(test)]
mod test {
    use crate::prelude::*;
    use std::str::FromStr;

    fn preamble(body: &str) -> Preamble {
        Preamble::from_str(&format!(
            "#weft! v0.02 {} jpl:horizons 2022 32bit distance unbounded chebychevs generated@2024-01-05T12:00:00Z",
            body
        ))
        .unwrap()
    }

    fn date(y: u16, m: u8, d: u8) -> Date {
        Date::new(y, m, d).unwrap()
    }

    fn monthly(month: u8) -> Block {
        let day_count = match month {
            2 => 28,
            4 | 6 | 9 | 11 => 30,
            _ => 31,
        };
        Block::Monthly(MonthlyBlock::new(2022, month, day_count, vec![month as f32]).unwrap())
    }

    #[test]
    fn canonical_ordering() {
        let file_a = WeftFile::new(preamble("mars"), vec![monthly(1), monthly(3)]);
        let file_b = WeftFile::new(
            preamble("mars"),
            vec![
                monthly(2),
                Block::MultiYear(MultiYearBlock::new(2020, 10, vec![0.5]).unwrap()),
            ],
        );

        let combined = WeftFile::combine(&file_a, &file_b, "2020s").unwrap();
        assert_eq!(combined.preamble.timespan, "2020s");

        // multi-year first, then the months in chronological order
        assert!(combined.blocks[0].as_multi_year().is_some());
        let months: Vec<u8> = combined.blocks[1..]
            .iter()
            .filter_map(|b| b.as_monthly())
            .map(|b| b.month)
            .collect();
        assert_eq!(months, vec![1, 2, 3]);
    }

    #[test]
    fn multi_year_sorts_longest_first() {
        let file_a = WeftFile::new(
            preamble("mars"),
            vec![Block::MultiYear(MultiYearBlock::new(2022, 1, vec![1.0]).unwrap())],
        );
        let file_b = WeftFile::new(
            preamble("mars"),
            vec![
                Block::MultiYear(MultiYearBlock::new(2021, 1, vec![1.0]).unwrap()),
                Block::MultiYear(MultiYearBlock::new(2020, 10, vec![1.0]).unwrap()),
            ],
        );
        let combined = WeftFile::combine(&file_a, &file_b, "2020s").unwrap();
        let spans: Vec<(u16, i16)> = combined
            .blocks
            .iter()
            .filter_map(|b| b.as_multi_year())
            .map(|b| (b.duration, b.start_year))
            .collect();
        assert_eq!(spans, vec![(10, 2020), (1, 2021), (1, 2022)]);
    }

    #[test]
    fn duplicate_blocks_collapse() {
        let file_a = WeftFile::new(preamble("mars"), vec![monthly(2), monthly(3)]);
        let file_b = WeftFile::new(preamble("mars"), vec![monthly(2)]);
        let combined = WeftFile::combine(&file_a, &file_b, "2022").unwrap();
        assert_eq!(combined.blocks.len(), 2);
    }

    #[test]
    fn sections_merge_in_date_order() {
        let header_a =
            FortyEightHourSectionHeader::new(date(2022, 3, 14), date(2022, 3, 16), 10, 2).unwrap();
        let file_a = WeftFile::new(
            preamble("mars"),
            vec![
                Block::SectionHeader(header_a),
                Block::FortyEightHour(FortyEightHourBlock::new(date(2022, 3, 14), vec![1.0]).unwrap()),
                Block::FortyEightHour(FortyEightHourBlock::new(date(2022, 3, 15), vec![2.0]).unwrap()),
            ],
        );
        let header_b =
            FortyEightHourSectionHeader::new(date(2022, 3, 16), date(2022, 3, 17), 10, 1).unwrap();
        let file_b = WeftFile::new(
            preamble("mars"),
            vec![
                Block::SectionHeader(header_b),
                Block::FortyEightHour(FortyEightHourBlock::new(date(2022, 3, 16), vec![3.0]).unwrap()),
            ],
        );

        let combined = WeftFile::combine(&file_b, &file_a, "2022").unwrap();
        let headers: Vec<&FortyEightHourSectionHeader> = combined
            .blocks
            .iter()
            .filter_map(|b| b.as_section_header())
            .collect();
        assert_eq!(headers.len(), 2);
        assert!(headers[0].start_day < headers[1].start_day);

        let centers: Vec<Date> = combined
            .blocks
            .iter()
            .filter_map(|b| b.as_forty_eight_hour())
            .map(|b| b.center)
            .collect();
        assert_eq!(
            centers,
            vec![date(2022, 3, 14), date(2022, 3, 15), date(2022, 3, 16)]
        );

        // the combined stream is a valid file
        let bytes = combined.to_bytes().unwrap();
        assert_eq!(WeftFile::from_bytes(&bytes).unwrap(), combined);
    }

    #[test]
    fn incompatible_files_are_rejected() {
        let mars = WeftFile::new(preamble("mars"), vec![monthly(1)]);
        let venus = WeftFile::new(preamble("venus"), vec![monthly(2)]);
        assert!(matches!(
            WeftFile::combine(&mars, &venus, "2022"),
            Err(Error::IncompatibleFiles("body"))
        ));

        let mut wrapping = preamble("mars");
        wrapping.behavior = ValueBehavior::Wrapping { lo: 0.0, hi: 360.0 };
        let other = WeftFile::new(wrapping, vec![monthly(2)]);
        assert!(matches!(
            WeftFile::combine(&mars, &other, "2022"),
            Err(Error::IncompatibleFiles("value behavior"))
        ));
    }

    #[test]
    fn combine_is_queryable() {
        let file_a = WeftFile::new(preamble("mars"), vec![monthly(1)]);
        let file_b = WeftFile::new(
            preamble("mars"),
            vec![Block::MultiYear(MultiYearBlock::new(2020, 10, vec![9.0]).unwrap())],
        );
        let combined = WeftFile::combine(&file_a, &file_b, "2020s").unwrap();

        let t = Epoch::from_gregorian_utc(2022, 1, 15, 6, 0, 0, 0);
        assert!((combined.evaluate(t).unwrap() - 1.0).abs() < 1e-9);
        let t = Epoch::from_gregorian_utc(2024, 8, 1, 0, 0, 0, 0);
        assert!((combined.evaluate(t).unwrap() - 9.0).abs() < 1e-9);
    }
}
