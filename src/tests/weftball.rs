//! Weftball archive and ephemeris facade round trips.
#[cfg(test)]
mod test {
    use crate::prelude::*;
    use crate::timespec::julian_date;
    use crate::weftball::generate_weftball;
    use std::fs;
    use std::path::PathBuf;
    use std::str::FromStr;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("weft-ball-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn constant_file(quantity: &str, behavior: &str, value: f32) -> WeftFile {
        let preamble = Preamble::from_str(&format!(
            "#weft! v0.02 mars jpl:horizons 2020s 32bit {} {} chebychevs generated@2024-01-05T12:00:00Z",
            quantity, behavior
        ))
        .unwrap();
        WeftFile::new(
            preamble,
            vec![Block::MultiYear(MultiYearBlock::new(2020, 10, vec![value]).unwrap())],
        )
    }

    fn mars_files() -> (WeftFile, WeftFile, WeftFile) {
        (
            constant_file("ecliptic_longitude", "wrapping[0,360]", 123.5),
            constant_file("ecliptic_latitude", "bounded[-90,90]", 1.25),
            constant_file("distance", "unbounded", 2.5),
        )
    }

    #[test]
    fn tar_roundtrip() {
        let dir = scratch_dir("tar");
        let path = dir.join("mars_weftball.tar");
        let (longitude, latitude, distance) = mars_files();
        Weftball::create(&path, "mars", &longitude, &latitude, &distance).unwrap();

        let ball = Weftball::open(&path, "mars").unwrap();
        assert_eq!(ball.body(), "mars");
        let t = Epoch::from_gregorian_utc_at_midnight(2025, 6, 1);
        let position = ball.position(t).unwrap();
        assert!((position.longitude - 123.5).abs() < 1e-4);
        assert!((position.latitude - 1.25).abs() < 1e-6);
        assert!((position.distance - 2.5).abs() < 1e-6);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    #[cfg(feature = "flate2")]
    fn gzip_roundtrip() {
        let dir = scratch_dir("targz");
        let path = dir.join("mars_weftball.tar.gz");
        let (longitude, latitude, distance) = mars_files();
        Weftball::create(&path, "mars", &longitude, &latitude, &distance).unwrap();

        let ball = Weftball::open(&path, "mars").unwrap();
        let t = Epoch::from_gregorian_utc_at_midnight(2023, 2, 1);
        assert!((ball.position(t).unwrap().distance - 2.5).abs() < 1e-6);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_member_is_reported() {
        let dir = scratch_dir("missing");
        let path = dir.join("mars_weftball.tar");
        let (longitude, latitude, distance) = mars_files();
        Weftball::create(&path, "mars", &longitude, &latitude, &distance).unwrap();

        // the archive holds mars members only
        assert!(matches!(
            Weftball::open(&path, "venus"),
            Err(Error::MissingMember(name)) if name == "venus_longitude.weft"
        ));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn facade_resolves_bodies_in_a_directory() {
        let dir = scratch_dir("facade");
        let path = dir.join("mars_weftball.tar");
        let (longitude, latitude, distance) = mars_files();
        Weftball::create(&path, "mars", &longitude, &latitude, &distance).unwrap();

        let ephemeris = WeftEphemeris::new(&dir);
        let t = Epoch::from_gregorian_utc_at_midnight(2024, 4, 1);
        // body casing is normalized
        let position = ephemeris.get_position("Mars", t).unwrap();
        assert!((position.longitude - 123.5).abs() < 1e-4);

        assert!(ephemeris.get_position("venus", t).is_err());

        // outside coverage the error is distinguishable from a valid zero
        let t = Epoch::from_gregorian_utc_at_midnight(2035, 1, 1);
        assert!(matches!(
            ephemeris.get_position("mars", t),
            Err(Error::NoBlock(_))
        ));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn multi_time_queries_are_keyed_by_julian_date() {
        let dir = scratch_dir("positions");
        let path = dir.join("mars_weftball.tar");
        let (longitude, latitude, distance) = mars_files();
        Weftball::create(&path, "mars", &longitude, &latitude, &distance).unwrap();

        let ephemeris = WeftEphemeris::new(&dir);
        let start = Epoch::from_gregorian_utc_at_midnight(2024, 4, 1);
        let stop = Epoch::from_gregorian_utc_at_midnight(2024, 4, 4);
        let spec = TimeSpec::from_range(start, stop, "1d").unwrap();
        let positions = ephemeris.get_positions("mars", &spec).unwrap();

        assert_eq!(positions.len(), 4);
        assert!((positions[0].0 - julian_date(start)).abs() < 1e-9);
        for pair in positions.windows(2) {
            assert!(pair[0].0 < pair[1].0, "julian keys in chronological order");
        }

        fs::remove_dir_all(&dir).ok();
    }

    /// A closed-form backend standing in for the remote service.
    struct SyntheticEphemeris;

    impl Ephemeris for SyntheticEphemeris {
        fn get_position(&self, _body: &str, t: Epoch) -> Result<Position, Error> {
            let days = (t - Epoch::from_gregorian_utc_at_midnight(2024, 1, 1)).to_unit(Unit::Day);
            Ok(Position {
                longitude: (350.0 + 3.0 * days).rem_euclid(360.0),
                latitude: 5.0 * (0.2 * days).sin(),
                distance: 1.5 + 0.01 * days,
            })
        }
    }

    #[test]
    fn generated_weftball_reproduces_the_backend() {
        let dir = scratch_dir("generate");
        let path = dir.join("mars_weftball.tar");

        let start = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let stop = Epoch::from_gregorian_utc_at_midnight(2024, 1, 11);
        generate_weftball(&SyntheticEphemeris, "mars", start, stop, "1h", &path).unwrap();

        let ephemeris = WeftEphemeris::new(&dir);
        for day in [3, 5, 8] {
            let t = start + day as f64 * Unit::Day + 7.0 * Unit::Hour;
            let truth = SyntheticEphemeris.get_position("mars", t).unwrap();
            let read = ephemeris.get_position("mars", t).unwrap();

            let lon_diff = (read.longitude - truth.longitude).abs();
            assert!(lon_diff.min(360.0 - lon_diff) < 0.05, "longitude {} vs {}", read.longitude, truth.longitude);
            assert!((read.latitude - truth.latitude).abs() < 0.05);
            assert!((read.distance - truth.distance).abs() < 0.01);
        }

        fs::remove_dir_all(&dir).ok();
    }
}
