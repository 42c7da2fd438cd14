//! Weftballs: tar (or tar+gzip) archives bundling the three per-quantity
//! `.weft` files that together give the full geocentric position of one
//! body, and the [Ephemeris] facade serving them.
use crate::{
    datasource::EphemerisDataSource,
    ephemeris::{Ephemeris, Position, Quantity},
    file::WeftFile,
    reader::WeftReader,
    timespec::{epoch_from_julian, TimeSpec},
    writer::WeftWriter,
    Error,
};

use hifitime::Epoch;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

#[cfg(feature = "flate2")]
use flate2::{read::GzDecoder, write::GzEncoder, Compression};

/// Member name stems bundled in every weftball.
const MEMBER_STEMS: [&str; 3] = ["longitude", "latitude", "distance"];

fn is_gzip_path(path: &Path) -> bool {
    let name = path.to_string_lossy();
    name.ends_with(".tar.gz") || name.ends_with(".tgz")
}

#[cfg(not(feature = "flate2"))]
fn gzip_unsupported() -> Error {
    Error::IoError(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "gzip weftballs require the flate2 feature",
    ))
}

/// An opened weftball: one lazy reader per quantity, lifetimes bound to
/// this handle.
#[derive(Debug)]
pub struct Weftball {
    body: String,
    longitude: WeftReader,
    latitude: WeftReader,
    distance: WeftReader,
}

impl Weftball {
    /// Opens the archive at `path` (format chosen by suffix: `.tar.gz` /
    /// `.tgz` / `.tar`) and materializes the three members of `body`.
    pub fn open<P: AsRef<Path>>(path: P, body: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        let members = read_members(path)?;

        let take = |stem: &str| -> Result<WeftReader, Error> {
            let name = format!("{}_{}.weft", body, stem);
            let data = members
                .get(&name)
                .ok_or_else(|| Error::MissingMember(name.clone()))?;
            WeftReader::from_bytes(data.clone())
        };

        Ok(Self {
            body: body.to_string(),
            longitude: take("longitude")?,
            latitude: take("latitude")?,
            distance: take("distance")?,
        })
    }

    /// Packs three generated files into an archive at `path`, atomically.
    pub fn create<P: AsRef<Path>>(
        path: P,
        body: &str,
        longitude: &WeftFile,
        latitude: &WeftFile,
        distance: &WeftFile,
    ) -> Result<(), Error> {
        let path = path.as_ref();
        let mut builder = tar::Builder::new(Vec::new());
        for (stem, file) in MEMBER_STEMS
            .iter()
            .zip([longitude, latitude, distance])
        {
            let data = file.to_bytes()?;
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, format!("{}_{}.weft", body, stem), &data[..])?;
        }
        let tar_bytes = builder.into_inner()?;

        let output = if is_gzip_path(path) {
            #[cfg(feature = "flate2")]
            {
                use std::io::Write;
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(&tar_bytes)?;
                encoder.finish()?
            }
            #[cfg(not(feature = "flate2"))]
            {
                return Err(gzip_unsupported());
            }
        } else {
            tar_bytes
        };

        let mut tmp = path.as_os_str().to_os_string();
        tmp.push(".tmp");
        fs::write(&tmp, &output)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn longitude(&self) -> &WeftReader {
        &self.longitude
    }

    pub fn latitude(&self) -> &WeftReader {
        &self.latitude
    }

    pub fn distance(&self) -> &WeftReader {
        &self.distance
    }

    /// Full position at `t`. Fails with [Error::NoBlock] outside the
    /// archive's coverage, never silently substituting zeros.
    pub fn position(&self, t: Epoch) -> Result<Position, Error> {
        Ok(Position {
            longitude: self.longitude.get_value(t)?,
            latitude: self.latitude.get_value(t)?,
            distance: self.distance.get_value(t)?,
        })
    }
}

/// Reads every archive member into memory, keyed by exact member name.
fn read_members(path: &Path) -> Result<HashMap<String, Vec<u8>>, Error> {
    let file = fs::File::open(path)?;
    if is_gzip_path(path) {
        #[cfg(feature = "flate2")]
        {
            collect_members(&mut tar::Archive::new(GzDecoder::new(file)))
        }
        #[cfg(not(feature = "flate2"))]
        {
            Err(gzip_unsupported())
        }
    } else {
        collect_members(&mut tar::Archive::new(file))
    }
}

fn collect_members<R: Read>(archive: &mut tar::Archive<R>) -> Result<HashMap<String, Vec<u8>>, Error> {
    let mut members = HashMap::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        members.insert(name, data);
    }
    Ok(members)
}

/// [Ephemeris] backend over a directory of weftballs (or one archive).
///
/// A directory is resolved per body as `<body>_weftball.tar.gz` then
/// `<body>_weftball.tar`; archives are opened lazily, once per body.
pub struct WeftEphemeris {
    data: PathBuf,
    opened: RefCell<HashMap<String, Weftball>>,
}

impl WeftEphemeris {
    pub fn new<P: Into<PathBuf>>(data: P) -> Self {
        Self {
            data: data.into(),
            opened: RefCell::new(HashMap::new()),
        }
    }

    fn resolve_path(&self, body: &str) -> Result<PathBuf, Error> {
        let name = self.data.to_string_lossy();
        if name.ends_with(".tar") || name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            return Ok(self.data.clone());
        }
        for candidate in [
            self.data.join(format!("{}_weftball.tar.gz", body)),
            self.data.join(format!("{}_weftball.tar", body)),
        ] {
            if candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(Error::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no weftball for {} under {}", body, self.data.display()),
        )))
    }

    fn ensure_open(&self, body: &str) -> Result<(), Error> {
        if self.opened.borrow().contains_key(body) {
            return Ok(());
        }
        let path = self.resolve_path(body)?;
        debug!("opening weftball {} for {}", path.display(), body);
        let ball = Weftball::open(path, body)?;
        self.opened.borrow_mut().insert(body.to_string(), ball);
        Ok(())
    }
}

impl Ephemeris for WeftEphemeris {
    fn get_position(&self, body: &str, t: Epoch) -> Result<Position, Error> {
        let body = body.to_lowercase();
        self.ensure_open(&body)?;
        let opened = self.opened.borrow();
        let ball = opened
            .get(&body)
            .ok_or_else(|| Error::MissingMember(body.clone()))?;
        ball.position(t)
    }
}

/// Samples `body` from any ephemeris backend over `[start, stop]` at
/// `step`, fits the three positional quantities, and packs the archive.
pub fn generate_weftball<E: Ephemeris, P: AsRef<Path>>(
    ephemeris: &E,
    body: &str,
    start: Epoch,
    stop: Epoch,
    step: &str,
    path: P,
) -> Result<(), Error> {
    let spec = TimeSpec::from_range(start, stop, step)?;
    let positions = ephemeris.get_positions(body, &spec)?;

    let mut files = Vec::with_capacity(3);
    for quantity in [
        Quantity::EclipticLongitude,
        Quantity::EclipticLatitude,
        Quantity::Distance,
    ] {
        let samples = positions
            .iter()
            .map(|(jd, p)| Ok((epoch_from_julian(*jd), quantity.extract(p)?)))
            .collect::<Result<Vec<_>, Error>>()?;
        let source = EphemerisDataSource::from_samples(samples)?;
        let writer = WeftWriter::new(quantity);
        files.push(writer.create_file(&source, body, start, stop, None)?);
    }

    Weftball::create(path, body, &files[0], &files[1], &files[2])
}
