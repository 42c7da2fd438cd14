//! The `Ephemeris` capability: geocentric positions of one body over
//! time, served by any backend (this crate contributes the weftball
//! variant).
use crate::{behavior::ValueBehavior, timespec, timespec::TimeSpec, Error};

use core::fmt;
use hifitime::Epoch;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scalar astronomical quantities a `.weft` file can hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Quantity {
    /// Geocentric ecliptic longitude, degrees, wraps over `[0, 360)`.
    EclipticLongitude,
    /// Geocentric ecliptic latitude, degrees, bounded on `[-90, 90]`.
    EclipticLatitude,
    /// Distance from Earth, astronomical units, unbounded.
    Distance,
    /// Right ascension, hours, wraps over `[0, 24)`.
    RightAscension,
    /// Sun-body-observer angle, degrees, bounded on `[0, 180]`.
    PhaseAngle,
    /// Illuminated fraction, bounded on `[0, 1]`.
    Illumination,
}

impl Quantity {
    /// How the evaluator treats values of this quantity.
    pub fn default_behavior(&self) -> ValueBehavior {
        match self {
            Self::EclipticLongitude => ValueBehavior::Wrapping { lo: 0.0, hi: 360.0 },
            Self::EclipticLatitude => ValueBehavior::Bounded { lo: -90.0, hi: 90.0 },
            Self::Distance => ValueBehavior::Unbounded,
            Self::RightAscension => ValueBehavior::Wrapping { lo: 0.0, hi: 24.0 },
            Self::PhaseAngle => ValueBehavior::Bounded { lo: 0.0, hi: 180.0 },
            Self::Illumination => ValueBehavior::Bounded { lo: 0.0, hi: 1.0 },
        }
    }

    /// Preamble token of this quantity.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EclipticLongitude => "ecliptic_longitude",
            Self::EclipticLatitude => "ecliptic_latitude",
            Self::Distance => "distance",
            Self::RightAscension => "right_ascension",
            Self::PhaseAngle => "phase_angle",
            Self::Illumination => "illumination",
        }
    }

    /// Weftball member name stem (`<body>_<stem>.weft`) for the three
    /// positional quantities.
    pub fn member_stem(&self) -> Option<&'static str> {
        match self {
            Self::EclipticLongitude => Some("longitude"),
            Self::EclipticLatitude => Some("latitude"),
            Self::Distance => Some("distance"),
            _ => None,
        }
    }

    /// Extracts this quantity from a position triple.
    pub(crate) fn extract(&self, position: &Position) -> Result<f64, Error> {
        match self {
            Self::EclipticLongitude => Ok(position.longitude),
            Self::EclipticLatitude => Ok(position.latitude),
            Self::Distance => Ok(position.distance),
            other => Err(Error::NonPositionQuantity(other.name())),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Quantity {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ecliptic_longitude" => Ok(Self::EclipticLongitude),
            "ecliptic_latitude" => Ok(Self::EclipticLatitude),
            "distance" => Ok(Self::Distance),
            "right_ascension" => Ok(Self::RightAscension),
            "phase_angle" => Ok(Self::PhaseAngle),
            "illumination" => Ok(Self::Illumination),
            _ => Err(Error::InvalidPreamble),
        }
    }
}

/// Geocentric position of a body at one instant.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    /// Ecliptic longitude, degrees in `[0, 360)`.
    pub longitude: f64,
    /// Ecliptic latitude, degrees in `[-90, 90]`.
    pub latitude: f64,
    /// Distance from Earth, astronomical units.
    pub distance: f64,
}

/// A positional ephemeris backend. Implementations answer single-instant
/// queries; multi-instant queries default to walking the [TimeSpec] and
/// are keyed by Julian date, in chronological order.
pub trait Ephemeris {
    fn get_position(&self, body: &str, t: Epoch) -> Result<Position, Error>;

    fn get_positions(&self, body: &str, spec: &TimeSpec) -> Result<Vec<(f64, Position)>, Error> {
        let mut positions = Vec::new();
        for t in spec.time_points() {
            positions.push((timespec::julian_date(t), self.get_position(body, t)?));
        }
        Ok(positions)
    }
}
