//! Validated, immutable latitude/longitude pairs bound to an ellipsoid.
//!
//! Latitude outside [-90, 90] and non-finite components are construction
//! errors; longitude is wrapped into [-180, 180] by the constructor.
//! Degrees everywhere at this boundary.

use crate::ellipsoid::Ellipsoid;
use crate::geodesic::{self, GeodesicError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A point on a reference ellipsoid, in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CoordinateParts")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
    ellipsoid: Ellipsoid,
}

/// Rejected coordinate input.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateError {
    /// Latitude must be finite and within [-90, 90] degrees.
    InvalidLatitude(f64),
    /// Longitude must be finite (any finite value wraps into range).
    InvalidLongitude(f64),
    /// String form did not look like `"lat, lng"`.
    Unparseable(String),
}

impl fmt::Display for CoordinateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordinateError::InvalidLatitude(v) => {
                write!(f, "latitude must be between -90 and 90 degrees, got {}", v)
            }
            CoordinateError::InvalidLongitude(v) => {
                write!(f, "longitude must be a finite number of degrees, got {}", v)
            }
            CoordinateError::Unparseable(s) => {
                write!(f, "cannot parse coordinate from '{}' (expected \"lat, lng\")", s)
            }
        }
    }
}

impl std::error::Error for CoordinateError {}

/// Wrap any finite longitude into [-180, 180].
fn normalize_longitude(longitude: f64) -> f64 {
    if (-180.0..=180.0).contains(&longitude) {
        return longitude;
    }
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

impl Coordinate {
    /// A point on WGS84.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinateError> {
        Self::with_ellipsoid(latitude, longitude, Ellipsoid::wgs84())
    }

    /// A point on an explicit ellipsoid.
    pub fn with_ellipsoid(
        latitude: f64,
        longitude: f64,
        ellipsoid: Ellipsoid,
    ) -> Result<Self, CoordinateError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinateError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() {
            return Err(CoordinateError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude: normalize_longitude(longitude),
            ellipsoid,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    // ─── Geodesic conveniences ───────────────────────────────────────
    //
    // Thin wrappers over `geodesic`; both coordinates must share an
    // ellipsoid or the call fails with `EllipsoidMismatch`.

    /// Ellipsoidal (Vincenty) distance to `other`, meters.
    pub fn distance_to(&self, other: &Coordinate) -> Result<f64, GeodesicError> {
        geodesic::inverse(self, other).map(|s| s.distance_meters)
    }

    /// Initial bearing towards `other`, degrees clockwise from north.
    pub fn bearing_to(&self, other: &Coordinate) -> Result<f64, GeodesicError> {
        geodesic::inverse(self, other).map(|s| s.initial_bearing_deg)
    }

    /// Final bearing on arrival at `other`, degrees clockwise from north.
    pub fn final_bearing_to(&self, other: &Coordinate) -> Result<f64, GeodesicError> {
        geodesic::inverse(self, other).map(|s| s.final_bearing_deg)
    }

    /// Direct problem: the point reached by travelling `distance_meters`
    /// from here along `bearing_deg`.
    pub fn destination_point(
        &self,
        bearing_deg: f64,
        distance_meters: f64,
    ) -> Result<Coordinate, GeodesicError> {
        geodesic::direct(self, bearing_deg, distance_meters)
    }

    /// Spherical (haversine) distance to `other`, meters. Lower precision
    /// than `distance_to`; never substituted automatically.
    pub fn haversine_distance_to(&self, other: &Coordinate) -> Result<f64, GeodesicError> {
        geodesic::haversine(self, other)
    }
}

/// Raw deserialization form; conversion funnels every decoded value
/// through the validating constructor.
#[derive(Deserialize)]
struct CoordinateParts {
    latitude: f64,
    longitude: f64,
    ellipsoid: Ellipsoid,
}

impl TryFrom<CoordinateParts> for Coordinate {
    type Error = CoordinateError;

    fn try_from(parts: CoordinateParts) -> Result<Self, Self::Error> {
        Coordinate::with_ellipsoid(parts.latitude, parts.longitude, parts.ellipsoid)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    /// Parse `"48.8234055, 2.3072664"` (comma-separated, WGS84).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',');
        let (lat, lng) = match (parts.next(), parts.next(), parts.next()) {
            (Some(lat), Some(lng), None) => (lat.trim(), lng.trim()),
            _ => return Err(CoordinateError::Unparseable(s.to_string())),
        };
        let latitude: f64 = lat
            .parse()
            .map_err(|_| CoordinateError::Unparseable(s.to_string()))?;
        let longitude: f64 = lng
            .parse()
            .map_err(|_| CoordinateError::Unparseable(s.to_string()))?;
        Self::new(latitude, longitude)
    }
}
