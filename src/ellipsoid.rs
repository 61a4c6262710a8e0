//! Reference ellipsoids for geodesic computation.
//!
//! An ellipsoid is fully described by its semi-major axis `a` (meters) and
//! its inverse flattening `1/f`. Flattening and the semi-minor axis are
//! derived on demand, never stored. A small registry of well-known models
//! is bundled; custom ellipsoids go through validated construction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named reference ellipsoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EllipsoidParts")]
pub struct Ellipsoid {
    name: String,
    semi_major_axis: f64,
    inverse_flattening: f64,
}

/// Rejected parameters for a custom ellipsoid.
#[derive(Debug, Clone, PartialEq)]
pub enum EllipsoidError {
    /// Semi-major axis must be finite and strictly positive.
    InvalidSemiMajorAxis(f64),
    /// Inverse flattening must be finite and strictly positive.
    InvalidInverseFlattening(f64),
}

impl fmt::Display for EllipsoidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EllipsoidError::InvalidSemiMajorAxis(a) => {
                write!(f, "semi-major axis must be > 0 meters, got {}", a)
            }
            EllipsoidError::InvalidInverseFlattening(inv_f) => {
                write!(f, "inverse flattening must be > 0, got {}", inv_f)
            }
        }
    }
}

impl std::error::Error for EllipsoidError {}

/// Raw deserialization form; conversion funnels every decoded value
/// through [`Ellipsoid::new`].
#[derive(Deserialize)]
struct EllipsoidParts {
    name: String,
    semi_major_axis: f64,
    inverse_flattening: f64,
}

impl TryFrom<EllipsoidParts> for Ellipsoid {
    type Error = EllipsoidError;

    fn try_from(parts: EllipsoidParts) -> Result<Self, Self::Error> {
        Ellipsoid::new(parts.name, parts.semi_major_axis, parts.inverse_flattening)
    }
}

impl Ellipsoid {
    /// Build a custom ellipsoid. Both parameters must be finite and > 0.
    pub fn new(
        name: impl Into<String>,
        semi_major_axis: f64,
        inverse_flattening: f64,
    ) -> Result<Self, EllipsoidError> {
        if !semi_major_axis.is_finite() || semi_major_axis <= 0.0 {
            return Err(EllipsoidError::InvalidSemiMajorAxis(semi_major_axis));
        }
        if !inverse_flattening.is_finite() || inverse_flattening <= 0.0 {
            return Err(EllipsoidError::InvalidInverseFlattening(inverse_flattening));
        }
        Ok(Self {
            name: name.into(),
            semi_major_axis,
            inverse_flattening,
        })
    }

    fn known(name: &str, semi_major_axis: f64, inverse_flattening: f64) -> Self {
        Self {
            name: name.to_string(),
            semi_major_axis,
            inverse_flattening,
        }
    }

    // ─── Registry ────────────────────────────────────────────────────

    pub fn wgs84() -> Self {
        Self::known("WGS84", 6_378_137.0, 298.257_223_563)
    }

    pub fn grs80() -> Self {
        Self::known("GRS80", 6_378_137.0, 298.257_222_101)
    }

    pub fn airy_1830() -> Self {
        Self::known("Airy 1830", 6_377_563.396, 299.324_964_6)
    }

    pub fn bessel_1841() -> Self {
        Self::known("Bessel 1841", 6_377_397.155, 299.152_812_8)
    }

    pub fn clarke_1866() -> Self {
        Self::known("Clarke 1866", 6_378_206.4, 294.978_698_2)
    }

    pub fn international_1924() -> Self {
        Self::known("International 1924", 6_378_388.0, 297.0)
    }

    pub fn krassovsky_1940() -> Self {
        Self::known("Krassovsky 1940", 6_378_245.0, 298.3)
    }

    pub fn wgs72() -> Self {
        Self::known("WGS72", 6_378_135.0, 298.26)
    }

    /// Look up a bundled ellipsoid by name, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "wgs84" | "wgs-84" | "wgs 84" => Some(Self::wgs84()),
            "grs80" | "grs-80" | "grs 1980" => Some(Self::grs80()),
            "airy" | "airy 1830" | "airy1830" => Some(Self::airy_1830()),
            "bessel" | "bessel 1841" | "bessel1841" => Some(Self::bessel_1841()),
            "clarke" | "clarke 1866" | "clarke1866" => Some(Self::clarke_1866()),
            "international" | "international 1924" | "hayford" => {
                Some(Self::international_1924())
            }
            "krassovsky" | "krassovsky 1940" | "krasovsky" => Some(Self::krassovsky_1940()),
            "wgs72" | "wgs-72" | "wgs 72" => Some(Self::wgs72()),
            _ => None,
        }
    }

    /// Canonical names of the bundled registry, for CLI help and the API.
    pub fn known_names() -> &'static [&'static str] {
        &[
            "WGS84",
            "GRS80",
            "Airy 1830",
            "Bessel 1841",
            "Clarke 1866",
            "International 1924",
            "Krassovsky 1940",
            "WGS72",
        ]
    }

    // ─── Accessors & derived values ──────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Semi-major axis `a`, meters.
    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis
    }

    pub fn inverse_flattening(&self) -> f64 {
        self.inverse_flattening
    }

    /// Flattening `f = 1 / (1/f)`.
    pub fn flattening(&self) -> f64 {
        1.0 / self.inverse_flattening
    }

    /// Semi-minor axis `b = a * (1 - f)`, meters.
    pub fn semi_minor_axis(&self) -> f64 {
        self.semi_major_axis * (1.0 - self.flattening())
    }

    /// Whether two ellipsoids describe the same figure. Names are ignored;
    /// geodesic equivalence is decided by `a` and `1/f` alone.
    pub fn same_shape(&self, other: &Ellipsoid) -> bool {
        self.semi_major_axis == other.semi_major_axis
            && self.inverse_flattening == other.inverse_flattening
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Self::wgs84()
    }
}

impl fmt::Display for Ellipsoid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_wgs84_defining_parameters() {
        let e = Ellipsoid::wgs84();
        assert_eq!(e.semi_major_axis(), 6_378_137.0);
        assert_eq!(e.inverse_flattening(), 298.257_223_563);
    }

    #[test]
    fn test_wgs84_derived_semi_minor_axis() {
        let e = Ellipsoid::wgs84();
        assert_relative_eq!(e.semi_minor_axis(), 6_356_752.314_245, epsilon = 1e-3);
    }

    #[test]
    fn test_grs80_differs_from_wgs84_only_in_flattening() {
        let wgs84 = Ellipsoid::wgs84();
        let grs80 = Ellipsoid::grs80();
        assert_eq!(wgs84.semi_major_axis(), grs80.semi_major_axis());
        assert!(!wgs84.same_shape(&grs80));
    }

    #[test]
    fn test_same_shape_ignores_name() {
        let renamed = Ellipsoid::new("local datum", 6_378_137.0, 298.257_223_563).unwrap();
        assert!(renamed.same_shape(&Ellipsoid::wgs84()));
        assert_ne!(renamed, Ellipsoid::wgs84());
    }

    #[test]
    fn test_from_name_is_case_insensitive() {
        assert_eq!(Ellipsoid::from_name("wgs84"), Some(Ellipsoid::wgs84()));
        assert_eq!(Ellipsoid::from_name("WGS84"), Some(Ellipsoid::wgs84()));
        assert_eq!(Ellipsoid::from_name(" Bessel 1841 "), Some(Ellipsoid::bessel_1841()));
        assert_eq!(Ellipsoid::from_name("atlantis"), None);
    }

    #[test]
    fn test_every_known_name_resolves() {
        for name in Ellipsoid::known_names() {
            assert!(Ellipsoid::from_name(name).is_some(), "unresolvable: {}", name);
        }
    }

    #[test]
    fn test_rejects_non_positive_axis() {
        assert!(matches!(
            Ellipsoid::new("bad", 0.0, 298.0),
            Err(EllipsoidError::InvalidSemiMajorAxis(_))
        ));
        assert!(matches!(
            Ellipsoid::new("bad", -1.0, 298.0),
            Err(EllipsoidError::InvalidSemiMajorAxis(_))
        ));
        assert!(matches!(
            Ellipsoid::new("bad", f64::NAN, 298.0),
            Err(EllipsoidError::InvalidSemiMajorAxis(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_flattening() {
        assert!(matches!(
            Ellipsoid::new("bad", 6_378_137.0, 0.0),
            Err(EllipsoidError::InvalidInverseFlattening(_))
        ));
        assert!(matches!(
            Ellipsoid::new("bad", 6_378_137.0, f64::INFINITY),
            Err(EllipsoidError::InvalidInverseFlattening(_))
        ));
    }

    #[test]
    fn test_custom_ellipsoid_round_trip() {
        let mars = Ellipsoid::new("Mars IAU 2000", 3_396_190.0, 169.894_447_223_61).unwrap();
        assert_eq!(mars.name(), "Mars IAU 2000");
        assert_relative_eq!(mars.flattening(), 1.0 / 169.894_447_223_61, epsilon = 1e-15);
    }

    #[test]
    fn test_deserialization_goes_through_validation() {
        let json = serde_json::to_string(&Ellipsoid::wgs84()).unwrap();
        let back: Ellipsoid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Ellipsoid::wgs84());

        // A non-positive axis cannot ride in through the decoder.
        let tampered = json.replace("6378137.0", "-6378137.0");
        assert!(serde_json::from_str::<Ellipsoid>(&tampered).is_err());
    }
}
