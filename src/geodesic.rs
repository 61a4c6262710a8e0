//! Ellipsoidal geodesic solutions, plus an explicit spherical fallback.
//!
//! The inverse problem (distance and bearings between two points) and the
//! direct problem (destination from origin, bearing, and distance) are
//! solved with Vincenty's iterative formulae on the coordinates' shared
//! ellipsoid. Iteration stops when successive values of the auxiliary
//! angle differ by less than [`CONVERGENCE_TOLERANCE`] radians; past
//! [`ITERATION_CAP`] rounds the geometry is reported as
//! [`GeodesicError::DidNotConverge`] rather than returning a wrong answer
//! (near-antipodal pairs are the classic case).
//!
//! Degrees at the API boundary, radians internally, meters for distance.
//! Everything here is a pure function of its inputs.

use crate::coordinate::Coordinate;
use crate::ellipsoid::Ellipsoid;
use serde::Serialize;
use std::f64::consts::PI;
use std::fmt;

const DEG: f64 = PI / 180.0;

/// Successive-lambda tolerance, radians. 1e-12 rad is ~6 micrometers of
/// surface distance.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-12;

/// Iteration cap for both the inverse and the direct solution.
pub const ITERATION_CAP: usize = 200;

/// Result of the inverse problem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeodesicSolution {
    /// Geodesic length along the ellipsoid surface, meters.
    pub distance_meters: f64,
    /// Bearing at departure, degrees clockwise from north, [0, 360).
    pub initial_bearing_deg: f64,
    /// Bearing at arrival, degrees clockwise from north, [0, 360).
    pub final_bearing_deg: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeodesicError {
    /// The iteration failed to settle within the cap. Antipodal and
    /// near-antipodal pairs end up here; there is no automatic fallback.
    DidNotConverge { iterations: usize },
    /// The two coordinates reference different ellipsoids.
    EllipsoidMismatch { from: String, to: String },
}

impl fmt::Display for GeodesicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeodesicError::DidNotConverge { iterations } => write!(
                f,
                "geodesic solution did not converge after {} iterations (antipodal or near-antipodal points?)",
                iterations
            ),
            GeodesicError::EllipsoidMismatch { from, to } => write!(
                f,
                "coordinates use different ellipsoids ({} vs {}); convert one, or use inverse_on with an explicit ellipsoid",
                from, to
            ),
        }
    }
}

impl std::error::Error for GeodesicError {}

fn ensure_same_ellipsoid(from: &Coordinate, to: &Coordinate) -> Result<(), GeodesicError> {
    if from.ellipsoid().same_shape(to.ellipsoid()) {
        Ok(())
    } else {
        Err(GeodesicError::EllipsoidMismatch {
            from: from.ellipsoid().name().to_string(),
            to: to.ellipsoid().name().to_string(),
        })
    }
}

/// Fold a longitude difference into (-pi, pi]. Inputs come from two
/// normalized longitudes, so one correction is always enough.
fn wrap_delta_longitude(l: f64) -> f64 {
    if l > PI {
        l - 2.0 * PI
    } else if l < -PI {
        l + 2.0 * PI
    } else {
        l
    }
}

fn normalize_bearing(deg: f64) -> f64 {
    let wrapped = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

// ─── Inverse problem ─────────────────────────────────────────────────

/// Distance and initial/final bearings from `from` to `to`. Both
/// coordinates must share an ellipsoid.
pub fn inverse(from: &Coordinate, to: &Coordinate) -> Result<GeodesicSolution, GeodesicError> {
    ensure_same_ellipsoid(from, to)?;
    inverse_on(from.ellipsoid(), from, to)
}

/// Inverse problem on an explicit ellipsoid, overriding whatever the two
/// coordinates carry.
pub fn inverse_on(
    ellipsoid: &Ellipsoid,
    from: &Coordinate,
    to: &Coordinate,
) -> Result<GeodesicSolution, GeodesicError> {
    if from.latitude() == to.latitude() && from.longitude() == to.longitude() {
        return Ok(GeodesicSolution {
            distance_meters: 0.0,
            initial_bearing_deg: 0.0,
            final_bearing_deg: 0.0,
        });
    }

    let a = ellipsoid.semi_major_axis();
    let f = ellipsoid.flattening();
    let b = ellipsoid.semi_minor_axis();

    let phi1 = from.latitude() * DEG;
    let phi2 = to.latitude() * DEG;
    let l = wrap_delta_longitude((to.longitude() - from.longitude()) * DEG);

    // Reduced latitudes on the auxiliary sphere.
    let tan_u1 = (1.0 - f) * phi1.tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;
    let tan_u2 = (1.0 - f) * phi2.tan();
    let cos_u2 = 1.0 / (1.0 + tan_u2 * tan_u2).sqrt();
    let sin_u2 = tan_u2 * cos_u2;

    let mut lambda = l;
    let mut sin_lambda = 0.0;
    let mut cos_lambda = 0.0;
    let mut sin_sigma = 0.0;
    let mut cos_sigma = 0.0;
    let mut sigma = 0.0;
    let mut cos_sq_alpha = 0.0;
    let mut cos_2sigma_m = 0.0;

    let mut iterations = 0;
    let mut converged = false;
    while iterations < ITERATION_CAP {
        iterations += 1;
        sin_lambda = lambda.sin();
        cos_lambda = lambda.cos();

        let sin_sq_sigma = (cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2);
        sin_sigma = sin_sq_sigma.sqrt();
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;

        if sin_sigma == 0.0 {
            // Either the same physical point expressed differently
            // (e.g. longitude 180 vs -180) or an exact antipode, which
            // has no determinate azimuth.
            if cos_sigma > 0.0 {
                return Ok(GeodesicSolution {
                    distance_meters: 0.0,
                    initial_bearing_deg: 0.0,
                    final_bearing_deg: 0.0,
                });
            }
            return Err(GeodesicError::DidNotConverge { iterations });
        }

        sigma = f64::atan2(sin_sigma, cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        cos_2sigma_m = if cos_sq_alpha != 0.0 {
            cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha
        } else {
            0.0 // equatorial line
        };

        let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let lambda_prev = lambda;
        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m
                            + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

        if lambda.abs() > PI {
            // Lambda leaving its domain is the textbook antipodal failure.
            return Err(GeodesicError::DidNotConverge { iterations });
        }
        if (lambda - lambda_prev).abs() < CONVERGENCE_TOLERANCE {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(GeodesicError::DidNotConverge { iterations });
    }

    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a =
        1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                        * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));

    let distance_meters = b * big_a * (sigma - delta_sigma);
    let initial = f64::atan2(
        cos_u2 * sin_lambda,
        cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda,
    );
    let final_ = f64::atan2(
        cos_u1 * sin_lambda,
        -sin_u1 * cos_u2 + cos_u1 * sin_u2 * cos_lambda,
    );

    Ok(GeodesicSolution {
        distance_meters,
        initial_bearing_deg: normalize_bearing(initial / DEG),
        final_bearing_deg: normalize_bearing(final_ / DEG),
    })
}

// ─── Direct problem ──────────────────────────────────────────────────

/// Destination point after travelling `distance_meters` from `origin`
/// along `initial_bearing_deg`, on the origin's ellipsoid.
pub fn direct(
    origin: &Coordinate,
    initial_bearing_deg: f64,
    distance_meters: f64,
) -> Result<Coordinate, GeodesicError> {
    let ellipsoid = origin.ellipsoid();
    let a = ellipsoid.semi_major_axis();
    let f = ellipsoid.flattening();
    let b = ellipsoid.semi_minor_axis();

    let phi1 = origin.latitude() * DEG;
    let alpha1 = initial_bearing_deg * DEG;
    let s = distance_meters;

    let sin_alpha1 = alpha1.sin();
    let cos_alpha1 = alpha1.cos();

    let tan_u1 = (1.0 - f) * phi1.tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = f64::atan2(tan_u1, cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let u_sq = cos_sq_alpha * (a * a - b * b) / (b * b);
    let big_a =
        1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));

    let mut sigma = s / (b * big_a);
    let mut sin_sigma = 0.0;
    let mut cos_sigma = 0.0;
    let mut cos_2sigma_m = 0.0;

    let mut iterations = 0;
    let mut converged = false;
    while iterations < ITERATION_CAP {
        iterations += 1;
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        sin_sigma = sigma.sin();
        cos_sigma = sigma.cos();
        let delta_sigma = big_b
            * sin_sigma
            * (cos_2sigma_m
                + big_b / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                        - big_b / 6.0
                            * cos_2sigma_m
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
        let sigma_prev = sigma;
        sigma = s / (b * big_a) + delta_sigma;
        if (sigma - sigma_prev).abs() < CONVERGENCE_TOLERANCE {
            converged = true;
            break;
        }
    }
    if !converged {
        return Err(GeodesicError::DidNotConverge { iterations });
    }

    let tmp = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let phi2 = f64::atan2(
        sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1,
        (1.0 - f) * (sin_alpha * sin_alpha + tmp * tmp).sqrt(),
    );
    let lambda = f64::atan2(
        sin_sigma * sin_alpha1,
        cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1,
    );
    let c = f / 16.0 * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
    let l = lambda
        - (1.0 - c)
            * f
            * sin_alpha
            * (sigma
                + c * sin_sigma
                    * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

    let lat2 = (phi2 / DEG).clamp(-90.0, 90.0);
    let lng2 = origin.longitude() + l / DEG;

    // The constructor wraps the longitude; it can only reject non-finite
    // values, which here means the inputs were degenerate.
    Coordinate::with_ellipsoid(lat2, lng2, ellipsoid.clone())
        .map_err(|_| GeodesicError::DidNotConverge { iterations })
}

// ─── Spherical fallback ──────────────────────────────────────────────

/// Haversine distance on a sphere of radius equal to the shared
/// ellipsoid's semi-major axis, meters. A deliberately lower-precision
/// alternative for geometries where the iterative solution fails; it is
/// never substituted automatically.
pub fn haversine(from: &Coordinate, to: &Coordinate) -> Result<f64, GeodesicError> {
    ensure_same_ellipsoid(from, to)?;

    let phi1 = from.latitude() * DEG;
    let phi2 = to.latitude() * DEG;
    let d_phi = phi2 - phi1;
    let d_lambda = (to.longitude() - from.longitude()) * DEG;

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    Ok(2.0 * from.ellipsoid().semi_major_axis() * h.sqrt().asin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn paris() -> Coordinate {
        Coordinate::new(48.8234055, 2.3072664).unwrap()
    }

    fn marseille() -> Coordinate {
        Coordinate::new(43.296482, 5.36978).unwrap()
    }

    #[test]
    fn test_paris_to_marseille_vincenty_regression() {
        let s = inverse(&paris(), &marseille()).unwrap();
        // Baseline computed on WGS84 with a = 6378137. The figure
        // scales linearly with a: with a = 6378136 the same route
        // comes out 0.103 m shorter (658307.485 m).
        assert!(
            (s.distance_meters - 658_307.588).abs() < 0.01,
            "got {}",
            s.distance_meters
        );
        assert!(
            (s.initial_bearing_deg - 157.7902).abs() < 1e-3,
            "initial bearing {}",
            s.initial_bearing_deg
        );
        assert!(
            (s.final_bearing_deg - 159.9983).abs() < 1e-3,
            "final bearing {}",
            s.final_bearing_deg
        );
    }

    #[test]
    fn test_paris_to_marseille_haversine_regression() {
        let d = haversine(&paris(), &marseille()).unwrap();
        // Sphere radius is the equatorial one, a = 6378137; on
        // a = 6378136 this is 659021.908 m.
        assert!((d - 659_022.011).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_lands_end_to_lizard_point_regression() {
        let a = Coordinate::new(50.0636, -5.7153).unwrap();
        let b = Coordinate::new(50.1254, -5.5320).unwrap();
        let s = inverse(&a, &b).unwrap();
        assert!(
            (s.distance_meters - 14_808.224).abs() < 0.01,
            "got {}",
            s.distance_meters
        );
        assert!(
            (s.initial_bearing_deg - 62.2709).abs() < 1e-3,
            "initial bearing {}",
            s.initial_bearing_deg
        );
        // The spherical figure runs 20.35 m short of the ellipsoidal
        // one on this pair.
        let h = haversine(&a, &b).unwrap();
        assert!((h - 14_787.872).abs() < 0.01, "haversine {}", h);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let ab = inverse(&paris(), &marseille()).unwrap().distance_meters;
        let ba = inverse(&marseille(), &paris()).unwrap().distance_meters;
        assert_relative_eq!(ab, ba, epsilon = 1e-6);
    }

    #[test]
    fn test_distance_to_self_is_zero_with_zero_bearings() {
        let s = inverse(&paris(), &paris()).unwrap();
        assert_eq!(s.distance_meters, 0.0);
        assert_eq!(s.initial_bearing_deg, 0.0);
        assert_eq!(s.final_bearing_deg, 0.0);
    }

    #[test]
    fn test_dateline_synonyms_are_the_same_point() {
        let east = Coordinate::new(12.5, 180.0).unwrap();
        let west = Coordinate::new(12.5, -180.0).unwrap();
        let s = inverse(&east, &west).unwrap();
        assert_eq!(s.distance_meters, 0.0);
    }

    #[test]
    fn test_bearings_are_reciprocal() {
        let forward = inverse(&paris(), &marseille()).unwrap();
        let backward = inverse(&marseille(), &paris()).unwrap();
        let reciprocal = (backward.initial_bearing_deg + 180.0) % 360.0;
        assert_relative_eq!(forward.final_bearing_deg, reciprocal, epsilon = 1e-6);
    }

    #[test]
    fn test_equatorial_line_follows_the_equator() {
        let a = Coordinate::new(0.0, 0.0).unwrap();
        let b = Coordinate::new(0.0, 90.0).unwrap();
        let s = inverse(&a, &b).unwrap();
        // A quarter of the equator: a * pi/2.
        assert_relative_eq!(
            s.distance_meters,
            6_378_137.0 * PI / 2.0,
            epsilon = 1e-3
        );
        assert_relative_eq!(s.initial_bearing_deg, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_near_polar_pair_crosses_the_pole() {
        let a = Coordinate::new(89.0, 0.0).unwrap();
        let b = Coordinate::new(89.0, 180.0).unwrap();
        let s = inverse(&a, &b).unwrap();
        // Two degrees of meridian arc at the pole.
        assert!(
            (s.distance_meters - 223_387.0).abs() < 500.0,
            "got {}",
            s.distance_meters
        );
        assert_relative_eq!(s.initial_bearing_deg, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_antipodal_points_do_not_converge() {
        let a = Coordinate::new(0.0, 0.0).unwrap();
        let b = Coordinate::new(0.5, 179.7).unwrap();
        assert!(matches!(
            inverse(&a, &b),
            Err(GeodesicError::DidNotConverge { .. })
        ));

        let exact = Coordinate::new(0.0, 180.0).unwrap();
        assert!(matches!(
            inverse(&a, &exact),
            Err(GeodesicError::DidNotConverge { .. })
        ));
    }

    #[test]
    fn test_antipodal_caller_can_fall_back_to_haversine() {
        let a = Coordinate::new(0.0, 0.0).unwrap();
        let b = Coordinate::new(0.0, 180.0).unwrap();
        // Half the equator on the spherical model.
        let d = haversine(&a, &b).unwrap();
        assert_relative_eq!(d, 6_378_137.0 * PI, epsilon = 1e-3);
    }

    #[test]
    fn test_mismatched_ellipsoids_are_rejected() {
        let wgs = Coordinate::new(10.0, 10.0).unwrap();
        let grs = Coordinate::with_ellipsoid(20.0, 20.0, Ellipsoid::grs80()).unwrap();
        match inverse(&wgs, &grs) {
            Err(GeodesicError::EllipsoidMismatch { from, to }) => {
                assert_eq!(from, "WGS84");
                assert_eq!(to, "GRS80");
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
        assert!(matches!(
            haversine(&wgs, &grs),
            Err(GeodesicError::EllipsoidMismatch { .. })
        ));
    }

    #[test]
    fn test_explicit_ellipsoid_override_skips_the_check() {
        let wgs = Coordinate::new(10.0, 10.0).unwrap();
        let grs = Coordinate::with_ellipsoid(20.0, 20.0, Ellipsoid::grs80()).unwrap();
        let s = inverse_on(&Ellipsoid::grs80(), &wgs, &grs).unwrap();
        assert!(s.distance_meters > 1_000_000.0);
    }

    #[test]
    fn test_direct_due_east_on_the_equator() {
        let origin = Coordinate::new(0.0, 0.0).unwrap();
        let quarter = 6_378_137.0 * PI / 2.0;
        let dest = direct(&origin, 90.0, quarter).unwrap();
        assert!(dest.latitude().abs() < 1e-9);
        assert_relative_eq!(dest.longitude(), 90.0, epsilon = 1e-6);
    }

    #[test]
    fn test_direct_zero_distance_returns_origin() {
        let origin = paris();
        let dest = direct(&origin, 42.0, 0.0).unwrap();
        assert_relative_eq!(dest.latitude(), origin.latitude(), epsilon = 1e-12);
        assert_relative_eq!(dest.longitude(), origin.longitude(), epsilon = 1e-12);
    }

    #[test]
    fn test_direct_then_inverse_round_trip() {
        let origin = paris();
        for bearing in [30.0, 113.0, 250.0, 359.5] {
            let dest = origin.destination_point(bearing, 100_000.0).unwrap();
            let back = inverse(&origin, &dest).unwrap();
            assert!(
                (back.distance_meters - 100_000.0).abs() < 1e-3,
                "bearing {}: distance {}",
                bearing,
                back.distance_meters
            );
            assert_relative_eq!(back.initial_bearing_deg, bearing, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_direct_crossing_the_dateline_wraps() {
        let origin = Coordinate::new(0.0, 179.5).unwrap();
        let dest = direct(&origin, 90.0, 111_000.0).unwrap();
        assert!(
            dest.longitude() < -179.0 && dest.longitude() >= -180.0,
            "longitude {}",
            dest.longitude()
        );
    }

    #[test]
    fn test_inverse_matches_direct_on_another_ellipsoid() {
        let origin = Coordinate::with_ellipsoid(52.2053, 0.1218, Ellipsoid::airy_1830()).unwrap();
        let dest = origin.destination_point(200.0, 50_000.0).unwrap();
        assert_eq!(dest.ellipsoid().name(), "Airy 1830");
        let back = inverse(&origin, &dest).unwrap();
        assert!((back.distance_meters - 50_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let e = GeodesicError::DidNotConverge { iterations: 200 };
        assert!(format!("{}", e).contains("200 iterations"));
        let m = GeodesicError::EllipsoidMismatch {
            from: "WGS84".into(),
            to: "GRS80".into(),
        };
        assert!(format!("{}", m).contains("WGS84"));
        assert!(format!("{}", m).contains("GRS80"));
    }
}
