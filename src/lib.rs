//! Meridian — batch geocoding and ellipsoidal geodesy.
//!
//! Two halves share a small set of core types. The geocoding side puts
//! providers behind one interface and dispatches whole batches through
//! an ordered fallback chain with a cache in front, isolating failures
//! per item. The geodesy side solves inverse and direct geodesic
//! problems on reference ellipsoids, with an explicit spherical
//! fallback for the cases the ellipsoidal iteration cannot reach.

pub mod coordinate;
pub mod ellipsoid;
pub mod geocoding;
pub mod geodesic;
pub mod server;

pub use coordinate::{Coordinate, CoordinateError};
pub use ellipsoid::{Ellipsoid, EllipsoidError};
pub use geodesic::{GeodesicError, GeodesicSolution};
