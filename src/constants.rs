//! # Constants and type definitions for geonet
//!
//! This module centralizes the **physical constants**, **numerical tolerances**, **default
//! reduction settings** and **common type aliases** used by the observation models and the
//! network arena.
//!
//! ## Overview
//!
//! - Earth model constants used by reductions and refraction
//! - Machine-precision tolerances for degenerate-geometry checks
//! - Legacy projection constants (Gauß-Krüger / UTM easting bounds, UTM scale)
//! - Default a-priori uncertainties used by observation groups
//! - Unit type aliases
//!
//! The projection constants are only defaults: every one of them can be overridden on a
//! [`Reduction`](crate::reduction::Reduction) through its builder.

// -------------------------------------------------------------------------------------------------
// Angles and numerical tolerances
// -------------------------------------------------------------------------------------------------

/// 2π, period of every angular observation
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Gon → radians
pub const RHO_GRAD2RAD: f64 = std::f64::consts::PI / 200.0;

/// Machine epsilon
pub const EPS: f64 = f64::EPSILON;

/// √ε, values below this are treated as zero for test statistics
pub const ZERO: f64 = 1.490_116_119_384_765_6e-8;

// -------------------------------------------------------------------------------------------------
// Earth model
// -------------------------------------------------------------------------------------------------

/// Mean Earth radius in meters
pub const EARTH_RADIUS: f64 = 6_371_000.0;

/// Refraction coefficient of Gauß. New zenith angles start from 0, this is the usual value
/// to fix when refraction is not estimated.
pub const DEFAULT_REFRACTION_COEFFICIENT: f64 = 0.13;

// -------------------------------------------------------------------------------------------------
// Projection defaults
// -------------------------------------------------------------------------------------------------

/// Smallest easting (with zone prefix) still recognised as projected Gauß-Krüger/UTM
pub const MIN_PROJECTED_EASTING: f64 = 1_100_000.0;

/// Largest easting (with zone prefix) still recognised as projected Gauß-Krüger/UTM
pub const MAX_PROJECTED_EASTING: f64 = 59_800_000.0;

/// Width of the zone prefix in projected eastings
pub const ZONE_WIDTH: f64 = 1_000_000.0;

/// False easting of the central meridian
pub const FALSE_EASTING: f64 = 500_000.0;

/// Scale of the central meridian in UTM
pub const UTM_SCALE: f64 = 0.9996;

// -------------------------------------------------------------------------------------------------
// Default a-priori uncertainties (a: constant, b: √distance dependent, c: distance dependent)
// -------------------------------------------------------------------------------------------------

/// Angles: 0.3 mgon
pub const ANGLE_ZERO_POINT_OFFSET: f64 = 0.0003 * RHO_GRAD2RAD;
pub const ANGLE_SQUARE_ROOT_DISTANCE_DEPENDENT: f64 = 0.0;
pub const ANGLE_DISTANCE_DEPENDENT: f64 = 0.0005;

/// Distances: 2 mm + 2 ppm
pub const DISTANCE_ZERO_POINT_OFFSET: f64 = 0.002;
pub const DISTANCE_SQUARE_ROOT_DISTANCE_DEPENDENT: f64 = 0.0;
pub const DISTANCE_DISTANCE_DEPENDENT: f64 = 0.000_002;

/// Leveling: 0.1 mm + 1 mm/√km
pub const LEVELING_ZERO_POINT_OFFSET: f64 = 0.0001;
pub const LEVELING_SQUARE_ROOT_DISTANCE_DEPENDENT: f64 = 0.001;
pub const LEVELING_DISTANCE_DEPENDENT: f64 = 0.0;

/// GNSS: 25 mm + 50 ppm
pub const GNSS_ZERO_POINT_OFFSET: f64 = 0.025;
pub const GNSS_SQUARE_ROOT_DISTANCE_DEPENDENT: f64 = 0.0;
pub const GNSS_DISTANCE_DEPENDENT: f64 = 0.000_050;

/// Factor applied to the constant uncertainty to obtain the default averaging threshold
pub const AVERAGE_THRESHOLD_FACTOR: f64 = 10.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in radians
pub type Radian = f64;
/// Distance in meters
pub type Meter = f64;

/// Reduce an angle into `[0, 2π)`.
///
/// Arguments
/// -----------------
/// * `angle`: Any finite angle in radians.
///
/// Return
/// ----------
/// * The equivalent angle in `[0, 2π)`.
#[inline]
pub fn normalize_angle(angle: Radian) -> Radian {
    let a = angle.rem_euclid(DPI);
    // rem_euclid may round up to exactly 2π for tiny negative inputs
    if a >= DPI {
        0.0
    } else {
        a
    }
}
