//! Rotational ellipsoids used to relate the local frame of a network to geographic
//! coordinates.

use serde::{Deserialize, Serialize};

use crate::constants::{Meter, Radian, EARTH_RADIUS};
use crate::geonet_errors::GeonetError;

/// A rotational ellipsoid given by its semi-axes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ellipsoid {
    major_axis: Meter,
    minor_axis: Meter,
}

impl Ellipsoid {
    /// Build an ellipsoid from both semi-axes.
    ///
    /// Errors
    /// ----------
    /// * [`GeonetError::InvalidEllipsoid`] unless `0 < minor_axis <= major_axis`.
    pub fn from_minor_axis(major_axis: Meter, minor_axis: Meter) -> Result<Self, GeonetError> {
        let valid = major_axis.is_finite()
            && minor_axis.is_finite()
            && minor_axis > 0.0
            && minor_axis <= major_axis;
        if !valid {
            return Err(GeonetError::InvalidEllipsoid(format!(
                "require 0 < b <= a, got a = {major_axis}, b = {minor_axis}"
            )));
        }
        Ok(Ellipsoid {
            major_axis,
            minor_axis,
        })
    }

    /// Build an ellipsoid from the major axis and the inverse flattening `1/f`.
    pub fn from_inverse_flattening(
        major_axis: Meter,
        inverse_flattening: f64,
    ) -> Result<Self, GeonetError> {
        if !(inverse_flattening > 1.0) {
            return Err(GeonetError::InvalidEllipsoid(format!(
                "inverse flattening must exceed 1, got {inverse_flattening}"
            )));
        }
        Ellipsoid::from_minor_axis(major_axis, major_axis * (1.0 - 1.0 / inverse_flattening))
    }

    /// Build an ellipsoid from the major axis and the first squared eccentricity `e²`.
    pub fn from_squared_eccentricity(
        major_axis: Meter,
        squared_eccentricity: f64,
    ) -> Result<Self, GeonetError> {
        if !(0.0..1.0).contains(&squared_eccentricity) {
            return Err(GeonetError::InvalidEllipsoid(format!(
                "squared eccentricity must lie in [0, 1), got {squared_eccentricity}"
            )));
        }
        Ellipsoid::from_minor_axis(major_axis, major_axis * (1.0 - squared_eccentricity).sqrt())
    }

    pub fn wgs84() -> Self {
        Ellipsoid::from_e2_unchecked(6_378_137.0, 0.006_694_379_990_13)
    }

    pub fn grs80() -> Self {
        Ellipsoid::from_e2_unchecked(6_378_137.0, 0.006_694_380_022_90)
    }

    pub fn bessel1841() -> Self {
        Ellipsoid {
            major_axis: 10f64.powf(6.804_643_463_7),
            minor_axis: 10f64.powf(6.803_189_283_9),
        }
    }

    pub fn krassowski() -> Self {
        Ellipsoid::from_inv_f_unchecked(6_378_245.0, 298.3)
    }

    pub fn hayford() -> Self {
        Ellipsoid::from_inv_f_unchecked(6_378_388.0, 297.0)
    }

    /// Sphere with the mean Earth radius.
    pub fn sphere() -> Self {
        Ellipsoid {
            major_axis: EARTH_RADIUS,
            minor_axis: EARTH_RADIUS,
        }
    }

    fn from_e2_unchecked(a: Meter, e2: f64) -> Self {
        Ellipsoid {
            major_axis: a,
            minor_axis: a * (1.0 - e2).sqrt(),
        }
    }

    fn from_inv_f_unchecked(a: Meter, inv_f: f64) -> Self {
        Ellipsoid {
            major_axis: a,
            minor_axis: a * (1.0 - 1.0 / inv_f),
        }
    }

    pub fn major_axis(&self) -> Meter {
        self.major_axis
    }

    pub fn minor_axis(&self) -> Meter {
        self.minor_axis
    }

    /// Flattening `f = (a − b)/a`.
    pub fn flattening(&self) -> f64 {
        (self.major_axis - self.minor_axis) / self.major_axis
    }

    /// First squared eccentricity `e² = (a² − b²)/a²`.
    pub fn first_squared_eccentricity(&self) -> f64 {
        let (a, b) = (self.major_axis, self.minor_axis);
        (a * a - b * b) / (a * a)
    }

    /// Second squared eccentricity `e'² = (a² − b²)/b²`.
    pub fn second_squared_eccentricity(&self) -> f64 {
        let (a, b) = (self.major_axis, self.minor_axis);
        (a * a - b * b) / (b * b)
    }

    /// Polar radius of curvature `c = a²/b`.
    pub fn polar_radius_of_curvature(&self) -> Meter {
        self.major_axis * self.major_axis / self.minor_axis
    }

    /// Radius of curvature in the prime vertical `N(φ) = c / √(1 + e'² cos²φ)`.
    pub fn radius_of_curvature_in_prime_vertical(&self, latitude: Radian) -> Meter {
        let c = latitude.cos();
        self.polar_radius_of_curvature()
            / (1.0 + self.second_squared_eccentricity() * c * c).sqrt()
    }
}

impl Default for Ellipsoid {
    fn default() -> Self {
        Ellipsoid::grs80()
    }
}

#[cfg(test)]
mod ellipsoid_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_grs80_axes() {
        let e = Ellipsoid::grs80();
        assert_relative_eq!(e.minor_axis(), 6_356_752.314_1, epsilon = 1e-3);
        assert_relative_eq!(1.0 / e.flattening(), 298.257_222_101, epsilon = 1e-6);
    }

    #[test]
    fn test_constructors_agree() {
        let a = 6_378_388.0;
        let by_f = Ellipsoid::from_inverse_flattening(a, 297.0).unwrap();
        let by_e2 =
            Ellipsoid::from_squared_eccentricity(a, by_f.first_squared_eccentricity()).unwrap();
        assert_relative_eq!(by_f.minor_axis(), by_e2.minor_axis(), epsilon = 1e-6);
        assert_eq!(by_f, Ellipsoid::hayford());
    }

    #[test]
    fn test_prime_vertical_radius() {
        let e = Ellipsoid::wgs84();
        assert_relative_eq!(
            e.radius_of_curvature_in_prime_vertical(0.0),
            e.major_axis(),
            epsilon = 1e-6
        );
        assert_relative_eq!(
            Ellipsoid::sphere().radius_of_curvature_in_prime_vertical(0.7),
            EARTH_RADIUS
        );
    }

    #[test]
    fn test_invalid_ellipsoids() {
        assert!(Ellipsoid::from_minor_axis(1.0, 2.0).is_err());
        assert!(Ellipsoid::from_inverse_flattening(1.0, 0.5).is_err());
        assert!(Ellipsoid::from_squared_eccentricity(1.0, 1.0).is_err());
        assert!(Ellipsoid::from_minor_axis(f64::NAN, 1.0).is_err());
    }
}
