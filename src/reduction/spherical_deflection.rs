//! # Spherical deflection model
//!
//! In a local ellipsoidal frame the plumb lines of distant points are no longer parallel to
//! the `z` axis of the tangent plane at the principal point. This module computes, for a point
//! given in local coordinates, the two angles between the ellipsoid normal at the point and
//! the frame axis, and the height of the ellipsoid surface below the point relative to the
//! tangent plane.
//!
//! ## Algorithm
//!
//! 1. The principal point is placed on the ellipsoid (`X0 = (N0 + h0)·u`, etc.) and the
//!    distance `d0` from the geocentre to the tangent plane is stored.
//! 2. The local point `(east, north, up) = (y − y0, x − x0, z − z0)` is rotated back into
//!    global XYZ.
//! 3. Geographic latitude/longitude follow from Bowring's closed formula.
//! 4. The normal `n` at that position is rotated into ENU, giving
//!    `rx = asin(n_e)` and `ry = −atan2(n_n, n_u)` (rotation sequence Ry·Rx).
//! 5. The frame-intersection height is `d0 − up · P_surface`.

use nalgebra::{Matrix3, Vector3};

use crate::constants::{Meter, Radian};
use crate::point::{Point, SphericalDeflection};
use crate::reduction::Reduction;

#[derive(Debug, Clone, Copy)]
struct GeographicPosition {
    latitude: Radian,
    longitude: Radian,
    prime_vertical_radius: Meter,
}

/// Spherical deflections relative to the principal point of a [`Reduction`].
#[derive(Debug, Clone)]
pub struct SphericalDeflectionModel {
    major_axis: Meter,
    minor_axis: Meter,
    first_e2: f64,
    second_e2: f64,
    principal_point: Vector3<Meter>,
    rotation: Matrix3<f64>,
    origin: Vector3<Meter>,
    d0: Meter,
}

impl SphericalDeflectionModel {
    pub fn new(reduction: &Reduction) -> Self {
        let ellipsoid = reduction.ellipsoid();
        let principal_point = reduction.principal_point();
        let a = ellipsoid.major_axis();
        let b = ellipsoid.minor_axis();
        let rotation = principal_point.rotation_xyz_to_enu();
        let up: Vector3<f64> = rotation.row(2).transpose();
        let h0 = principal_point.height;

        let n0 = ellipsoid.radius_of_curvature_in_prime_vertical(principal_point.latitude);
        let origin = Vector3::new(
            (n0 + h0) * up.x,
            (n0 + h0) * up.y,
            ((b / a).powi(2) * n0 + h0) * up.z,
        );
        let d0 = up.dot(&origin);

        SphericalDeflectionModel {
            major_axis: a,
            minor_axis: b,
            first_e2: ellipsoid.first_squared_eccentricity(),
            second_e2: ellipsoid.second_squared_eccentricity(),
            principal_point: principal_point.local(),
            rotation,
            origin,
            d0,
        }
    }

    /// Spherical deflection of a point.
    ///
    /// Arguments
    /// -----------------
    /// * `point`: Point in local coordinates. Planimetric points are evaluated at `z = 0`.
    ///
    /// Return
    /// ----------
    /// * The deflection angles of the ellipsoid normal and the frame-intersection height.
    pub fn spherical_deflection(&self, point: &Point) -> SphericalDeflection {
        let z = if point.dimension() == 2 { 0.0 } else { point.z() };
        let local = Vector3::new(point.x(), point.y(), z) - self.principal_point;
        let enu = Vector3::new(local.y, local.x, local.z);

        let geo = self.geographic_position(&enu);
        let (s_lat, c_lat) = geo.latitude.sin_cos();
        let (s_lon, c_lon) = geo.longitude.sin_cos();
        let normal = Vector3::new(c_lat * c_lon, c_lat * s_lon, s_lat);

        let n_enu = self.rotation * normal;
        let rx = n_enu.x.asin();
        let ry = -n_enu.y.atan2(n_enu.z);

        let n = geo.prime_vertical_radius;
        let ratio = (self.minor_axis / self.major_axis).powi(2);
        let surface = Vector3::new(n * normal.x, n * normal.y, ratio * n * normal.z);
        let up: Vector3<f64> = self.rotation.row(2).transpose();
        let h = self.d0 - up.dot(&surface);

        SphericalDeflection {
            x: rx,
            y: ry,
            frame_intersection_height: h,
        }
    }

    fn geographic_position(&self, enu: &Vector3<Meter>) -> GeographicPosition {
        let (a, b) = (self.major_axis, self.minor_axis);
        let global = self.origin + self.rotation.transpose() * enu;

        let c = a * a / b;
        let p = global.x.hypot(global.y);
        let theta = (global.z * a).atan2(p * b);
        let longitude = global.y.atan2(global.x);
        let latitude = (global.z + self.second_e2 * b * theta.sin().powi(3))
            .atan2(p - self.first_e2 * a * theta.cos().powi(3));
        let c_lat = latitude.cos();
        let prime_vertical_radius = c / (1.0 + self.second_e2 * c_lat * c_lat).sqrt();

        GeographicPosition {
            latitude,
            longitude,
            prime_vertical_radius,
        }
    }
}

#[cfg(test)]
mod spherical_deflection_test {
    use super::*;
    use crate::reduction::{PrincipalPoint, ProjectionType};
    use approx::assert_abs_diff_eq;

    fn reduction() -> Reduction {
        Reduction::builder()
            .projection_type(ProjectionType::LocalEllipsoidal)
            .principal_point(PrincipalPoint::new(
                1000.0,
                2000.0,
                0.0,
                52f64.to_radians(),
                10f64.to_radians(),
                0.0,
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_principal_point_has_no_deflection() {
        let model = SphericalDeflectionModel::new(&reduction());
        let d = model.spherical_deflection(&Point::new("P0", 1000.0, 2000.0, 0.0));
        assert_abs_diff_eq!(d.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(d.frame_intersection_height, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn test_deflection_grows_with_offset() {
        let model = SphericalDeflectionModel::new(&reduction());
        let east = model.spherical_deflection(&Point::new("E", 1000.0, 12_000.0, 0.0));
        let north = model.spherical_deflection(&Point::new("N", 11_000.0, 2000.0, 0.0));

        // 10 km on a ~6380 km radius is about 1.57e-3 rad
        assert_abs_diff_eq!(east.x.abs(), 10_000.0 / 6_385_000.0, epsilon = 2e-5);
        assert_abs_diff_eq!(east.y, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(north.y.abs(), 10_000.0 / 6_385_000.0, epsilon = 2e-5);
        assert_abs_diff_eq!(north.x, 0.0, epsilon = 1e-5);

        // the ellipsoid drops below the tangent plane by roughly s²/(2R)
        assert_abs_diff_eq!(east.frame_intersection_height.abs(), 7.8, epsilon = 0.2);
    }
}
