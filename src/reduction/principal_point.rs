//! Principal point of a local network frame.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::constants::{Meter, Radian};

/// Point where the local frame touches the ellipsoid, given both in local and in geographic
/// coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PrincipalPoint {
    pub x: Meter,
    pub y: Meter,
    pub z: Meter,
    pub latitude: Radian,
    pub longitude: Radian,
    pub height: Meter,
}

impl PrincipalPoint {
    pub fn new(
        x: Meter,
        y: Meter,
        z: Meter,
        latitude: Radian,
        longitude: Radian,
        height: Meter,
    ) -> Self {
        PrincipalPoint {
            x,
            y,
            z,
            latitude,
            longitude,
            height,
        }
    }

    /// Local coordinates as a vector.
    pub fn local(&self) -> Vector3<Meter> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Rotation from global Cartesian XYZ into the east/north/up frame of the principal point.
    ///
    /// Rows are the east, north and up unit vectors expressed in XYZ.
    pub fn rotation_xyz_to_enu(&self) -> Matrix3<f64> {
        let (s_lat, c_lat) = self.latitude.sin_cos();
        let (s_lon, c_lon) = self.longitude.sin_cos();
        Matrix3::new(
            -s_lon,
            c_lon,
            0.0,
            -s_lat * c_lon,
            -s_lat * s_lon,
            c_lat,
            c_lat * c_lon,
            c_lat * s_lon,
            s_lat,
        )
    }
}

#[cfg(test)]
mod principal_point_test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rotation_is_orthonormal() {
        let p = PrincipalPoint::new(0.0, 0.0, 0.0, 0.9, 0.2, 100.0);
        let r = p.rotation_xyz_to_enu();
        assert_relative_eq!(r * r.transpose(), Matrix3::identity(), epsilon = 1e-14);
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_up_vector_at_equator() {
        let r = PrincipalPoint::default().rotation_xyz_to_enu();
        assert_relative_eq!(r.row(2).transpose(), Vector3::new(1.0, 0.0, 0.0));
    }
}
