//! # Leveled height differences
//!
//! A leveled height difference is the difference of the two plumb-line heights of the
//! endpoints. Each height is the projection of the point (plus its instrument/target height)
//! onto the local vertical `n(ξ, η) = (−cos ξ·sin η, sin ξ, cos ξ·cos η)` of that point:
//!
//! ```text
//! hs = n(ξs, ηs)·Ps + ih,   he = n(ξe, ηe)·Pe + th
//! Δh = (he − hs + ΔN) / m
//! ```
//!
//! `ΔN` is the difference of the frame-intersection heights of a local ellipsoidal frame, and
//! zero otherwise. Since each endpoint uses its own vertical, the coordinate derivatives of
//! start and end point are only opposite when both points share the same deflection.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::network::Network;
use crate::observations::{ObservationCore, ObservationModel, ObservationType};
use crate::parameters::{ParameterId, ParameterType};
use crate::point::Point;
use crate::reduction::ProjectionType;

/// Local vertical `n` and its derivatives with respect to the two deflection angles.
struct Plumbline {
    normal: Vector3<f64>,
    d_deflection_x: Vector3<f64>,
    d_deflection_y: Vector3<f64>,
}

impl Plumbline {
    fn of(point: &Point) -> Self {
        let (srx, crx) = point.deflection_x().value().sin_cos();
        let (sry, cry) = point.deflection_y().value().sin_cos();
        Plumbline {
            normal: Vector3::new(-crx * sry, srx, crx * cry),
            d_deflection_x: Vector3::new(srx * sry, crx, -srx * cry),
            d_deflection_y: Vector3::new(-crx * cry, 0.0, -crx * sry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaZ {
    pub(crate) core: ObservationCore,
    pub(crate) scale: ParameterId,
}

impl DeltaZ {
    pub(crate) fn new(core: ObservationCore, scale: ParameterId) -> Self {
        DeltaZ { core, scale }
    }

    pub fn scale(&self) -> ParameterId {
        self.scale
    }

    fn scale_value(&self, network: &Network) -> f64 {
        network.parameter_ref(self.scale).value()
    }

    fn endpoints<'a>(&self, network: &'a Network) -> (&'a Point, &'a Point) {
        (
            network.point_ref(self.core.start_point()),
            network.point_ref(self.core.end_point()),
        )
    }

    /// Unscaled height difference `he − hs + ΔN`.
    fn height_difference(&self, network: &Network) -> f64 {
        let (start, end) = self.endpoints(network);
        let hs = Plumbline::of(start).normal.dot(start.coordinates()) + self.core.start_point_height();
        let he = Plumbline::of(end).normal.dot(end.coordinates()) + self.core.end_point_height();

        let dn = if self.core.reduction_in(network).projection_type()
            == ProjectionType::LocalEllipsoidal
        {
            end.spherical_deflection().frame_intersection_height
                - start.spherical_deflection().frame_intersection_height
        } else {
            0.0
        };
        he - hs + dn
    }
}

impl ObservationModel for DeltaZ {
    fn core(&self) -> &ObservationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObservationCore {
        &mut self.core
    }

    fn observation_type(&self) -> ObservationType {
        ObservationType::Leveling
    }

    fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        (kind == ParameterType::Scale).then_some(self.scale)
    }

    fn value_aposteriori(&self, network: &Network) -> f64 {
        self.height_difference(network) / self.scale_value(network)
    }

    fn diff_xs(&self, network: &Network) -> f64 {
        let (start, _) = self.endpoints(network);
        -Plumbline::of(start).normal.x / self.scale_value(network)
    }

    fn diff_ys(&self, network: &Network) -> f64 {
        let (start, _) = self.endpoints(network);
        -Plumbline::of(start).normal.y / self.scale_value(network)
    }

    fn diff_zs(&self, network: &Network) -> f64 {
        let (start, _) = self.endpoints(network);
        -Plumbline::of(start).normal.z / self.scale_value(network)
    }

    fn diff_xe(&self, network: &Network) -> f64 {
        let (_, end) = self.endpoints(network);
        Plumbline::of(end).normal.x / self.scale_value(network)
    }

    fn diff_ye(&self, network: &Network) -> f64 {
        let (_, end) = self.endpoints(network);
        Plumbline::of(end).normal.y / self.scale_value(network)
    }

    fn diff_ze(&self, network: &Network) -> f64 {
        let (_, end) = self.endpoints(network);
        Plumbline::of(end).normal.z / self.scale_value(network)
    }

    fn diff_vertical_deflection_xs(&self, network: &Network) -> f64 {
        let (start, _) = self.endpoints(network);
        -Plumbline::of(start).d_deflection_x.dot(start.coordinates()) / self.scale_value(network)
    }

    fn diff_vertical_deflection_ys(&self, network: &Network) -> f64 {
        let (start, _) = self.endpoints(network);
        -Plumbline::of(start).d_deflection_y.dot(start.coordinates()) / self.scale_value(network)
    }

    fn diff_vertical_deflection_xe(&self, network: &Network) -> f64 {
        let (_, end) = self.endpoints(network);
        Plumbline::of(end).d_deflection_x.dot(end.coordinates()) / self.scale_value(network)
    }

    fn diff_vertical_deflection_ye(&self, network: &Network) -> f64 {
        let (_, end) = self.endpoints(network);
        Plumbline::of(end).d_deflection_y.dot(end.coordinates()) / self.scale_value(network)
    }

    fn diff_scale(&self, network: &Network) -> f64 {
        let scale = self.scale_value(network);
        -self.height_difference(network) / (scale * scale)
    }
}

#[cfg(test)]
mod delta_z_test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_plain_height_difference() {
        let mut net = Network::new();
        net.add_point(Point::new("S", 10.0, 20.0, 100.0)).unwrap();
        net.add_point(Point::new("E", 500.0, -40.0, 103.25)).unwrap();
        let id = net.add_delta_z(1, "S", "E", 0.0, 0.0, 3.2).unwrap();
        let obs = net.observation(id).unwrap();

        assert_abs_diff_eq!(obs.value_aposteriori(&net), 3.25, epsilon = 1e-12);
        assert_abs_diff_eq!(obs.correction(&net), -0.05, epsilon = 1e-12);
        assert_eq!(obs.diff_zs(&net), -1.0);
        assert_eq!(obs.diff_ze(&net), 1.0);
        assert_eq!(obs.diff_xs(&net), 0.0);
        assert_abs_diff_eq!(obs.diff_scale(&net), -3.25, epsilon = 1e-12);
    }

    #[test]
    fn test_heights_of_instrument_and_staff() {
        let mut net = Network::new();
        net.add_point(Point::new("S", 0.0, 0.0, 0.0)).unwrap();
        net.add_point(Point::new("E", 50.0, 0.0, 0.0)).unwrap();
        let id = net.add_delta_z(1, "S", "E", 1.2, 0.7, 0.0).unwrap();
        let obs = net.observation(id).unwrap();
        assert_abs_diff_eq!(obs.value_aposteriori(&net), -0.5, epsilon = 1e-15);
    }
}
