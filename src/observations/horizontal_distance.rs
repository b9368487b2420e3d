//! # Horizontal distances
//!
//! The horizontal distance model is the horizontal part of the frame vector, corrected for the
//! additive constant `a` and the scale `m` of the distance meter:
//!
//! ```text
//! s = (hypot(u, v) − a) / m
//! ∂s/∂q = (u·∂u/∂q + v·∂v/∂q) / (m·hypot(u, v))
//! ∂s/∂a = −1/m,   ∂s/∂m = −(hypot(u, v) − a)/m²
//! ```
//!
//! The measured value is reduced (height, Earth curvature, projection scale) by the attached
//! [`Reduction`](crate::reduction::Reduction) before the residual is formed.

use serde::{Deserialize, Serialize};

use crate::network::Network;
use crate::observations::frame::FrameVariable;
use crate::observations::{ObservationCore, ObservationModel, ObservationType};
use crate::parameters::{ParameterId, ParameterType};
use crate::point::Point;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizontalDistance {
    pub(crate) core: ObservationCore,
    pub(crate) scale: ParameterId,
    pub(crate) zero_point_offset: ParameterId,
}

impl HorizontalDistance {
    pub(crate) fn new(
        core: ObservationCore,
        scale: ParameterId,
        zero_point_offset: ParameterId,
    ) -> Self {
        HorizontalDistance {
            core,
            scale,
            zero_point_offset,
        }
    }

    pub fn scale(&self) -> ParameterId {
        self.scale
    }

    pub fn zero_point_offset(&self) -> ParameterId {
        self.zero_point_offset
    }

    fn scale_and_offset(&self, network: &Network) -> (f64, f64) {
        (
            network.parameter_ref(self.scale).value(),
            network.parameter_ref(self.zero_point_offset).value(),
        )
    }

    fn frame_derivative(&self, network: &Network, variable: FrameVariable) -> f64 {
        let frame = self.core.frame(network);
        let (scale, _) = self.scale_and_offset(network);
        let dist = scale * frame.horizontal_distance();
        if dist == 0.0 {
            return 0.0;
        }
        let (du, dv, _) = frame.partials(variable);
        (frame.u * du + frame.v * dv) / dist
    }

    /// Measured value after the reductions of the attached reduction configuration.
    pub fn reduced_value_apriori(&self, network: &Network) -> f64 {
        let start = network.point_ref(self.core.start_point());
        let end = network.point_ref(self.core.end_point());
        let height = |p: &Point| (p.dimension() == 3).then(|| p.z());
        self.core.reduction_in(network).reduce_horizontal_distance(
            self.core.value_apriori(),
            start.y(),
            end.y(),
            height(start),
            height(end),
        )
    }
}

impl ObservationModel for HorizontalDistance {
    fn core(&self) -> &ObservationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObservationCore {
        &mut self.core
    }

    fn observation_type(&self) -> ObservationType {
        ObservationType::HorizontalDistance
    }

    fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        match kind {
            ParameterType::Scale => Some(self.scale),
            ParameterType::ZeroPointOffset => Some(self.zero_point_offset),
            _ => None,
        }
    }

    fn value_aposteriori(&self, network: &Network) -> f64 {
        let s = self.core.frame(network).horizontal_distance();
        if s == 0.0 {
            return 0.0;
        }
        let (scale, add) = self.scale_and_offset(network);
        (s - add) / scale
    }

    fn diff_xs(&self, network: &Network) -> f64 {
        self.frame_derivative(network, FrameVariable::Xs)
    }

    fn diff_ys(&self, network: &Network) -> f64 {
        self.frame_derivative(network, FrameVariable::Ys)
    }

    fn diff_zs(&self, network: &Network) -> f64 {
        self.frame_derivative(network, FrameVariable::Zs)
    }

    fn diff_vertical_deflection_xs(&self, network: &Network) -> f64 {
        self.frame_derivative(network, FrameVariable::DeflectionXs)
    }

    fn diff_vertical_deflection_ys(&self, network: &Network) -> f64 {
        self.frame_derivative(network, FrameVariable::DeflectionYs)
    }

    fn diff_vertical_deflection_xe(&self, network: &Network) -> f64 {
        self.frame_derivative(network, FrameVariable::DeflectionXe)
    }

    fn diff_vertical_deflection_ye(&self, network: &Network) -> f64 {
        self.frame_derivative(network, FrameVariable::DeflectionYe)
    }

    fn diff_scale(&self, network: &Network) -> f64 {
        let s = self.core.frame(network).horizontal_distance();
        let (scale, add) = self.scale_and_offset(network);
        (add - s) / (scale * scale)
    }

    fn diff_add(&self, network: &Network) -> f64 {
        let (scale, _) = self.scale_and_offset(network);
        -1.0 / scale
    }

    fn correction(&self, network: &Network) -> f64 {
        self.reduced_value_apriori(network) - self.value_aposteriori(network)
    }
}

#[cfg(test)]
mod horizontal_distance_test {
    use super::*;
    use crate::reduction::{Reduction, ReductionTaskType};
    use approx::assert_abs_diff_eq;

    fn network() -> (Network, crate::observations::ObservationId) {
        let mut net = Network::new();
        net.add_point(Point::new("S", 0.0, 0.0, 0.0)).unwrap();
        net.add_point(Point::new("E", 100.0, 0.0, 0.0)).unwrap();
        let id = net
            .add_horizontal_distance(1, "S", "E", 0.0, 0.0, 100.002)
            .unwrap();
        (net, id)
    }

    #[test]
    fn test_plain_distance() {
        let (net, id) = network();
        let obs = net.observation(id).unwrap();
        assert_abs_diff_eq!(obs.value_aposteriori(&net), 100.0);
        assert_abs_diff_eq!(obs.correction(&net), 0.002, epsilon = 1e-12);
        assert_abs_diff_eq!(obs.diff_xs(&net), -1.0);
        assert_abs_diff_eq!(obs.diff_xe(&net), 1.0);
        assert_abs_diff_eq!(obs.diff_add(&net), -1.0);
        assert_abs_diff_eq!(obs.diff_scale(&net), -100.0);
    }

    #[test]
    fn test_scale_and_offset() {
        let (mut net, id) = network();
        let (m, a) = {
            let obs = net.observation(id).unwrap();
            (
                obs.parameter(ParameterType::Scale).unwrap(),
                obs.parameter(ParameterType::ZeroPointOffset).unwrap(),
            )
        };
        net.parameter_mut(m).unwrap().set_value(1.0001);
        net.parameter_mut(a).unwrap().set_value(0.005);

        let obs = net.observation(id).unwrap();
        assert_abs_diff_eq!(obs.value_aposteriori(&net), 99.995 / 1.0001, epsilon = 1e-12);
        assert_abs_diff_eq!(obs.diff_xs(&net), -1.0 / 1.0001, epsilon = 1e-15);
        assert_abs_diff_eq!(obs.diff_add(&net), -1.0 / 1.0001, epsilon = 1e-15);
    }

    #[test]
    fn test_height_reduction_applies_to_measurement_only() {
        let mut net = Network::new();
        net.add_point(Point::new("S", 0.0, 0.0, 6000.0)).unwrap();
        net.add_point(Point::new("E", 100.0, 0.0, 6742.0)).unwrap();
        let id = net
            .add_horizontal_distance(1, "S", "E", 0.0, 0.0, 100.002)
            .unwrap();
        let rid = net.add_reduction(
            Reduction::builder()
                .task(ReductionTaskType::Height)
                .reference_height(-1000.0)
                .build()
                .unwrap(),
        );
        net.attach_reduction(id, rid).unwrap();
        let obs = net.observation(id).unwrap();

        assert_abs_diff_eq!(obs.value_aposteriori(&net), 100.0);
        let reduced = 100.002 * 6_371_000.0 / (6_371_000.0 + 6371.0);
        assert_abs_diff_eq!(obs.correction(&net), reduced - 100.0, epsilon = 1e-12);
    }

    #[test]
    fn test_height_reduction_of_planimetric_points() {
        let mut net = Network::new();
        net.add_point(Point::new_2d("S", 0.0, 0.0)).unwrap();
        net.add_point(Point::new_2d("E", 1000.0, 0.0)).unwrap();
        let id = net
            .add_horizontal_distance(1, "S", "E", 0.0, 0.0, 1000.0)
            .unwrap();
        let rid = net.add_reduction(
            Reduction::builder()
                .task(ReductionTaskType::Height)
                .reference_height(500.0)
                .build()
                .unwrap(),
        );
        net.attach_reduction(id, rid).unwrap();

        let obs = net.observation(id).unwrap();
        assert_eq!(obs.value_aposteriori(&net), 1000.0);
        let reduced = 1000.0 + obs.correction(&net);
        assert_abs_diff_eq!(reduced, 999.9215, epsilon = 1e-4);
        assert!(reduced < 1000.0);
    }
}
