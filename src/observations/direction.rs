//! # Horizontal directions
//!
//! A direction is the horizontal angle from the zero of the instrument circle to the target,
//! counted from the `x` axis towards the `y` axis. The model is the azimuth of the frame
//! vector minus the orientation of the direction set:
//!
//! ```text
//! r = atan2(v, u) − o   (mod 2π)
//! ∂r/∂q = (u·∂v/∂q − v·∂u/∂q) / (u² + v²)
//! ```
//!
//! All directions measured in one set share their [`Orientation`](crate::parameters::ParameterType::Orientation)
//! parameter. When the direction reduction is enabled in a Gauß-Krüger or UTM frame, the
//! a-priori value is corrected by the meridian-convergence term of
//! [`Reduction::direction_reduction`](crate::reduction::Reduction::direction_reduction) before
//! the residual is formed; the model itself stays unreduced.

use serde::{Deserialize, Serialize};

use crate::constants::normalize_angle;
use crate::network::Network;
use crate::observations::frame::FrameVariable;
use crate::observations::{
    angular_difference, FaceType, ObservationCore, ObservationModel, ObservationType,
};
use crate::parameters::{ParameterId, ParameterType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Direction {
    pub(crate) core: ObservationCore,
    pub(crate) orientation: ParameterId,
    pub(crate) face: FaceType,
}

impl Direction {
    pub(crate) fn new(core: ObservationCore, orientation: ParameterId) -> Self {
        Direction {
            core,
            orientation,
            face: FaceType::One,
        }
    }

    pub fn orientation(&self) -> ParameterId {
        self.orientation
    }

    pub fn face(&self) -> FaceType {
        self.face
    }

    pub(crate) fn set_face(&mut self, face: FaceType) {
        self.face = face;
    }

    fn frame_derivative(&self, network: &Network, variable: FrameVariable) -> f64 {
        let frame = self.core.frame(network);
        let d2 = frame.horizontal_distance_squared();
        if d2 == 0.0 {
            return 0.0;
        }
        let (du, dv, _) = frame.partials(variable);
        (frame.u * dv - frame.v * du) / d2
    }

    /// A-priori value after the optional meridian-convergence reduction.
    pub fn reduced_value_apriori(&self, network: &Network) -> f64 {
        let apriori = self.core.value_apriori();
        let start = network.point_ref(self.core.start_point());
        let end = network.point_ref(self.core.end_point());
        match self.core.reduction_in(network).direction_reduction(
            start.x(),
            start.y(),
            end.x(),
            end.y(),
        ) {
            Some(k) => normalize_angle(apriori + k),
            None => apriori,
        }
    }
}

impl ObservationModel for Direction {
    fn core(&self) -> &ObservationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObservationCore {
        &mut self.core
    }

    fn observation_type(&self) -> ObservationType {
        ObservationType::Direction
    }

    fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        (kind == ParameterType::Orientation).then_some(self.orientation)
    }

    fn value_aposteriori(&self, network: &Network) -> f64 {
        let frame = self.core.frame(network);
        if frame.horizontal_distance_squared() == 0.0 {
            return 0.0;
        }
        let orientation = network.parameter_ref(self.orientation).value();
        normalize_angle(frame.v.atan2(frame.u) - orientation)
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

    fn diff_ori(&self, _network: &Network) -> f64 {
        -1.0
    }

    fn correction(&self, network: &Network) -> f64 {
        angular_difference(
            self.reduced_value_apriori(network),
            self.value_aposteriori(network),
        )
    }
}

#[cfg(test)]
mod direction_test {
    use super::*;
    use crate::point::Point;
    use crate::reduction::{ProjectionType, Reduction, ReductionTaskType};
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    fn network(end: (f64, f64, f64)) -> (Network, crate::observations::ObservationId) {
        let mut net = Network::new();
        net.add_point(Point::new("S", 0.0, 0.0, 0.0)).unwrap();
        net.add_point(Point::new("E", end.0, end.1, end.2)).unwrap();
        let id = net.add_direction(1, "S", "E", 0.0, 0.0, 0.0).unwrap();
        (net, id)
    }

    #[test]
    fn test_direction_along_axes() {
        let (net, id) = network((100.0, 0.0, 0.0));
        let obs = net.observation(id).unwrap();
        assert_abs_diff_eq!(obs.value_aposteriori(&net), 0.0);

        let (net, id) = network((0.0, 100.0, 0.0));
        let obs = net.observation(id).unwrap();
        assert_abs_diff_eq!(obs.value_aposteriori(&net), FRAC_PI_2, epsilon = 1e-15);
        assert_abs_diff_eq!(obs.diff_xs(&net), 0.01, epsilon = 1e-15);
        assert_abs_diff_eq!(obs.diff_ys(&net), 0.0, epsilon = 1e-15);
        assert_eq!(obs.diff_ori(&net), -1.0);
    }

    #[test]
    fn test_orientation_is_subtracted() {
        let (mut net, id) = network((0.0, 100.0, 0.0));
        let ori = net.observation(id).unwrap().parameter(ParameterType::Orientation).unwrap();
        net.parameter_mut(ori).unwrap().set_value(FRAC_PI_2 + 0.1);
        let obs = net.observation(id).unwrap();
        assert_abs_diff_eq!(
            obs.value_aposteriori(&net),
            crate::constants::DPI - 0.1,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_correction_across_zero() {
        let (mut net, id) = network((100.0, -1.0, 0.0));
        net.observation_core_mut(id).unwrap().set_value_apriori(0.002);
        let obs = net.observation(id).unwrap();
        // model is just below 2π, observation just above 0
        assert_abs_diff_eq!(obs.correction(&net), 0.002 + 0.01f64.atan(), epsilon = 1e-12);
    }

    #[test]
    fn test_gauss_krueger_reduction_only_touches_apriori() {
        let mut net = Network::new();
        net.add_point(Point::new("S", 5_000_000.0, 4_510_000.0, 0.0)).unwrap();
        net.add_point(Point::new("E", 5_001_000.0, 4_510_000.0, 0.0)).unwrap();
        let id = net.add_direction(1, "S", "E", 0.0, 0.0, 0.0).unwrap();
        let plain = net.observation(id).unwrap().correction(&net);

        let reduction = Reduction::builder()
            .projection_type(ProjectionType::GaussKrueger)
            .task(ReductionTaskType::Direction)
            .build()
            .unwrap();
        let rid = net.add_reduction(reduction);
        net.attach_reduction(id, rid).unwrap();
        let obs = net.observation(id).unwrap();

        let k = -1000.0 * 30_000.0 / (6.0 * 6_371_000f64.powi(2));
        assert_abs_diff_eq!(obs.value_aposteriori(&net), 0.0);
        assert_abs_diff_eq!(obs.correction(&net) - plain, k, epsilon = 1e-12);
    }
}
