//! # Zenith angles
//!
//! The zenith angle is the angle between the plumb line of the station and the line of sight.
//! With `s = hypot(u, v)` the horizontal part of the frame vector, `k` the refraction
//! coefficient and `R` the Earth radius of the attached reduction:
//!
//! ```text
//! z = atan2(s, w) − k·s/(2R)   (mod 2π)
//! ∂z/∂q = (w·∂s/∂q − s·∂w/∂q)/(s² + w²) − k/(2R)·∂s/∂q,   ∂s/∂q = (u·∂u/∂q + v·∂v/∂q)/s
//! ∂z/∂k = −s/(2R)
//! ```
//!
//! Measurements in the second telescope face are folded into face one once, when the
//! observation is added to the network (see [`ZenithAngle::fold_face`]).

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::{normalize_angle, DPI};
use crate::network::Network;
use crate::observations::frame::FrameVariable;
use crate::observations::{
    angular_difference, FaceType, ObservationCore, ObservationModel, ObservationType,
};
use crate::parameters::{ParameterId, ParameterType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZenithAngle {
    pub(crate) core: ObservationCore,
    pub(crate) refraction_coefficient: ParameterId,
    pub(crate) face: FaceType,
}

impl ZenithAngle {
    pub(crate) fn new(core: ObservationCore, refraction_coefficient: ParameterId) -> Self {
        ZenithAngle {
            core,
            refraction_coefficient,
            face: FaceType::One,
        }
    }

    pub fn refraction_coefficient(&self) -> ParameterId {
        self.refraction_coefficient
    }

    pub fn face(&self) -> FaceType {
        self.face
    }

    /// Fold a second-face reading into face one.
    ///
    /// The a-priori value is first brought into `[0, 2π)`. If `2π − z` is closer to the current
    /// prediction than `z`, it is replaced by `2π − z` and the face is set to [`FaceType::Two`].
    ///
    /// Return
    /// ----------
    /// * `true` if the value was folded.
    pub(crate) fn fold_face(&mut self, network: &Network) -> bool {
        let apriori = normalize_angle(self.core.value_apriori());
        let aposteriori = self.value_aposteriori(network);
        if ((DPI - apriori) - aposteriori).abs() < (apriori - aposteriori).abs() {
            debug!(
                "zenith angle {} folded to face two: {apriori} -> {}",
                self.core.id(),
                DPI - apriori
            );
            self.core.set_value_apriori(DPI - apriori);
            self.face = FaceType::Two;
            true
        } else {
            self.core.set_value_apriori(apriori);
            false
        }
    }

    fn earth_radius(&self, network: &Network) -> f64 {
        self.core.reduction_in(network).earth_radius()
    }

    fn frame_derivative(&self, network: &Network, variable: FrameVariable) -> f64 {
        let frame = self.core.frame(network);
        let s = frame.horizontal_distance();
        if s == 0.0 {
            return 0.0;
        }
        let (du, dv, dw) = frame.partials(variable);
        let ds = (frame.u * du + frame.v * dv) / s;
        let k = network.parameter_ref(self.refraction_coefficient).value();
        let r = self.earth_radius(network);
        (frame.w * ds - s * dw) / (s * s + frame.w * frame.w) - k * ds / (2.0 * r)
    }
}

impl ObservationModel for ZenithAngle {
    fn core(&self) -> &ObservationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObservationCore {
        &mut self.core
    }

    fn observation_type(&self) -> ObservationType {
        ObservationType::ZenithAngle
    }

    fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        (kind == ParameterType::RefractionCoefficient).then_some(self.refraction_coefficient)
    }

    fn value_aposteriori(&self, network: &Network) -> f64 {
        let frame = self.core.frame(network);
        if frame.slope_distance() == 0.0 {
            return 0.0;
        }
        let s = frame.horizontal_distance();
        let k = network.parameter_ref(self.refraction_coefficient).value();
        let r = self.earth_radius(network);
        normalize_angle(s.atan2(frame.w) - k * s / (2.0 * r))
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

    fn diff_ref_coeff(&self, network: &Network) -> f64 {
        let s = self.core.frame(network).horizontal_distance();
        -s / (2.0 * self.earth_radius(network))
    }

    fn correction(&self, network: &Network) -> f64 {
        angular_difference(self.core.value_apriori(), self.value_aposteriori(network))
    }
}
