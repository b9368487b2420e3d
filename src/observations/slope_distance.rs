//! # Slope distances
//!
//! Spatial distance between the instrument and the target, corrected for the additive
//! constant `a` and the scale `m`:
//!
//! ```text
//! s = (√(u² + v² + w²) − a) / m
//! ```
//!
//! Slope distances are compared in 3D and receive no projection reduction.

use serde::{Deserialize, Serialize};

use crate::network::Network;
use crate::observations::frame::FrameVariable;
use crate::observations::{ObservationCore, ObservationModel, ObservationType};
use crate::parameters::{ParameterId, ParameterType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlopeDistance {
    pub(crate) core: ObservationCore,
    pub(crate) scale: ParameterId,
    pub(crate) zero_point_offset: ParameterId,
}

impl SlopeDistance {
    pub(crate) fn new(
        core: ObservationCore,
        scale: ParameterId,
        zero_point_offset: ParameterId,
    ) -> Self {
        SlopeDistance {
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
        let dist = scale * frame.slope_distance();
        if dist == 0.0 {
            return 0.0;
        }
        let (du, dv, dw) = frame.partials(variable);
        (frame.u * du + frame.v * dv + frame.w * dw) / dist
    }
}

impl ObservationModel for SlopeDistance {
    fn core(&self) -> &ObservationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObservationCore {
        &mut self.core
    }

    fn observation_type(&self) -> ObservationType {
        ObservationType::SlopeDistance
    }

    fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        match kind {
            ParameterType::Scale => Some(self.scale),
            ParameterType::ZeroPointOffset => Some(self.zero_point_offset),
            _ => None,
        }
    }

    fn value_aposteriori(&self, network: &Network) -> f64 {
        let s = self.core.frame(network).slope_distance();
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
        let s = self.core.frame(network).slope_distance();
        let (scale, add) = self.scale_and_offset(network);
        (add - s) / (scale * scale)
    }

    fn diff_add(&self, network: &Network) -> f64 {
        let (scale, _) = self.scale_and_offset(network);
        -1.0 / scale
    }
}
