//! # Observations (top-level module)
//!
//! This module gathers the **observation models** of the adjustment: for every observation
//! type, the prediction of the observed value from the current state of the network and the
//! exact partial derivatives of that prediction with respect to every unknown it depends on.
//! These are the rows of the design (Jacobian) matrix consumed by the external Gauss-Newton
//! driver.
//!
//! ## Overview
//!
//! - [`ObservationModel`] – the common contract: a-posteriori value, coordinate and deflection
//!   partials, type-specific parameter partials and the correction (residual) of the
//!   a-priori value.
//! - [`ObservationCore`] – identity, endpoints, instrument heights, a-priori value and
//!   uncertainty shared by every type, plus the [`ObservationStatistics`] written by the
//!   driver after each pass.
//! - [`Observation`] – closed set of concrete models:
//!   [`Direction`], [`ZenithAngle`], [`HorizontalDistance`], [`SlopeDistance`], [`DeltaZ`]
//!   and [`GnssBaselineComponent`].
//! - [`frame`] – the rotated difference vector `(u, v, w)` shared by the terrestrial types.
//!
//! ## Conventions
//!
//! - Angles are in **radians**, lengths in **meters**.
//! - All models read from a [`Network`](crate::network::Network) and never write to it.
//!   Evaluating many observations concurrently is therefore safe.
//! - Degenerate geometry (coincident points) never produces NaN: values and derivatives fall
//!   back to `0.0`.
//! - End-point coordinate derivatives default to the negated start-point derivatives; only
//!   GNSS baselines override them.
//!
//! ## Errors
//!
//! Observation models are infallible. Construction errors (identical endpoints, unknown
//! points) are reported by the `Network::add_*` constructors as
//! [`GeonetError`](crate::geonet_errors::GeonetError).
//!
//! ## See also
//! ------------
//! * [`Network`](crate::network::Network) – Arena owning points, parameters and observations.
//! * [`JacobianRow`](crate::jacobian::JacobianRow) – One assembled design-matrix row.

pub mod delta_z;
pub mod direction;
pub mod display;
pub mod frame;
pub mod gnss_baseline;
pub mod horizontal_distance;
pub mod slope_distance;
pub mod zenith_angle;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::{Meter, ZERO};
use crate::groups::GroupId;
use crate::network::Network;
use crate::parameters::{ParameterId, ParameterType};
use crate::point::{Point, PointId};
use crate::reduction::{ProjectionType, Reduction, ReductionId};

use frame::{FrameDeflection, TopocentricFrame};

pub use delta_z::DeltaZ;
pub use direction::Direction;
pub use gnss_baseline::{BaselineGroup, BaselineId, ComponentType, GnssBaselineComponent};
pub use horizontal_distance::HorizontalDistance;
pub use slope_distance::SlopeDistance;
pub use zenith_angle::ZenithAngle;

/// Stable handle of an [`Observation`] inside a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObservationId(pub usize);

/// Discriminator consumed by the driver for grouping and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObservationType {
    Direction,
    ZenithAngle,
    HorizontalDistance,
    SlopeDistance,
    Leveling,
    Gnss1D,
    Gnss2D,
    Gnss3D,
}

impl ObservationType {
    /// `true` for observations living on the 2π-periodic domain.
    pub fn is_angular(self) -> bool {
        matches!(self, ObservationType::Direction | ObservationType::ZenithAngle)
    }

    pub fn is_gnss(self) -> bool {
        matches!(
            self,
            ObservationType::Gnss1D | ObservationType::Gnss2D | ObservationType::Gnss3D
        )
    }
}

/// Telescope face of an angle measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceType {
    #[default]
    One,
    Two,
}

impl FaceType {
    pub fn flipped(self) -> Self {
        match self {
            FaceType::One => FaceType::Two,
            FaceType::Two => FaceType::One,
        }
    }
}

/// Derived statistics of one observation, written by the driver after each pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationStatistics {
    redundancy: f64,
    t_prio: f64,
    t_post: f64,
    pub p_prio: f64,
    pub p_post: f64,
    /// Estimated gross error ∇.
    pub gross_error: f64,
    /// Minimal detectable bias (lower boundary value of a detectable gross error).
    pub minimal_detectable_bias: f64,
    /// Weighted squared residual `vᵀPv` contribution.
    pub omega: f64,
    /// Influence of an undetected gross error on the point position (EP).
    pub influence_on_point_position: f64,
    /// Influence of an undetected gross error on the network distortion (EF).
    pub influence_on_network_distortion: f64,
    pub significant: bool,
}

impl ObservationStatistics {
    /// Redundancy number in `[0, 1]`.
    pub fn redundancy(&self) -> f64 {
        self.redundancy
    }

    /// Set the redundancy number; values outside `[0, 1]` are ignored.
    ///
    /// Return
    /// ----------
    /// * `true` if the value was stored.
    pub fn set_redundancy(&mut self, redundancy: f64) -> bool {
        if (0.0..=1.0).contains(&redundancy) {
            self.redundancy = redundancy;
            true
        } else {
            warn!("ignoring redundancy {redundancy} outside [0, 1]");
            false
        }
    }

    /// A-priori test statistic, reported as zero below √ε.
    pub fn t_prio(&self) -> f64 {
        if self.t_prio < ZERO {
            0.0
        } else {
            self.t_prio
        }
    }

    /// A-posteriori test statistic, reported as zero below √ε.
    pub fn t_post(&self) -> f64 {
        if self.t_post < ZERO {
            0.0
        } else {
            self.t_post
        }
    }

    pub fn set_test_statistics(&mut self, t_prio: f64, t_post: f64) {
        self.t_prio = t_prio;
        self.t_post = t_post;
    }

    pub fn set_probability_values(&mut self, p_prio: f64, p_post: f64) {
        self.p_prio = p_prio;
        self.p_post = p_post;
    }
}

/// Data shared by every observation type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationCore {
    id: usize,
    start: PointId,
    end: PointId,
    start_height: Meter,
    end_height: Meter,
    apriori: f64,
    sigma0: Option<f64>,
    sigma: Option<f64>,
    distance_for_uncertainty_model: Meter,
    use_group_uncertainty: bool,
    row: Option<usize>,
    reduction: Option<ReductionId>,
    group: Option<GroupId>,
    pub statistics: ObservationStatistics,
}

impl ObservationCore {
    pub(crate) fn new(
        id: usize,
        start: PointId,
        end: PointId,
        start_height: Meter,
        end_height: Meter,
        apriori: f64,
    ) -> Self {
        ObservationCore {
            id,
            start,
            end,
            start_height,
            end_height,
            apriori,
            sigma0: None,
            sigma: None,
            distance_for_uncertainty_model: 0.0,
            use_group_uncertainty: false,
            row: None,
            reduction: None,
            group: None,
            statistics: ObservationStatistics::default(),
        }
    }

    /// User identifier, shared by the components of one GNSS baseline.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn start_point(&self) -> PointId {
        self.start
    }

    pub fn end_point(&self) -> PointId {
        self.end
    }

    /// Instrument height above the station.
    pub fn start_point_height(&self) -> Meter {
        self.start_height
    }

    /// Target height above the end point.
    pub fn end_point_height(&self) -> Meter {
        self.end_height
    }

    pub fn value_apriori(&self) -> f64 {
        self.apriori
    }

    pub fn set_value_apriori(&mut self, value: f64) {
        self.apriori = value;
    }

    /// Current standard deviation, `None` while unset.
    pub fn std(&self) -> Option<f64> {
        self.sigma
    }

    /// First valid standard deviation ever assigned.
    pub fn std_apriori(&self) -> Option<f64> {
        self.sigma0
    }

    /// Assign a standard deviation. Non-positive or NaN values leave the previous one in
    /// place.
    pub fn set_std(&mut self, std: f64) {
        if !(std > 0.0) {
            warn!(
                "ignoring non-positive standard deviation {std} of observation {}",
                self.id
            );
            return;
        }
        if self.sigma0.is_none() {
            self.sigma0 = Some(std);
        }
        self.sigma = Some(std);
    }

    pub fn distance_for_uncertainty_model(&self) -> Meter {
        self.distance_for_uncertainty_model
    }

    pub fn set_distance_for_uncertainty_model(&mut self, distance: Meter) {
        if distance >= 0.0 {
            self.distance_for_uncertainty_model = distance;
        }
    }

    pub fn use_group_uncertainty(&self) -> bool {
        self.use_group_uncertainty
    }

    pub fn set_use_group_uncertainty(&mut self, use_group: bool) {
        self.use_group_uncertainty = use_group;
    }

    /// Row in the design matrix, `None` until the driver assigns one.
    pub fn row(&self) -> Option<usize> {
        self.row
    }

    pub fn set_row(&mut self, row: Option<usize>) {
        self.row = row;
    }

    pub fn reduction(&self) -> Option<ReductionId> {
        self.reduction
    }

    pub(crate) fn set_reduction(&mut self, reduction: Option<ReductionId>) {
        self.reduction = reduction;
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    pub(crate) fn set_group(&mut self, group: Option<GroupId>) {
        self.group = group;
    }

    /// Reduction in effect for this observation.
    pub fn reduction_in<'a>(&self, network: &'a Network) -> &'a Reduction {
        network.reduction_or_default(self.reduction)
    }

    /// Frame vector from the current coordinates and deflections.
    ///
    /// With a local ellipsoidal projection the spherical deflection of each point is added
    /// to its estimated deflection.
    pub fn frame(&self, network: &Network) -> TopocentricFrame {
        let start = network.point_ref(self.start);
        let end = network.point_ref(self.end);
        let spherical =
            self.reduction_in(network).projection_type() == ProjectionType::LocalEllipsoidal;

        let deflection = |p: &Point| {
            let mut d = FrameDeflection {
                x: p.deflection_x().value(),
                y: p.deflection_y().value(),
            };
            if spherical {
                d.x += p.spherical_deflection().x;
                d.y += p.spherical_deflection().y;
            }
            d
        };

        TopocentricFrame::new(
            start.coordinates(),
            end.coordinates(),
            self.start_height,
            self.end_height,
            deflection(start),
            deflection(end),
        )
    }

    /// Frame vector from the approximate coordinates and deflections.
    pub fn apriori_frame(&self, network: &Network) -> TopocentricFrame {
        let start = network.point_ref(self.start);
        let end = network.point_ref(self.end);
        TopocentricFrame::new(
            start.approximate_coordinates(),
            end.approximate_coordinates(),
            self.start_height,
            self.end_height,
            FrameDeflection {
                x: start.deflection_x().value0(),
                y: start.deflection_y().value0(),
            },
            FrameDeflection {
                x: end.deflection_x().value0(),
                y: end.deflection_y().value0(),
            },
        )
    }

    /// Horizontal distance between the approximate positions.
    pub fn calculated_apriori_distance_2d(&self, network: &Network) -> Meter {
        self.apriori_frame(network).horizontal_distance()
    }

    /// Spatial distance between the approximate positions.
    pub fn calculated_apriori_distance_3d(&self, network: &Network) -> Meter {
        self.apriori_frame(network).slope_distance()
    }
}

/// Common contract of every observation model.
///
/// Every method reads the current state of `network`; none of them mutates it.
pub trait ObservationModel {
    fn core(&self) -> &ObservationCore;

    fn core_mut(&mut self) -> &mut ObservationCore;

    fn observation_type(&self) -> ObservationType;

    /// Handle of the parameter of the given kind used by this observation, if any.
    fn parameter(&self, _kind: ParameterType) -> Option<ParameterId> {
        None
    }

    /// Predicted value from the current coordinates and parameters.
    fn value_aposteriori(&self, network: &Network) -> f64;

    fn diff_xs(&self, network: &Network) -> f64;
    fn diff_ys(&self, network: &Network) -> f64;
    fn diff_zs(&self, network: &Network) -> f64;

    fn diff_xe(&self, network: &Network) -> f64 {
        -self.diff_xs(network)
    }

    fn diff_ye(&self, network: &Network) -> f64 {
        -self.diff_ys(network)
    }

    fn diff_ze(&self, network: &Network) -> f64 {
        -self.diff_zs(network)
    }

    fn diff_vertical_deflection_xs(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_vertical_deflection_ys(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_vertical_deflection_xe(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_vertical_deflection_ye(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_ori(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_scale(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_add(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_ref_coeff(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_rot_x(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_rot_y(&self, _network: &Network) -> f64 {
        0.0
    }

    fn diff_rot_z(&self, _network: &Network) -> f64 {
        0.0
    }

    /// Difference between the (reduced) a-priori value and the prediction.
    fn correction(&self, network: &Network) -> f64 {
        self.core().value_apriori() - self.value_aposteriori(network)
    }

    /// Partial derivative with respect to an additional parameter of the given kind.
    fn diff_parameter(&self, network: &Network, kind: ParameterType) -> f64 {
        match kind {
            ParameterType::Orientation => self.diff_ori(network),
            ParameterType::Scale => self.diff_scale(network),
            ParameterType::ZeroPointOffset => self.diff_add(network),
            ParameterType::RefractionCoefficient => self.diff_ref_coeff(network),
            ParameterType::RotationX => self.diff_rot_x(network),
            ParameterType::RotationY => self.diff_rot_y(network),
            ParameterType::RotationZ => self.diff_rot_z(network),
        }
    }
}

/// Closed set of observation models stored in the network arena.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Direction(Direction),
    ZenithAngle(ZenithAngle),
    HorizontalDistance(HorizontalDistance),
    SlopeDistance(SlopeDistance),
    DeltaZ(DeltaZ),
    GnssBaseline(GnssBaselineComponent),
}

macro_rules! dispatch {
    ($self:ident, $obs:ident => $body:expr) => {
        match $self {
            Observation::Direction($obs) => $body,
            Observation::ZenithAngle($obs) => $body,
            Observation::HorizontalDistance($obs) => $body,
            Observation::SlopeDistance($obs) => $body,
            Observation::DeltaZ($obs) => $body,
            Observation::GnssBaseline($obs) => $body,
        }
    };
}

impl Observation {
    pub fn as_direction(&self) -> Option<&Direction> {
        match self {
            Observation::Direction(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_zenith_angle(&self) -> Option<&ZenithAngle> {
        match self {
            Observation::ZenithAngle(z) => Some(z),
            _ => None,
        }
    }

    pub fn as_gnss_baseline(&self) -> Option<&GnssBaselineComponent> {
        match self {
            Observation::GnssBaseline(g) => Some(g),
            _ => None,
        }
    }

    /// Re-link the parameter of the given kind. Returns the previous handle, or `None` if the
    /// observation type has no such parameter.
    pub(crate) fn replace_parameter(
        &mut self,
        kind: ParameterType,
        id: ParameterId,
    ) -> Option<ParameterId> {
        match (self, kind) {
            (Observation::Direction(d), ParameterType::Orientation) => {
                Some(std::mem::replace(&mut d.orientation, id))
            }
            (Observation::ZenithAngle(z), ParameterType::RefractionCoefficient) => {
                Some(std::mem::replace(&mut z.refraction_coefficient, id))
            }
            (Observation::HorizontalDistance(h), ParameterType::Scale) => {
                Some(std::mem::replace(&mut h.scale, id))
            }
            (Observation::HorizontalDistance(h), ParameterType::ZeroPointOffset) => {
                Some(std::mem::replace(&mut h.zero_point_offset, id))
            }
            (Observation::SlopeDistance(s), ParameterType::Scale) => {
                Some(std::mem::replace(&mut s.scale, id))
            }
            (Observation::SlopeDistance(s), ParameterType::ZeroPointOffset) => {
                Some(std::mem::replace(&mut s.zero_point_offset, id))
            }
            (Observation::DeltaZ(d), ParameterType::Scale) => {
                Some(std::mem::replace(&mut d.scale, id))
            }
            (Observation::GnssBaseline(g), kind) => g.replace_parameter(kind, id),
            _ => None,
        }
    }

    /// Parameter kinds this observation type carries.
    pub fn parameter_kinds(&self) -> &'static [ParameterType] {
        match self {
            Observation::Direction(_) => &[ParameterType::Orientation],
            Observation::ZenithAngle(_) => &[ParameterType::RefractionCoefficient],
            Observation::HorizontalDistance(_) | Observation::SlopeDistance(_) => {
                &[ParameterType::Scale, ParameterType::ZeroPointOffset]
            }
            Observation::DeltaZ(_) => &[ParameterType::Scale],
            Observation::GnssBaseline(g) => g.parameter_kinds(),
        }
    }
}

impl ObservationModel for Observation {
    fn core(&self) -> &ObservationCore {
        dispatch!(self, o => o.core())
    }

    fn core_mut(&mut self) -> &mut ObservationCore {
        dispatch!(self, o => o.core_mut())
    }

    fn observation_type(&self) -> ObservationType {
        dispatch!(self, o => o.observation_type())
    }

    fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        dispatch!(self, o => o.parameter(kind))
    }

    fn value_aposteriori(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.value_aposteriori(network))
    }

    fn diff_xs(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_xs(network))
    }

    fn diff_ys(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_ys(network))
    }

    fn diff_zs(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_zs(network))
    }

    fn diff_xe(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_xe(network))
    }

    fn diff_ye(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_ye(network))
    }

    fn diff_ze(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_ze(network))
    }

    fn diff_vertical_deflection_xs(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_vertical_deflection_xs(network))
    }

    fn diff_vertical_deflection_ys(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_vertical_deflection_ys(network))
    }

    fn diff_vertical_deflection_xe(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_vertical_deflection_xe(network))
    }

    fn diff_vertical_deflection_ye(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_vertical_deflection_ye(network))
    }

    fn diff_ori(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_ori(network))
    }

    fn diff_scale(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_scale(network))
    }

    fn diff_add(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_add(network))
    }

    fn diff_ref_coeff(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_ref_coeff(network))
    }

    fn diff_rot_x(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_rot_x(network))
    }

    fn diff_rot_y(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_rot_y(network))
    }

    fn diff_rot_z(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.diff_rot_z(network))
    }

    fn correction(&self, network: &Network) -> f64 {
        dispatch!(self, o => o.correction(network))
    }
}

/// Residual of two angles on the 2π-periodic domain.
///
/// Both values are first normalised into `[0, 2π)`. If the plain difference is longer than
/// the way around the circle, the model value is shifted by 2π towards the observed one.
pub(crate) fn angular_difference(observed: f64, calculated: f64) -> f64 {
    use crate::constants::{normalize_angle, DPI};

    let observed = normalize_angle(observed);
    let mut calculated = normalize_angle(calculated);
    let diff = observed - calculated;
    if DPI - diff.abs() < diff.abs() {
        if observed > calculated {
            calculated += DPI;
        } else {
            calculated -= DPI;
        }
    }
    observed - calculated
}

#[cfg(test)]
mod observations_test {
    use super::*;
    use crate::constants::DPI;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_set_std_keeps_previous_on_invalid() {
        let mut core = ObservationCore::new(1, PointId(0), PointId(1), 0.0, 0.0, 10.0);
        assert_eq!(core.std(), None);

        core.set_std(-1.0);
        assert_eq!(core.std(), None);
        assert_eq!(core.std_apriori(), None);

        core.set_std(0.003);
        core.set_std(0.0);
        core.set_std(f64::NAN);
        assert_eq!(core.std(), Some(0.003));

        core.set_std(0.005);
        assert_eq!(core.std(), Some(0.005));
        assert_eq!(core.std_apriori(), Some(0.003));
    }

    #[test]
    fn test_redundancy_range() {
        let mut stats = ObservationStatistics::default();
        assert!(stats.set_redundancy(0.4));
        assert!(!stats.set_redundancy(1.2));
        assert!(!stats.set_redundancy(-0.1));
        assert_eq!(stats.redundancy(), 0.4);
    }

    #[test]
    fn test_tiny_test_statistics_read_as_zero() {
        let mut stats = ObservationStatistics::default();
        stats.set_test_statistics(1e-9, 2.0);
        assert_eq!(stats.t_prio(), 0.0);
        assert_eq!(stats.t_post(), 2.0);
    }

    #[test]
    fn test_angular_difference_takes_short_way() {
        assert_abs_diff_eq!(angular_difference(0.01, DPI - 0.01), 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(angular_difference(DPI - 0.01, 0.01), -0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(angular_difference(1.0, 0.5), 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_angular_difference_ignores_full_turns() {
        for &(obs, calc) in &[(0.3, 6.1), (3.0, 0.2), (1.0, 1.0 + 1e-6), (5.5, 2.4)] {
            let d = angular_difference(obs, calc);
            assert_abs_diff_eq!(angular_difference(obs + DPI, calc), d, epsilon = 1e-12);
            assert_abs_diff_eq!(angular_difference(obs, calc + DPI), d, epsilon = 1e-12);
            assert_abs_diff_eq!(angular_difference(obs - DPI, calc - DPI), d, epsilon = 1e-12);
        }
    }
}
