//! # GNSS baselines
//!
//! A GNSS baseline vector is observed as up to three scalar components `ΔX`, `ΔY`, `ΔZ` sharing
//! one user id. Each component is its own [`GnssBaselineComponent`] observation; the siblings
//! of one vector are tied together by a [`BaselineGroup`] which owns the shared datum
//! parameters (scale, rotations) and the redundancy block `R = Q_vv·P` written by the driver.
//!
//! ## Model
//!
//! With `d = (Xe − Xs, Ye − Ys, Ze + th − Zs − ih)` and the datum rotation
//!
//! ```text
//!       ⎡  cy·cz    cx·sz + sx·sy·cz    sx·sz − cx·sy·cz ⎤
//! R  =  ⎢ −cy·sz    cx·cz − sx·sy·sz    sx·cz + cx·sy·sz ⎥
//!       ⎣  sy       −sx·cy              cx·cy            ⎦
//! ```
//!
//! the component `k` is predicted as `m · R[k]·d`. Which rotation angles take part depends on
//! the dimension of the baseline:
//!
//! | dimension | components | rotations       |
//! |-----------|------------|-----------------|
//! | 1         | Z          | rx, ry          |
//! | 2         | X, Y       | rz              |
//! | 3         | X, Y, Z    | rx, ry, rz      |
//!
//! The model is translation-invariant but not symmetric in its parameters, so start and end
//! point partials are given explicitly. Vertical deflections do not enter the model.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;
use nalgebra::{DMatrix, Matrix3, RowVector3, Vector3};
use serde::{Deserialize, Serialize};

use crate::geonet_errors::GeonetError;
use crate::network::Network;
use crate::observations::{
    Observation, ObservationCore, ObservationId, ObservationModel, ObservationType,
};
use crate::parameters::{ParameterId, ParameterType};
use crate::point::PointId;

/// Stable handle of a [`BaselineGroup`] inside a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BaselineId(pub usize);

/// Cartesian component of a baseline vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentType {
    X,
    Y,
    Z,
}

impl ComponentType {
    pub(crate) fn index(self) -> usize {
        match self {
            ComponentType::X => 0,
            ComponentType::Y => 1,
            ComponentType::Z => 2,
        }
    }

    /// Whether a baseline of the given dimension has this component.
    pub fn is_valid_for(self, dimension: u8) -> bool {
        match dimension {
            1 => self == ComponentType::Z,
            2 => self != ComponentType::Z,
            3 => true,
            _ => false,
        }
    }
}

/// Parameter kinds of a baseline of the given dimension.
pub(crate) fn parameter_kinds_for(dimension: u8) -> &'static [ParameterType] {
    match dimension {
        1 => &[
            ParameterType::Scale,
            ParameterType::RotationX,
            ParameterType::RotationY,
        ],
        2 => &[ParameterType::Scale, ParameterType::RotationZ],
        _ => &[
            ParameterType::Scale,
            ParameterType::RotationX,
            ParameterType::RotationY,
            ParameterType::RotationZ,
        ],
    }
}

fn rotation(rx: f64, ry: f64, rz: f64) -> Matrix3<f64> {
    let (sx, cx) = rx.sin_cos();
    let (sy, cy) = ry.sin_cos();
    let (sz, cz) = rz.sin_cos();
    Matrix3::new(
        cy * cz,
        cx * sz + sx * sy * cz,
        sx * sz - cx * sy * cz,
        -cy * sz,
        cx * cz - sx * sy * sz,
        sx * cz + cx * sy * sz,
        sy,
        -sx * cy,
        cx * cy,
    )
}

/// Derivative of [`rotation`] with respect to one of its angles.
fn rotation_derivative(kind: ParameterType, rx: f64, ry: f64, rz: f64) -> Matrix3<f64> {
    let (sx, cx) = rx.sin_cos();
    let (sy, cy) = ry.sin_cos();
    let (sz, cz) = rz.sin_cos();
    match kind {
        ParameterType::RotationX => Matrix3::new(
            0.0,
            -sx * sz + cx * sy * cz,
            cx * sz + sx * sy * cz,
            0.0,
            -sx * cz - cx * sy * sz,
            cx * cz - sx * sy * sz,
            0.0,
            -cx * cy,
            -sx * cy,
        ),
        ParameterType::RotationY => Matrix3::new(
            -sy * cz,
            sx * cy * cz,
            -cx * cy * cz,
            sy * sz,
            -sx * cy * sz,
            cx * cy * sz,
            cy,
            sx * sy,
            -cx * sy,
        ),
        ParameterType::RotationZ => Matrix3::new(
            -cy * sz,
            cx * cz - sx * sy * sz,
            sx * cz + cx * sy * sz,
            -cy * cz,
            -cx * sz - sx * sy * cz,
            -sx * sz + cx * sy * cz,
            0.0,
            0.0,
            0.0,
        ),
        _ => Matrix3::zeros(),
    }
}

/// One scalar component of a GNSS baseline vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnssBaselineComponent {
    pub(crate) core: ObservationCore,
    component: ComponentType,
    dimension: u8,
    pub(crate) baseline: BaselineId,
    pub(crate) scale: ParameterId,
    pub(crate) rotation_x: Option<ParameterId>,
    pub(crate) rotation_y: Option<ParameterId>,
    pub(crate) rotation_z: Option<ParameterId>,
}

impl GnssBaselineComponent {
    pub(crate) fn new(
        core: ObservationCore,
        component: ComponentType,
        baseline: &BaselineGroup,
    ) -> Self {
        GnssBaselineComponent {
            core,
            component,
            dimension: baseline.dimension,
            baseline: baseline.id,
            scale: baseline.scale,
            rotation_x: baseline.rotation_x,
            rotation_y: baseline.rotation_y,
            rotation_z: baseline.rotation_z,
        }
    }

    pub fn component(&self) -> ComponentType {
        self.component
    }

    /// Dimension (1, 2 or 3) of the baseline this component belongs to.
    pub fn dimension(&self) -> u8 {
        self.dimension
    }

    pub fn baseline(&self) -> BaselineId {
        self.baseline
    }

    pub fn scale(&self) -> ParameterId {
        self.scale
    }

    pub(crate) fn parameter_kinds(&self) -> &'static [ParameterType] {
        parameter_kinds_for(self.dimension)
    }

    pub(crate) fn replace_parameter(
        &mut self,
        kind: ParameterType,
        id: ParameterId,
    ) -> Option<ParameterId> {
        let slot = match kind {
            ParameterType::Scale => return Some(std::mem::replace(&mut self.scale, id)),
            ParameterType::RotationX => &mut self.rotation_x,
            ParameterType::RotationY => &mut self.rotation_y,
            ParameterType::RotationZ => &mut self.rotation_z,
            _ => return None,
        };
        slot.as_mut().map(|old| std::mem::replace(old, id))
    }

    fn angle(&self, network: &Network, id: Option<ParameterId>) -> f64 {
        id.map_or(0.0, |id| network.parameter_ref(id).value())
    }

    fn angles(&self, network: &Network) -> (f64, f64, f64) {
        (
            self.angle(network, self.rotation_x),
            self.angle(network, self.rotation_y),
            self.angle(network, self.rotation_z),
        )
    }

    fn scale_value(&self, network: &Network) -> f64 {
        network.parameter_ref(self.scale).value()
    }

    fn difference(&self, network: &Network) -> Vector3<f64> {
        let start = network.point_ref(self.core.start_point());
        let end = network.point_ref(self.core.end_point());
        let mut d = end.coordinates() - start.coordinates();
        d.z += self.core.end_point_height() - self.core.start_point_height();
        d
    }

    fn rotation_row(&self, network: &Network) -> RowVector3<f64> {
        let (rx, ry, rz) = self.angles(network);
        rotation(rx, ry, rz).row(self.component.index()).into_owned()
    }

    fn diff_rotation(&self, network: &Network, kind: ParameterType) -> f64 {
        let (rx, ry, rz) = self.angles(network);
        let row = rotation_derivative(kind, rx, ry, rz)
            .row(self.component.index())
            .into_owned();
        self.scale_value(network) * (row * self.difference(network))[0]
    }
}

impl ObservationModel for GnssBaselineComponent {
    fn core(&self) -> &ObservationCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ObservationCore {
        &mut self.core
    }

    fn observation_type(&self) -> ObservationType {
        match self.dimension {
            1 => ObservationType::Gnss1D,
            2 => ObservationType::Gnss2D,
            _ => ObservationType::Gnss3D,
        }
    }

    fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        match kind {
            ParameterType::Scale => Some(self.scale),
            ParameterType::RotationX => self.rotation_x,
            ParameterType::RotationY => self.rotation_y,
            ParameterType::RotationZ => self.rotation_z,
            _ => None,
        }
    }

    fn value_aposteriori(&self, network: &Network) -> f64 {
        self.scale_value(network) * (self.rotation_row(network) * self.difference(network))[0]
    }

    fn diff_xs(&self, network: &Network) -> f64 {
        -self.scale_value(network) * self.rotation_row(network)[0]
    }

    fn diff_ys(&self, network: &Network) -> f64 {
        -self.scale_value(network) * self.rotation_row(network)[1]
    }

    fn diff_zs(&self, network: &Network) -> f64 {
        -self.scale_value(network) * self.rotation_row(network)[2]
    }

    fn diff_xe(&self, network: &Network) -> f64 {
        self.scale_value(network) * self.rotation_row(network)[0]
    }

    fn diff_ye(&self, network: &Network) -> f64 {
        self.scale_value(network) * self.rotation_row(network)[1]
    }

    fn diff_ze(&self, network: &Network) -> f64 {
        self.scale_value(network) * self.rotation_row(network)[2]
    }

    fn diff_scale(&self, network: &Network) -> f64 {
        (self.rotation_row(network) * self.difference(network))[0]
    }

    fn diff_rot_x(&self, network: &Network) -> f64 {
        match self.rotation_x {
            Some(_) => self.diff_rotation(network, ParameterType::RotationX),
            None => 0.0,
        }
    }

    fn diff_rot_y(&self, network: &Network) -> f64 {
        match self.rotation_y {
            Some(_) => self.diff_rotation(network, ParameterType::RotationY),
            None => 0.0,
        }
    }

    fn diff_rot_z(&self, network: &Network) -> f64 {
        match self.rotation_z {
            Some(_) => self.diff_rotation(network, ParameterType::RotationZ),
            None => 0.0,
        }
    }
}

/// Siblings of one baseline vector and the state they share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineGroup {
    id: BaselineId,
    user_id: usize,
    start: PointId,
    end: PointId,
    dimension: u8,
    components: BTreeMap<ComponentType, ObservationId>,
    scale: ParameterId,
    rotation_x: Option<ParameterId>,
    rotation_y: Option<ParameterId>,
    rotation_z: Option<ParameterId>,
    redundancy: Option<DMatrix<f64>>,
}

impl BaselineGroup {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: BaselineId,
        user_id: usize,
        start: PointId,
        end: PointId,
        dimension: u8,
        scale: ParameterId,
        rotation_x: Option<ParameterId>,
        rotation_y: Option<ParameterId>,
        rotation_z: Option<ParameterId>,
    ) -> Self {
        BaselineGroup {
            id,
            user_id,
            start,
            end,
            dimension,
            components: BTreeMap::new(),
            scale,
            rotation_x,
            rotation_y,
            rotation_z,
            redundancy: None,
        }
    }

    pub fn id(&self) -> BaselineId {
        self.id
    }

    /// Observation id shared by all components.
    pub fn user_id(&self) -> usize {
        self.user_id
    }

    pub fn start_point(&self) -> PointId {
        self.start
    }

    pub fn end_point(&self) -> PointId {
        self.end
    }

    pub fn dimension(&self) -> u8 {
        self.dimension
    }

    /// Components ordered X, Y, Z.
    pub fn components(&self) -> impl Iterator<Item = ObservationId> + '_ {
        self.components.values().copied()
    }

    pub fn component(&self, component: ComponentType) -> Option<ObservationId> {
        self.components.get(&component).copied()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        match kind {
            ParameterType::Scale => Some(self.scale),
            ParameterType::RotationX => self.rotation_x,
            ParameterType::RotationY => self.rotation_y,
            ParameterType::RotationZ => self.rotation_z,
            _ => None,
        }
    }

    pub(crate) fn set_parameter(&mut self, kind: ParameterType, id: ParameterId) {
        match kind {
            ParameterType::Scale => self.scale = id,
            ParameterType::RotationX if self.rotation_x.is_some() => self.rotation_x = Some(id),
            ParameterType::RotationY if self.rotation_y.is_some() => self.rotation_y = Some(id),
            ParameterType::RotationZ if self.rotation_z.is_some() => self.rotation_z = Some(id),
            _ => {}
        }
    }

    /// Redundancy block `R = Q_vv·P` of the vector, rows/columns ordered like
    /// [`components`](Self::components).
    pub fn redundancy_matrix(&self) -> Option<&DMatrix<f64>> {
        self.redundancy.as_ref()
    }

    pub(crate) fn insert(&mut self, component: ComponentType, id: ObservationId) {
        self.components.insert(component, id);
    }
}

impl Network {
    fn baseline_component(&self, id: ObservationId) -> Result<&GnssBaselineComponent, GeonetError> {
        self.observation(id)?
            .as_gnss_baseline()
            .ok_or(GeonetError::NotABaselineComponent(id.0))
    }

    /// Baseline group of a component observation.
    pub fn baseline_of(&self, id: ObservationId) -> Result<&BaselineGroup, GeonetError> {
        let baseline = self.baseline_component(id)?.baseline();
        self.baseline(baseline)
    }

    /// Associate the component `other` (and every sibling it already has) with the baseline
    /// of `id`.
    ///
    /// Both must be GNSS components with the same user id, the same endpoints and the same
    /// dimension, and their component types must not clash. The merged components take over
    /// the scale and rotation parameters of the target baseline. Associating components that
    /// already belong together is a no-op.
    ///
    /// Arguments
    /// -----------------
    /// * `id`: a component of the receiving baseline.
    /// * `other`: a component of the baseline to merge.
    ///
    /// Return
    /// ----------
    /// * `Err(GeonetError::NotABaselineComponent)` if either observation is not a GNSS
    ///   component, `Err(GeonetError::IncompatibleBaselineComponent)` if the two do not fit.
    pub fn add_associated_baseline_component(
        &mut self,
        id: ObservationId,
        other: ObservationId,
    ) -> Result<(), GeonetError> {
        let target = self.baseline_component(id)?.baseline();
        let source = self.baseline_component(other)?.baseline();
        if target == source {
            return Ok(());
        }

        let (t, s) = (self.baseline(target)?, self.baseline(source)?);
        if t.user_id != s.user_id {
            return Err(GeonetError::IncompatibleBaselineComponent(format!(
                "different observation ids {} and {}",
                t.user_id, s.user_id
            )));
        }
        if (t.start, t.end) != (s.start, s.end) {
            return Err(GeonetError::IncompatibleBaselineComponent(format!(
                "baseline {} connects different points",
                t.user_id
            )));
        }
        if t.dimension != s.dimension {
            return Err(GeonetError::IncompatibleBaselineComponent(format!(
                "dimension {} differs from {}",
                t.dimension, s.dimension
            )));
        }
        if let Some(clash) = s.components.keys().find(|c| t.components.contains_key(c)) {
            return Err(GeonetError::IncompatibleBaselineComponent(format!(
                "component {clash:?} of baseline {} already present",
                t.user_id
            )));
        }

        let moved = s.components.clone();
        let kinds = parameter_kinds_for(t.dimension);
        let shared = kinds
            .iter()
            .filter_map(|&kind| t.parameter(kind).map(|p| (kind, p)))
            .collect_vec();

        for (&component, &obs) in &moved {
            for &(kind, parameter) in &shared {
                self.relink_parameter(obs, kind, parameter)?;
            }
            if let Some(Observation::GnssBaseline(g)) = self.observations.get_mut(obs.0) {
                g.baseline = target;
            }
            self.baselines[target.0].insert(component, obs);
        }

        let source_group = &mut self.baselines[source.0];
        source_group.components.clear();
        source_group.redundancy = None;
        self.baselines[target.0].redundancy = None;

        debug!(
            "baseline {}: merged {} component(s) into group {}",
            self.baselines[target.0].user_id,
            moved.len(),
            target.0
        );
        Ok(())
    }

    /// All components of the baseline `id` belongs to, ordered X, Y, Z.
    pub fn baseline_components(&self, id: ObservationId) -> Result<Vec<ObservationId>, GeonetError> {
        Ok(self.baseline_of(id)?.components().collect())
    }

    /// Store the redundancy block of the baseline `id` belongs to.
    ///
    /// Return
    /// ----------
    /// * `Err(GeonetError::InvalidRedundancyMatrix)` unless the matrix is square with one row
    ///   per component.
    pub fn set_baseline_redundancy_matrix(
        &mut self,
        id: ObservationId,
        matrix: DMatrix<f64>,
    ) -> Result<(), GeonetError> {
        let baseline = self.baseline_component(id)?.baseline();
        let group = self
            .baselines
            .get_mut(baseline.0)
            .ok_or(GeonetError::BaselineNotFound(baseline.0))?;
        let n = group.len();
        if !matrix.is_square() || matrix.nrows() != n {
            return Err(GeonetError::InvalidRedundancyMatrix(format!(
                "expected {n}x{n}, got {}x{}",
                matrix.nrows(),
                matrix.ncols()
            )));
        }
        group.redundancy = Some(matrix);
        Ok(())
    }

    pub fn baseline_redundancy_matrix(
        &self,
        id: ObservationId,
    ) -> Result<Option<&DMatrix<f64>>, GeonetError> {
        Ok(self.baseline_of(id)?.redundancy_matrix())
    }
}
