//! # Network: arena of points, parameters and observations
//!
//! This module defines the [`Network`] struct, the single owner of everything an adjustment
//! iteration reads:
//!
//! 1. **Points** ([`Point`]) addressed by [`PointId`] and by their unique name.
//! 2. **Additional parameters** ([`AdditionalUnknownParameter`]) addressed by [`ParameterId`],
//!    possibly shared by many observations.
//! 3. **Observations** ([`Observation`]) addressed by [`ObservationId`].
//! 4. **Baseline groups** ([`BaselineGroup`]) tying GNSS components of one vector together.
//! 5. **Reductions** ([`Reduction`]) shared by reference; observations without one use the
//!    network default (no reduction, local Cartesian frame).
//! 6. **Observation groups** ([`ObservationGroup`](crate::groups::ObservationGroup)).
//!
//! Handles are plain indices into the arena and stay valid for the lifetime of the network;
//! nothing is ever removed.
//!
//! ## Typical usage
//!
//! ```rust
//! use geonet::network::Network;
//! use geonet::observations::ObservationModel;
//! use geonet::point::Point;
//!
//! let mut net = Network::new();
//! net.add_point(Point::new("S", 0.0, 0.0, 0.0)).unwrap();
//! net.add_point(Point::new("E", 100.0, 0.0, 0.0)).unwrap();
//!
//! let id = net.add_horizontal_distance(1, "S", "E", 0.0, 0.0, 100.003).unwrap();
//! let obs = net.observation(id).unwrap();
//! assert_eq!(obs.value_aposteriori(&net), 100.0);
//! ```
//!
//! ## Ownership of writes
//!
//! Observation models only read from the network. The adjustment driver writes coordinates,
//! parameter values and statistics through the `*_mut` accessors, strictly between two
//! evaluations of the Jacobian.
//!
//! ## See also
//! ------------
//! * [`ObservationModel`] – Value and partial derivatives of one observation.
//! * [`JacobianRow`](crate::jacobian::JacobianRow) – Assembled design-matrix row.

use std::collections::HashMap;

use itertools::Itertools;
use log::debug;

use crate::constants::Meter;
use crate::geonet_errors::GeonetError;
use crate::groups::ObservationGroup;
use crate::observations::{
    BaselineGroup, BaselineId, ComponentType, DeltaZ, Direction, GnssBaselineComponent,
    HorizontalDistance, Observation, ObservationCore, ObservationId, ObservationModel,
    ObservationStatistics, SlopeDistance, ZenithAngle,
};
use crate::parameters::{AdditionalUnknownParameter, ParameterId, ParameterType};
use crate::point::{Point, PointId};
use crate::reduction::spherical_deflection::SphericalDeflectionModel;
use crate::reduction::{Reduction, ReductionId};

#[derive(Debug, Clone, Default)]
pub struct Network {
    pub(crate) points: Vec<Point>,
    point_index: HashMap<String, PointId>,
    pub(crate) parameters: Vec<AdditionalUnknownParameter>,
    pub(crate) observations: Vec<Observation>,
    pub(crate) baselines: Vec<BaselineGroup>,
    pub(crate) reductions: Vec<Reduction>,
    pub(crate) groups: Vec<ObservationGroup>,
    default_reduction: Reduction,
}

impl Network {
    pub fn new() -> Self {
        Network::default()
    }

    // ---------------------------------------------------------------------------------------
    // Points
    // ---------------------------------------------------------------------------------------

    /// Register a point.
    ///
    /// Return
    /// ----------
    /// * The handle of the new point, or `Err(GeonetError::DuplicatePoint)` if the name is
    ///   already taken.
    pub fn add_point(&mut self, point: Point) -> Result<PointId, GeonetError> {
        if self.point_index.contains_key(point.name()) {
            return Err(GeonetError::DuplicatePoint(point.name().to_string()));
        }
        let id = PointId(self.points.len());
        self.point_index.insert(point.name().to_string(), id);
        self.points.push(point);
        Ok(id)
    }

    pub fn point_id(&self, name: &str) -> Result<PointId, GeonetError> {
        self.point_index
            .get(name)
            .copied()
            .ok_or_else(|| GeonetError::UnknownPoint(name.to_string()))
    }

    pub fn point(&self, id: PointId) -> Result<&Point, GeonetError> {
        self.points
            .get(id.0)
            .ok_or_else(|| GeonetError::UnknownPoint(format!("#{}", id.0)))
    }

    pub fn point_mut(&mut self, id: PointId) -> Result<&mut Point, GeonetError> {
        self.points
            .get_mut(id.0)
            .ok_or_else(|| GeonetError::UnknownPoint(format!("#{}", id.0)))
    }

    /// Infallible access for handles created by this network.
    pub(crate) fn point_ref(&self, id: PointId) -> &Point {
        &self.points[id.0]
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    // ---------------------------------------------------------------------------------------
    // Additional parameters
    // ---------------------------------------------------------------------------------------

    pub fn add_parameter(&mut self, parameter: AdditionalUnknownParameter) -> ParameterId {
        let id = ParameterId(self.parameters.len());
        self.parameters.push(parameter);
        id
    }

    pub fn parameter(&self, id: ParameterId) -> Result<&AdditionalUnknownParameter, GeonetError> {
        self.parameters
            .get(id.0)
            .ok_or(GeonetError::ParameterNotFound(id.0))
    }

    pub fn parameter_mut(
        &mut self,
        id: ParameterId,
    ) -> Result<&mut AdditionalUnknownParameter, GeonetError> {
        self.parameters
            .get_mut(id.0)
            .ok_or(GeonetError::ParameterNotFound(id.0))
    }

    pub(crate) fn parameter_ref(&self, id: ParameterId) -> &AdditionalUnknownParameter {
        &self.parameters[id.0]
    }

    pub fn parameters(&self) -> &[AdditionalUnknownParameter] {
        &self.parameters
    }

    /// Assign (or clear) the design-matrix column of a parameter.
    pub fn set_column(&mut self, id: ParameterId, column: Option<usize>) -> Result<(), GeonetError> {
        self.parameter_mut(id)?.set_column(column);
        Ok(())
    }

    /// Link an observation to another parameter of the same kind.
    ///
    /// The observation is removed from the owners of its previous parameter and added to the
    /// owners of `parameter`. For a GNSS component, every sibling of the baseline and the
    /// baseline group itself are re-linked as well.
    ///
    /// Return
    /// ----------
    /// * `Err(GeonetError::ParameterKindMismatch)` if `parameter` is not of kind `kind`,
    ///   `Err(GeonetError::UnsupportedParameter)` if the observation has no such parameter.
    pub fn set_parameter(
        &mut self,
        obs: ObservationId,
        kind: ParameterType,
        parameter: ParameterId,
    ) -> Result<(), GeonetError> {
        let found = self.parameter(parameter)?.kind();
        if found != kind {
            return Err(GeonetError::ParameterKindMismatch {
                expected: kind,
                found,
            });
        }

        let baseline = self.observation(obs)?.as_gnss_baseline().map(|g| g.baseline());
        match baseline {
            Some(baseline) => {
                let siblings = self.baseline(baseline)?.components().collect_vec();
                for sibling in siblings {
                    self.relink_parameter(sibling, kind, parameter)?;
                }
                self.baselines[baseline.0].set_parameter(kind, parameter);
            }
            None => self.relink_parameter(obs, kind, parameter)?,
        }
        Ok(())
    }

    pub(crate) fn relink_parameter(
        &mut self,
        obs: ObservationId,
        kind: ParameterType,
        parameter: ParameterId,
    ) -> Result<(), GeonetError> {
        let observation = self
            .observations
            .get_mut(obs.0)
            .ok_or(GeonetError::ObservationNotFound(obs.0))?;
        let previous = observation
            .replace_parameter(kind, parameter)
            .ok_or(GeonetError::UnsupportedParameter {
                observation: obs.0,
                kind,
            })?;

        if previous != parameter {
            self.parameter_mut(previous)?.remove_owner(obs);
        }
        self.parameter_mut(parameter)?.add_owner(obs);
        Ok(())
    }

    // ---------------------------------------------------------------------------------------
    // Reductions
    // ---------------------------------------------------------------------------------------

    pub fn add_reduction(&mut self, reduction: Reduction) -> ReductionId {
        let id = ReductionId(self.reductions.len());
        self.reductions.push(reduction);
        id
    }

    pub fn reduction(&self, id: ReductionId) -> Result<&Reduction, GeonetError> {
        self.reductions
            .get(id.0)
            .ok_or(GeonetError::ReductionNotFound(id.0))
    }

    pub fn reduction_mut(&mut self, id: ReductionId) -> Result<&mut Reduction, GeonetError> {
        self.reductions
            .get_mut(id.0)
            .ok_or(GeonetError::ReductionNotFound(id.0))
    }

    /// Reduction used by observations without an attached one.
    pub fn default_reduction(&self) -> &Reduction {
        &self.default_reduction
    }

    pub(crate) fn reduction_or_default(&self, id: Option<ReductionId>) -> &Reduction {
        id.and_then(|id| self.reductions.get(id.0))
            .unwrap_or(&self.default_reduction)
    }

    /// Share a reduction configuration with an observation.
    pub fn attach_reduction(
        &mut self,
        obs: ObservationId,
        reduction: ReductionId,
    ) -> Result<(), GeonetError> {
        self.reduction(reduction)?;
        self.observation_core_mut(obs)?.set_reduction(Some(reduction));
        Ok(())
    }

    /// Recompute the spherical deflection of every point observed under `reduction`.
    ///
    /// Return
    /// ----------
    /// * The number of updated points.
    pub fn update_spherical_deflections(
        &mut self,
        reduction: ReductionId,
    ) -> Result<usize, GeonetError> {
        let model = SphericalDeflectionModel::new(self.reduction(reduction)?);
        let points = self
            .observations
            .iter()
            .map(|o| o.core())
            .filter(|core| core.reduction() == Some(reduction))
            .flat_map(|core| [core.start_point(), core.end_point()])
            .unique()
            .collect_vec();

        for &id in &points {
            let deflection = model.spherical_deflection(self.point_ref(id));
            self.points[id.0].set_spherical_deflection(deflection);
        }
        debug!(
            "reduction {}: spherical deflections of {} point(s) updated",
            reduction.0,
            points.len()
        );
        Ok(points.len())
    }

    // ---------------------------------------------------------------------------------------
    // Observations
    // ---------------------------------------------------------------------------------------

    pub fn observation(&self, id: ObservationId) -> Result<&Observation, GeonetError> {
        self.observations
            .get(id.0)
            .ok_or(GeonetError::ObservationNotFound(id.0))
    }

    pub fn observation_core_mut(
        &mut self,
        id: ObservationId,
    ) -> Result<&mut ObservationCore, GeonetError> {
        self.observations
            .get_mut(id.0)
            .map(|o| o.core_mut())
            .ok_or(GeonetError::ObservationNotFound(id.0))
    }

    /// Statistics block of an observation, written by the driver after each pass.
    pub fn statistics_mut(
        &mut self,
        id: ObservationId,
    ) -> Result<&mut ObservationStatistics, GeonetError> {
        Ok(&mut self.observation_core_mut(id)?.statistics)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Assign (or clear) the design-matrix row of an observation.
    pub fn set_row(&mut self, id: ObservationId, row: Option<usize>) -> Result<(), GeonetError> {
        self.observation_core_mut(id)?.set_row(row);
        Ok(())
    }

    /// One-line description of an observation with point names.
    pub fn describe(&self, id: ObservationId) -> Result<String, GeonetError> {
        let observation = self.observation(id)?;
        let core = observation.core();
        let rendered = observation.to_string();
        let suffix = rendered
            .find(" [")
            .map_or(String::new(), |i| rendered[i..].to_string());
        Ok(format!(
            "{} {} {}->{} {:.6}{suffix}",
            observation.observation_type(),
            core.id(),
            self.point(core.start_point())?.name(),
            self.point(core.end_point())?.name(),
            core.value_apriori()
        ))
    }

    fn endpoints(&self, start: &str, end: &str) -> Result<(PointId, PointId), GeonetError> {
        if start == end {
            return Err(GeonetError::IdenticalStartAndEndPoint(start.to_string()));
        }
        Ok((self.point_id(start)?, self.point_id(end)?))
    }

    fn new_parameter(&mut self, kind: ParameterType) -> ParameterId {
        self.add_parameter(AdditionalUnknownParameter::new(kind))
    }

    /// Store an observation and register it with its points and parameters.
    fn push_observation(&mut self, observation: Observation) -> ObservationId {
        let id = ObservationId(self.observations.len());
        let core = observation.core();
        self.points[core.start_point().0].add_observation(id);
        self.points[core.end_point().0].add_observation(id);
        for &kind in observation.parameter_kinds() {
            if let Some(parameter) = observation.parameter(kind) {
                self.parameters[parameter.0].add_owner(id);
            }
        }
        self.observations.push(observation);
        id
    }

    /// Add a horizontal direction with its own orientation unknown.
    ///
    /// Arguments
    /// -----------------
    /// * `id`: User id of the observation.
    /// * `start`, `end`: Names of station and target; they must differ.
    /// * `start_height`, `end_height`: Instrument and target heights.
    /// * `value`: Measured direction in radians.
    ///
    /// Return
    /// ----------
    /// * The handle of the new observation, `Err(GeonetError::IdenticalStartAndEndPoint)` or
    ///   `Err(GeonetError::UnknownPoint)`.
    pub fn add_direction(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        value: f64,
    ) -> Result<ObservationId, GeonetError> {
        let (s, e) = self.endpoints(start, end)?;
        let orientation = self.new_parameter(ParameterType::Orientation);
        let core = ObservationCore::new(id, s, e, start_height, end_height, value);
        Ok(self.push_observation(Observation::Direction(Direction::new(core, orientation))))
    }

    /// Add a horizontal direction belonging to the set of an existing orientation.
    pub fn add_direction_with_orientation(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        value: f64,
        orientation: ParameterId,
    ) -> Result<ObservationId, GeonetError> {
        let found = self.parameter(orientation)?.kind();
        if found != ParameterType::Orientation {
            return Err(GeonetError::ParameterKindMismatch {
                expected: ParameterType::Orientation,
                found,
            });
        }
        let (s, e) = self.endpoints(start, end)?;
        let core = ObservationCore::new(id, s, e, start_height, end_height, value);
        Ok(self.push_observation(Observation::Direction(Direction::new(core, orientation))))
    }

    /// Add a zenith angle. Second-face readings are folded into face one against the current
    /// coordinates.
    pub fn add_zenith_angle(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        value: f64,
    ) -> Result<ObservationId, GeonetError> {
        let (s, e) = self.endpoints(start, end)?;
        let refraction = self.new_parameter(ParameterType::RefractionCoefficient);
        let core = ObservationCore::new(id, s, e, start_height, end_height, value);
        let mut zenith = ZenithAngle::new(core, refraction);
        zenith.fold_face(self);
        Ok(self.push_observation(Observation::ZenithAngle(zenith)))
    }

    pub fn add_horizontal_distance(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        value: f64,
    ) -> Result<ObservationId, GeonetError> {
        let (s, e) = self.endpoints(start, end)?;
        let scale = self.new_parameter(ParameterType::Scale);
        let offset = self.new_parameter(ParameterType::ZeroPointOffset);
        let mut core = ObservationCore::new(id, s, e, start_height, end_height, value);
        core.set_distance_for_uncertainty_model(value.abs());
        Ok(self.push_observation(Observation::HorizontalDistance(HorizontalDistance::new(
            core, scale, offset,
        ))))
    }

    pub fn add_slope_distance(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        value: f64,
    ) -> Result<ObservationId, GeonetError> {
        let (s, e) = self.endpoints(start, end)?;
        let scale = self.new_parameter(ParameterType::Scale);
        let offset = self.new_parameter(ParameterType::ZeroPointOffset);
        let mut core = ObservationCore::new(id, s, e, start_height, end_height, value);
        core.set_distance_for_uncertainty_model(value.abs());
        Ok(self.push_observation(Observation::SlopeDistance(SlopeDistance::new(
            core, scale, offset,
        ))))
    }

    /// Add a leveled height difference.
    pub fn add_delta_z(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        value: f64,
    ) -> Result<ObservationId, GeonetError> {
        let (s, e) = self.endpoints(start, end)?;
        let scale = self.new_parameter(ParameterType::Scale);
        let core = ObservationCore::new(id, s, e, start_height, end_height, value);
        Ok(self.push_observation(Observation::DeltaZ(DeltaZ::new(core, scale))))
    }

    // ---------------------------------------------------------------------------------------
    // GNSS baselines
    // ---------------------------------------------------------------------------------------

    pub fn baseline(&self, id: BaselineId) -> Result<&BaselineGroup, GeonetError> {
        self.baselines
            .get(id.0)
            .ok_or(GeonetError::BaselineNotFound(id.0))
    }

    pub fn baselines(&self) -> &[BaselineGroup] {
        &self.baselines
    }

    /// Add a single GNSS baseline component as its own baseline group.
    ///
    /// Components added separately are tied together with
    /// [`add_associated_baseline_component`](Network::add_associated_baseline_component).
    ///
    /// Arguments
    /// -----------------
    /// * `id`: User id, shared by all components of one vector.
    /// * `start`, `end`: Names of the baseline endpoints.
    /// * `start_height`, `end_height`: Antenna heights.
    /// * `value`: Observed coordinate difference.
    /// * `component`: Which coordinate difference is observed.
    /// * `dimension`: Dimension of the baseline (1: Z, 2: X/Y, 3: X/Y/Z).
    ///
    /// Return
    /// ----------
    /// * `Err(GeonetError::DimensionMismatch)` for a dimension outside 1..=3,
    ///   `Err(GeonetError::IncompatibleBaselineComponent)` for a component the dimension lacks.
    #[allow(clippy::too_many_arguments)]
    pub fn add_gnss_baseline_component(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        value: f64,
        component: ComponentType,
        dimension: u8,
    ) -> Result<ObservationId, GeonetError> {
        let [obs] = self.push_baseline(
            id,
            start,
            end,
            (start_height, end_height),
            dimension,
            [(component, value)],
        )?;
        Ok(obs)
    }

    /// Add a height-only GNSS baseline.
    pub fn add_gnss_baseline_1d(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        dz: f64,
    ) -> Result<ObservationId, GeonetError> {
        self.add_gnss_baseline_component(
            id,
            start,
            end,
            start_height,
            end_height,
            dz,
            ComponentType::Z,
            1,
        )
    }

    /// Add a planimetric GNSS baseline; returns the X and Y components.
    #[allow(clippy::too_many_arguments)]
    pub fn add_gnss_baseline_2d(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        dx: f64,
        dy: f64,
    ) -> Result<[ObservationId; 2], GeonetError> {
        self.push_baseline(
            id,
            start,
            end,
            (start_height, end_height),
            2,
            [(ComponentType::X, dx), (ComponentType::Y, dy)],
        )
    }

    /// Add a spatial GNSS baseline; returns the X, Y and Z components.
    #[allow(clippy::too_many_arguments)]
    pub fn add_gnss_baseline_3d(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        start_height: Meter,
        end_height: Meter,
        dx: f64,
        dy: f64,
        dz: f64,
    ) -> Result<[ObservationId; 3], GeonetError> {
        self.push_baseline(
            id,
            start,
            end,
            (start_height, end_height),
            3,
            [
                (ComponentType::X, dx),
                (ComponentType::Y, dy),
                (ComponentType::Z, dz),
            ],
        )
    }

    /// Create one baseline group holding all `components`.
    ///
    /// Everything is validated before the arena is touched, so a failed call leaves the
    /// network unchanged.
    fn push_baseline<const N: usize>(
        &mut self,
        id: usize,
        start: &str,
        end: &str,
        (start_height, end_height): (Meter, Meter),
        dimension: u8,
        components: [(ComponentType, f64); N],
    ) -> Result<[ObservationId; N], GeonetError> {
        if !(1..=3).contains(&dimension) {
            return Err(GeonetError::DimensionMismatch(format!(
                "GNSS baseline dimension must be 1, 2 or 3, got {dimension}"
            )));
        }
        if let Some((component, _)) = components.iter().find(|(c, _)| !c.is_valid_for(dimension)) {
            return Err(GeonetError::IncompatibleBaselineComponent(format!(
                "component {component} in a {dimension}D baseline"
            )));
        }
        if !components.iter().map(|(c, _)| c).all_unique() {
            return Err(GeonetError::IncompatibleBaselineComponent(format!(
                "baseline {id} lists a component twice"
            )));
        }
        let (s, e) = self.endpoints(start, end)?;

        let scale = self.new_parameter(ParameterType::Scale);
        let (rx, ry, rz) = match dimension {
            1 => (
                Some(self.new_parameter(ParameterType::RotationX)),
                Some(self.new_parameter(ParameterType::RotationY)),
                None,
            ),
            2 => (None, None, Some(self.new_parameter(ParameterType::RotationZ))),
            _ => (
                Some(self.new_parameter(ParameterType::RotationX)),
                Some(self.new_parameter(ParameterType::RotationY)),
                Some(self.new_parameter(ParameterType::RotationZ)),
            ),
        };
        let baseline_id = BaselineId(self.baselines.len());
        self.baselines.push(BaselineGroup::new(
            baseline_id,
            id,
            s,
            e,
            dimension,
            scale,
            rx,
            ry,
            rz,
        ));

        Ok(components.map(|(component, value)| {
            let mut core = ObservationCore::new(id, s, e, start_height, end_height, value);
            core.set_distance_for_uncertainty_model(value.abs());
            let observation =
                GnssBaselineComponent::new(core, component, &self.baselines[baseline_id.0]);
            let obs = self.push_observation(Observation::GnssBaseline(observation));
            self.baselines[baseline_id.0].insert(component, obs);
            obs
        }))
    }
}
