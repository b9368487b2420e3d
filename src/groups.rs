//! # Observation groups
//!
//! Observations of one type measured with the same instrument form a group. A group carries
//!
//! * a three-term [`UncertaintyModel`] `σ² = a² + b(d)² + c(d)²` used for every member
//!   without an individual standard deviation,
//! * the additional parameters shared by its members (orientation, scale, zero-point offset,
//!   refraction coefficient or the GNSS datum rotations),
//! * the averaging of repeated measurements, which merges observations of the same
//!   line into one and rejects gross outliers.
//!
//! ## Distance dependent terms
//!
//! | type                          | b term      | c term  | fallback distance           |
//! |-------------------------------|-------------|---------|-----------------------------|
//! | direction                     | `b/√d`      | `c/d`   | 3D if both points are 3D, else 2D |
//! | zenith angle                  | `b/√d`      | `c/d`   | 3D                          |
//! | horizontal distance, leveling | `b·√(d/km)` | `c·d`   | 2D                          |
//! | slope distance                | `b·√(d/km)` | `c·d`   | 3D                          |
//! | GNSS                          | `b·√(d/km)` | `c·d`   | `|apriori|`                 |
//!
//! `d` is the distance for the uncertainty model of the observation, or the fallback
//! distance between the approximate positions when it is unset.

use itertools::Itertools;
use log::{debug, warn};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::constants::{
    normalize_angle, Meter, ANGLE_DISTANCE_DEPENDENT, ANGLE_SQUARE_ROOT_DISTANCE_DEPENDENT,
    ANGLE_ZERO_POINT_OFFSET, AVERAGE_THRESHOLD_FACTOR, DISTANCE_DISTANCE_DEPENDENT,
    DISTANCE_SQUARE_ROOT_DISTANCE_DEPENDENT, DISTANCE_ZERO_POINT_OFFSET, DPI, EPS,
    GNSS_DISTANCE_DEPENDENT, GNSS_SQUARE_ROOT_DISTANCE_DEPENDENT, GNSS_ZERO_POINT_OFFSET,
    LEVELING_DISTANCE_DEPENDENT, LEVELING_SQUARE_ROOT_DISTANCE_DEPENDENT,
    LEVELING_ZERO_POINT_OFFSET,
};
use crate::geonet_errors::GeonetError;
use crate::network::Network;
use crate::observations::gnss_baseline::parameter_kinds_for;
use crate::observations::{ComponentType, ObservationId, ObservationModel, ObservationType};
use crate::parameters::{AdditionalUnknownParameter, ParameterId, ParameterType};
use crate::point::PointId;

/// Stable handle of an [`ObservationGroup`] inside a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub usize);

/// A-priori uncertainty `σ = √(a² + b(d)² + c(d)²)` of a group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyModel {
    a: f64,
    b: f64,
    c: f64,
}

impl UncertaintyModel {
    /// Build a model from its constant, √distance dependent and distance dependent parts.
    ///
    /// Return
    /// ----------
    /// * `Err(GeonetError::InvalidUncertainty)` if `a` is not positive. Negative `b` and `c`
    ///   are clamped to zero.
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self, GeonetError> {
        if !(a > 0.0) {
            return Err(GeonetError::InvalidUncertainty(format!(
                "constant part must be positive, got {a}"
            )));
        }
        Ok(UncertaintyModel {
            a,
            b: b.max(0.0),
            c: c.max(0.0),
        })
    }

    /// Default model of an observation type.
    pub fn default_for(kind: ObservationType) -> Self {
        let (a, b, c) = match kind {
            ObservationType::Direction | ObservationType::ZenithAngle => (
                ANGLE_ZERO_POINT_OFFSET,
                ANGLE_SQUARE_ROOT_DISTANCE_DEPENDENT,
                ANGLE_DISTANCE_DEPENDENT,
            ),
            ObservationType::HorizontalDistance | ObservationType::SlopeDistance => (
                DISTANCE_ZERO_POINT_OFFSET,
                DISTANCE_SQUARE_ROOT_DISTANCE_DEPENDENT,
                DISTANCE_DISTANCE_DEPENDENT,
            ),
            ObservationType::Leveling => (
                LEVELING_ZERO_POINT_OFFSET,
                LEVELING_SQUARE_ROOT_DISTANCE_DEPENDENT,
                LEVELING_DISTANCE_DEPENDENT,
            ),
            ObservationType::Gnss1D | ObservationType::Gnss2D | ObservationType::Gnss3D => (
                GNSS_ZERO_POINT_OFFSET,
                GNSS_SQUARE_ROOT_DISTANCE_DEPENDENT,
                GNSS_DISTANCE_DEPENDENT,
            ),
        };
        UncertaintyModel { a, b, c }
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn b(&self) -> f64 {
        self.b
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    /// Standard deviation of an observation of type `kind` over the distance `distance`.
    pub fn std(&self, kind: ObservationType, distance: Meter) -> f64 {
        let (b, c) = if kind.is_angular() {
            if distance > 0.0 {
                (self.b / distance.sqrt(), self.c / distance)
            } else {
                (0.0, 0.0)
            }
        } else {
            let d = distance.max(0.0);
            (self.b * (d / 1000.0).sqrt(), self.c * d)
        };
        (self.a * self.a + b * b + c * c).sqrt()
    }
}

/// Default averaging threshold of an observation type: ten times the default constant part
/// of its uncertainty.
pub fn default_average_threshold(kind: ObservationType) -> f64 {
    UncertaintyModel::default_for(kind).a() * AVERAGE_THRESHOLD_FACTOR
}

/// Parameter kinds shared by a group of the given type.
fn group_parameter_kinds(kind: ObservationType) -> &'static [ParameterType] {
    match kind {
        ObservationType::Direction => &[ParameterType::Orientation],
        ObservationType::ZenithAngle => &[ParameterType::RefractionCoefficient],
        ObservationType::HorizontalDistance | ObservationType::SlopeDistance => {
            &[ParameterType::Scale, ParameterType::ZeroPointOffset]
        }
        ObservationType::Leveling => &[ParameterType::Scale],
        ObservationType::Gnss1D => parameter_kinds_for(1),
        ObservationType::Gnss2D => parameter_kinds_for(2),
        ObservationType::Gnss3D => parameter_kinds_for(3),
    }
}

/// Observations of one type sharing an uncertainty model and additional parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationGroup {
    id: GroupId,
    observation_type: ObservationType,
    uncertainty: UncertaintyModel,
    members: Vec<ObservationId>,
    parameters: Vec<(ParameterType, ParameterId)>,
    excluded: Vec<ObservationId>,
}

impl ObservationGroup {
    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn observation_type(&self) -> ObservationType {
        self.observation_type
    }

    pub fn uncertainty(&self) -> &UncertaintyModel {
        &self.uncertainty
    }

    pub fn members(&self) -> &[ObservationId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Shared parameter of the given kind.
    pub fn parameter(&self, kind: ParameterType) -> Option<ParameterId> {
        self.parameters
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|&(_, id)| id)
    }

    pub fn parameters(&self) -> &[(ParameterType, ParameterId)] {
        &self.parameters
    }

    /// Observations rejected by the last averaging.
    pub fn excluded_during_averaging(&self) -> &[ObservationId] {
        &self.excluded
    }
}

/// Selection key of repeated measurements of the same line.
type LineKey = (
    PointId,
    PointId,
    OrderedFloat<f64>,
    OrderedFloat<f64>,
    Option<ComponentType>,
);

impl Network {
    /// Create an empty group with fresh shared parameters.
    pub fn add_group(&mut self, kind: ObservationType, uncertainty: UncertaintyModel) -> GroupId {
        let id = GroupId(self.groups.len());
        let parameters = group_parameter_kinds(kind)
            .iter()
            .map(|&k| (k, self.add_parameter(AdditionalUnknownParameter::new(k))))
            .collect();
        self.groups.push(ObservationGroup {
            id,
            observation_type: kind,
            uncertainty,
            members: Vec::new(),
            parameters,
            excluded: Vec::new(),
        });
        id
    }

    pub fn group(&self, id: GroupId) -> Result<&ObservationGroup, GeonetError> {
        self.groups.get(id.0).ok_or(GeonetError::GroupNotFound(id.0))
    }

    /// Replace the uncertainty model of a group. Members that use the group uncertainty are
    /// updated.
    pub fn set_group_uncertainty(
        &mut self,
        id: GroupId,
        uncertainty: UncertaintyModel,
    ) -> Result<(), GeonetError> {
        let group = self
            .groups
            .get_mut(id.0)
            .ok_or(GeonetError::GroupNotFound(id.0))?;
        group.uncertainty = uncertainty;
        for obs in group.members.clone() {
            if self.observation(obs)?.core().use_group_uncertainty() {
                let std = self.group_uncertainty(id, obs)?;
                self.observation_core_mut(obs)?.set_std(std);
            }
        }
        Ok(())
    }

    /// Add an observation to a group.
    ///
    /// The observation takes over the shared parameters of the group. When it has no
    /// standard deviation yet, it receives the group uncertainty.
    ///
    /// Return
    /// ----------
    /// * `Err(GeonetError::ObservationTypeMismatch)` if the observation is of another type.
    pub fn add_to_group(&mut self, id: GroupId, obs: ObservationId) -> Result<(), GeonetError> {
        let group = self.group(id)?;
        let (expected, parameters) = (group.observation_type, group.parameters.clone());
        let found = self.observation(obs)?.observation_type();
        if expected != found {
            return Err(GeonetError::ObservationTypeMismatch { expected, found });
        }

        if let Some(previous) = self.observation(obs)?.core().group() {
            if previous != id {
                self.groups[previous.0].members.retain(|&o| o != obs);
            }
        }

        for (kind, parameter) in parameters {
            self.set_parameter(obs, kind, parameter)?;
        }
        self.observation_core_mut(obs)?.set_group(Some(id));
        let members = &mut self.groups[id.0].members;
        if !members.contains(&obs) {
            members.push(obs);
        }

        if self.observation(obs)?.core().std().is_none() {
            let std = self.group_uncertainty(id, obs)?;
            let core = self.observation_core_mut(obs)?;
            core.set_std(std);
            core.set_use_group_uncertainty(true);
        }
        Ok(())
    }

    /// Standard deviation of an observation from the uncertainty model of a group.
    pub fn group_uncertainty(&self, id: GroupId, obs: ObservationId) -> Result<f64, GeonetError> {
        let group = self.group(id)?;
        let observation = self.observation(obs)?;
        let core = observation.core();
        let kind = observation.observation_type();

        let mut distance = core.distance_for_uncertainty_model();
        if distance < EPS {
            distance = match kind {
                ObservationType::Direction => {
                    let both_3d = self.point_ref(core.start_point()).dimension() == 3
                        && self.point_ref(core.end_point()).dimension() == 3;
                    if both_3d {
                        core.calculated_apriori_distance_3d(self)
                    } else {
                        core.calculated_apriori_distance_2d(self)
                    }
                }
                ObservationType::ZenithAngle | ObservationType::SlopeDistance => {
                    core.calculated_apriori_distance_3d(self)
                }
                ObservationType::HorizontalDistance | ObservationType::Leveling => {
                    core.calculated_apriori_distance_2d(self)
                }
                _ => core.value_apriori().abs(),
            };
        }
        Ok(group.uncertainty.std(kind, distance))
    }

    fn line_key(&self, obs: ObservationId) -> Result<LineKey, GeonetError> {
        let observation = self.observation(obs)?;
        let core = observation.core();
        Ok((
            core.start_point(),
            core.end_point(),
            OrderedFloat(core.start_point_height()),
            OrderedFloat(core.end_point_height()),
            observation.as_gnss_baseline().map(|g| g.component()),
        ))
    }

    /// Merge repeated measurements of the same line inside a group.
    ///
    /// Members with identical endpoints, instrument and target heights (and GNSS component)
    /// are reduced to the first of them. Its a-priori value becomes the mean of all values
    /// within `threshold` of their median; the others are rejected, receive the gross error
    /// `value − median` and are returned. All merged members leave the group.
    ///
    /// Arguments
    /// -----------------
    /// * `id`: the group to average.
    /// * `threshold`: admissible deviation from the median, see [`default_average_threshold`].
    ///
    /// Return
    /// ----------
    /// * The observations rejected as outliers.
    pub fn average_group(
        &mut self,
        id: GroupId,
        threshold: f64,
    ) -> Result<Vec<ObservationId>, GeonetError> {
        let members = self.group(id)?.members.clone();
        let keyed = members
            .iter()
            .map(|&o| self.line_key(o).map(|k| (k, o)))
            .collect::<Result<Vec<_>, _>>()?;

        let order = keyed.iter().map(|&(k, _)| k).unique().collect_vec();
        let mut lines = keyed.into_iter().into_group_map();

        let mut kept = Vec::new();
        let mut excluded = Vec::new();
        for key in order {
            let line = lines.remove(&key).unwrap_or_default();
            let Some(&first) = line.first() else {
                continue;
            };
            kept.push(first);
            if line.len() > 1 {
                excluded.extend(self.average_line(&line, threshold)?);
                for &merged in &line[1..] {
                    self.observation_core_mut(merged)?.set_group(None);
                }
            }
        }

        if !excluded.is_empty() {
            warn!(
                "group {}: {} observation(s) rejected during averaging",
                id.0,
                excluded.len()
            );
        }
        let group = &mut self.groups[id.0];
        group.members = kept;
        group.excluded = excluded.clone();
        Ok(excluded)
    }

    fn average_line(
        &mut self,
        line: &[ObservationId],
        threshold: f64,
    ) -> Result<Vec<ObservationId>, GeonetError> {
        let first = line[0];
        let kind = self.observation(first)?.observation_type();

        let sorted = line
            .iter()
            .map(|&o| Ok((o, self.observation(o)?.core().value_apriori())))
            .collect::<Result<Vec<_>, GeonetError>>()?
            .into_iter()
            .sorted_by_key(|&(_, v)| OrderedFloat(v))
            .collect_vec();
        let (median_obs, median) = sorted[(sorted.len() - 1) / 2];

        // the kept observation carries the median
        if median_obs != first {
            let value = self.observation(first)?.core().value_apriori();
            self.observation_core_mut(median_obs)?.set_value_apriori(value);
            self.observation_core_mut(first)?.set_value_apriori(median);
        }

        let mut excluded = Vec::new();
        let (mut sum, mut dist, mut count) = (0.0, 0.0, 0usize);
        for &obs in line {
            let core = self.observation_core_mut(obs)?;
            let mut value = core.value_apriori();
            let diff = (value - median).abs();
            if kind == ObservationType::Direction && diff > (diff - DPI).abs() {
                value += if value > median { -DPI } else { DPI };
            }
            if (value - median).abs() <= threshold {
                sum += value;
                dist += core.distance_for_uncertainty_model();
                count += 1;
            } else {
                core.statistics.gross_error = value - median;
                excluded.push(obs);
            }
        }

        let (mut average, distance) = if count > 0 {
            (sum / count as f64, dist / count as f64)
        } else {
            (median, 0.0)
        };
        if kind.is_angular() {
            average = normalize_angle(average);
        }
        debug!(
            "averaged {} of {} measurements of observation {}",
            count,
            line.len(),
            self.observation(first)?.core().id()
        );

        let core = self.observation_core_mut(first)?;
        core.set_value_apriori(average);
        if distance > 0.0 {
            core.set_distance_for_uncertainty_model(distance);
        }
        Ok(excluded)
    }
}

#[cfg(test)]
mod groups_test {
    use super::*;
    use crate::constants::RHO_GRAD2RAD;
    use crate::point::Point;
    use approx::assert_abs_diff_eq;

    fn network() -> Network {
        let mut net = Network::new();
        net.add_point(Point::new("S", 0.0, 0.0, 0.0)).unwrap();
        net.add_point(Point::new("E", 300.0, 400.0, 0.0)).unwrap();
        net.add_point(Point::new("F", -300.0, 400.0, 0.0)).unwrap();
        net
    }

    #[test]
    fn test_uncertainty_model_validation() {
        assert!(matches!(
            UncertaintyModel::new(0.0, 1.0, 1.0),
            Err(GeonetError::InvalidUncertainty(_))
        ));
        let m = UncertaintyModel::new(0.001, -1.0, -2.0).unwrap();
        assert_eq!((m.b(), m.c()), (0.0, 0.0));
    }

    #[test]
    fn test_distance_dependent_terms() {
        let m = UncertaintyModel::new(0.003, 0.001, 0.000_002).unwrap();
        let expected = (0.003f64.powi(2) + (0.001 * 2.0f64.sqrt()).powi(2) + 0.004f64.powi(2)).sqrt();
        assert_abs_diff_eq!(m.std(ObservationType::HorizontalDistance, 2000.0), expected);

        let m = UncertaintyModel::new(0.0001, 0.01, 0.0005).unwrap();
        let expected = (1e-8 + 0.01f64.powi(2) / 500.0 + (0.0005f64 / 500.0).powi(2)).sqrt();
        assert_abs_diff_eq!(m.std(ObservationType::Direction, 500.0), expected, epsilon = 1e-15);
        assert_eq!(m.std(ObservationType::Direction, 0.0), 0.0001);
    }

    #[test]
    fn test_members_receive_group_uncertainty_and_parameters() {
        let mut net = network();
        let g = net.add_group(
            ObservationType::HorizontalDistance,
            UncertaintyModel::new(0.002, 0.0, 0.000_002).unwrap(),
        );
        let d1 = net.add_horizontal_distance(1, "S", "E", 0.0, 0.0, 500.0).unwrap();
        let d2 = net.add_horizontal_distance(2, "S", "F", 0.0, 0.0, 500.0).unwrap();
        net.observation_core_mut(d2).unwrap().set_std(0.01);

        net.add_to_group(g, d1).unwrap();
        net.add_to_group(g, d2).unwrap();

        let core = net.observation(d1).unwrap().core();
        assert!(core.use_group_uncertainty());
        assert_abs_diff_eq!(core.std().unwrap(), (0.002f64.powi(2) + 0.001f64.powi(2)).sqrt());
        assert_eq!(net.observation(d2).unwrap().core().std(), Some(0.01));

        let scale = net.group(g).unwrap().parameter(ParameterType::Scale).unwrap();
        for d in [d1, d2] {
            assert_eq!(net.observation(d).unwrap().parameter(ParameterType::Scale), Some(scale));
        }
        assert_eq!(net.parameter(scale).unwrap().owners(), &[d1, d2]);
    }

    #[test]
    fn test_type_mismatch() {
        let mut net = network();
        let g = net.add_group(ObservationType::Leveling, UncertaintyModel::default_for(ObservationType::Leveling));
        let d = net.add_horizontal_distance(1, "S", "E", 0.0, 0.0, 500.0).unwrap();
        assert_eq!(
            net.add_to_group(g, d),
            Err(GeonetError::ObservationTypeMismatch {
                expected: ObservationType::Leveling,
                found: ObservationType::HorizontalDistance,
            })
        );
    }

    #[test]
    fn test_average_distances_rejects_outlier() {
        let mut net = network();
        let g = net.add_group(
            ObservationType::HorizontalDistance,
            UncertaintyModel::default_for(ObservationType::HorizontalDistance),
        );
        let values = [500.003, 500.001, 500.002, 500.200, 499.999];
        let ids = values
            .iter()
            .enumerate()
            .map(|(i, &v)| net.add_horizontal_distance(i, "S", "E", 0.0, 0.0, v).unwrap())
            .collect_vec();
        let other = net.add_horizontal_distance(9, "S", "F", 0.0, 0.0, 500.0).unwrap();
        for &id in ids.iter().chain([&other]) {
            net.add_to_group(g, id).unwrap();
        }

        let excluded = net.average_group(g, 0.02).unwrap();
        assert_eq!(excluded, vec![ids[3]]);
        assert_abs_diff_eq!(
            net.observation(ids[3]).unwrap().core().statistics.gross_error,
            500.200 - 500.002,
            epsilon = 1e-12
        );
        assert_eq!(net.group(g).unwrap().members(), &[ids[0], other]);
        assert_abs_diff_eq!(
            net.observation(ids[0]).unwrap().core().value_apriori(),
            (500.003 + 500.001 + 500.002 + 499.999) / 4.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_average_directions_across_zero() {
        let mut net = network();
        let g = net.add_group(
            ObservationType::Direction,
            UncertaintyModel::default_for(ObservationType::Direction),
        );
        let eps = 0.0001 * RHO_GRAD2RAD;
        let values = [DPI - eps, eps, 3.0 * eps];
        let ids = values
            .iter()
            .map(|&v| net.add_direction(1, "S", "E", 0.0, 0.0, v).unwrap())
            .collect_vec();
        for &id in &ids {
            net.add_to_group(g, id).unwrap();
        }

        let excluded = net.average_group(g, default_average_threshold(ObservationType::Direction)).unwrap();
        assert!(excluded.is_empty());
        assert_abs_diff_eq!(
            net.observation(ids[0]).unwrap().core().value_apriori(),
            eps,
            epsilon = 1e-12
        );
    }
}
