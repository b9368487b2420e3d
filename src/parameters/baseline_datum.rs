//! # Datum of GNSS baselines
//!
//! Approximate values for the scale and rotation unknowns shared by a set of GNSS baselines.
//!
//! The network difference `d` of every baseline (endpoint heights included) is compared with
//! the observed vector `t`, and the datum `(m, R)` of the model `t ≈ m·R·d` is found by least
//! squares:
//!
//! | dimension | unknowns     | solution                                                    |
//! |-----------|--------------|-------------------------------------------------------------|
//! | 1         | m, rx, ry    | `x = pinv(D)·tz` with `x = m·(sy, −sx·cy, cx·cy)`            |
//! | 2         | m, rz        | `(a, o) = pinv(A)·t` with `a = m·cz`, `o = m·sz`             |
//! | 3         | m, rx, ry, rz | `R = V·diag(1, 1, ±1)·Uᵀ` from the SVD of `Σ d·tᵀ = U·Σ·Vᵀ` |
//!
//! Only complete baselines (every component of the dimension observed) take part. Without
//! usable geometry the datum falls back to the expectation values (scale 1, no rotation).

use itertools::Itertools;
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, Matrix3, Vector2, Vector3};

use crate::constants::{Radian, ZERO};
use crate::geonet_errors::GeonetError;
use crate::network::Network;
use crate::observations::gnss_baseline::parameter_kinds_for;
use crate::observations::{BaselineId, ComponentType, ObservationId, ObservationModel};
use crate::parameters::ParameterType;

/// Approximate scale and rotations of a baseline datum.
///
/// Rotations a baseline of the given dimension does not carry are `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineDatum {
    pub scale: f64,
    pub rotation_x: Option<Radian>,
    pub rotation_y: Option<Radian>,
    pub rotation_z: Option<Radian>,
}

impl BaselineDatum {
    fn identity(dimension: u8) -> Self {
        let kinds = parameter_kinds_for(dimension);
        let zero_if = |kind| kinds.contains(&kind).then_some(0.0);
        BaselineDatum {
            scale: 1.0,
            rotation_x: zero_if(ParameterType::RotationX),
            rotation_y: zero_if(ParameterType::RotationY),
            rotation_z: zero_if(ParameterType::RotationZ),
        }
    }

    /// Value of the datum for one parameter kind.
    pub fn value(&self, kind: ParameterType) -> Option<f64> {
        match kind {
            ParameterType::Scale => Some(self.scale),
            ParameterType::RotationX => self.rotation_x,
            ParameterType::RotationY => self.rotation_y,
            ParameterType::RotationZ => self.rotation_z,
            _ => None,
        }
    }
}

/// Scale of a least-squares fit, 1 when it is degenerate.
fn checked_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > ZERO {
        scale
    } else {
        1.0
    }
}

/// Least-squares solution `pinv(a)·b`, `None` when the SVD does not converge.
fn solve(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    match a.pseudo_inverse(ZERO) {
        Ok(pinv) => Some(pinv * b),
        Err(e) => {
            warn!("baseline datum: pseudo-inverse failed ({e})");
            None
        }
    }
}

/// Scale and rotations about x and y from height components only.
///
/// Arguments
/// -----------------
/// * `pairs`: network difference and observed height difference of each baseline.
pub fn datum_1d(pairs: &[(Vector3<f64>, f64)]) -> BaselineDatum {
    let fallback = BaselineDatum::identity(1);
    if pairs.is_empty() {
        return fallback;
    }
    let a = DMatrix::from_fn(pairs.len(), 3, |i, j| pairs[i].0[j]);
    let b = DVector::from_iterator(pairs.len(), pairs.iter().map(|(_, tz)| *tz));
    let Some(x) = solve(a, &b) else {
        return fallback;
    };

    let m = x.norm();
    if m <= ZERO {
        return fallback;
    }
    BaselineDatum {
        scale: checked_scale(m),
        rotation_x: Some((-x[1]).atan2(x[2])),
        rotation_y: Some(x[0].atan2(x[1].hypot(x[2]))),
        rotation_z: None,
    }
}

/// Scale and rotation about z from planimetric components.
pub fn datum_2d(pairs: &[(Vector2<f64>, Vector2<f64>)]) -> BaselineDatum {
    let fallback = BaselineDatum::identity(2);
    if pairs.is_empty() {
        return fallback;
    }
    let n = pairs.len();
    let mut a = DMatrix::zeros(2 * n, 2);
    let mut b = DVector::zeros(2 * n);
    for (i, (d, t)) in pairs.iter().enumerate() {
        a[(2 * i, 0)] = d.x;
        a[(2 * i, 1)] = d.y;
        a[(2 * i + 1, 0)] = d.y;
        a[(2 * i + 1, 1)] = -d.x;
        b[2 * i] = t.x;
        b[2 * i + 1] = t.y;
    }
    let Some(x) = solve(a, &b) else {
        return fallback;
    };

    let m = x[0].hypot(x[1]);
    if m <= ZERO {
        return fallback;
    }
    BaselineDatum {
        scale: checked_scale(m),
        rotation_x: None,
        rotation_y: None,
        rotation_z: Some(x[1].atan2(x[0])),
    }
}

/// Scale and the three rotations from complete spatial baselines.
pub fn datum_3d(pairs: &[(Vector3<f64>, Vector3<f64>)]) -> BaselineDatum {
    let fallback = BaselineDatum::identity(3);
    let norm2: f64 = pairs.iter().map(|(d, _)| d.norm_squared()).sum();
    if norm2 <= ZERO {
        return fallback;
    }

    let k: Matrix3<f64> = pairs.iter().map(|(d, t)| d * t.transpose()).sum();
    let svd = k.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        warn!("baseline datum: SVD did not return its factors");
        return fallback;
    };
    let v = v_t.transpose();
    let reflection = if (v * u.transpose()).determinant() < 0.0 {
        -1.0
    } else {
        1.0
    };
    let r = v * Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, reflection)) * u.transpose();

    let fit: f64 = pairs.iter().map(|(d, t)| t.dot(&(r * d))).sum();
    BaselineDatum {
        scale: checked_scale((fit / norm2).abs()),
        rotation_x: Some((-r[(2, 1)]).atan2(r[(2, 2)])),
        rotation_y: Some(r[(2, 0)].clamp(-1.0, 1.0).asin()),
        rotation_z: Some((-r[(1, 0)]).atan2(r[(0, 0)])),
    }
}

impl Network {
    /// Baselines of the dimension of `obs` that share its scale parameter.
    fn datum_baselines(&self, obs: ObservationId) -> Result<(u8, Vec<BaselineId>), GeonetError> {
        let group = self.baseline_of(obs)?;
        let (dimension, scale) = (group.dimension(), group.parameter(ParameterType::Scale));
        let baselines = self
            .baselines
            .iter()
            .filter(|b| !b.is_empty())
            .filter(|b| b.dimension() == dimension && b.parameter(ParameterType::Scale) == scale)
            .map(|b| b.id())
            .collect_vec();
        Ok((dimension, baselines))
    }

    /// Network difference, antenna heights included, and observed vector of a baseline.
    ///
    /// Return
    /// ----------
    /// * `None` unless every component of the dimension is observed.
    fn baseline_pair(&self, id: BaselineId, dimension: u8) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let group = &self.baselines[id.0];
        let mut observed = Vector3::zeros();
        let mut heights = None;
        for component in [ComponentType::X, ComponentType::Y, ComponentType::Z] {
            if !component.is_valid_for(dimension) {
                continue;
            }
            let core = self.observations[group.component(component)?.0].core();
            observed[component.index()] = core.value_apriori();
            heights = Some(core.end_point_height() - core.start_point_height());
        }
        let start = self.point_ref(group.start_point());
        let end = self.point_ref(group.end_point());
        let mut d = end.coordinates() - start.coordinates();
        d.z += heights?;
        Some((d, observed))
    }

    /// Least-squares approximation of the datum shared by the baselines of `obs`.
    ///
    /// Every baseline of the same dimension whose scale parameter is the scale of `obs`
    /// contributes, as long as all of its components are observed.
    ///
    /// Return
    /// ----------
    /// * `Err(GeonetError::NotABaselineComponent)` if `obs` is not a GNSS component.
    ///
    /// See also
    /// ------------
    /// * [`Network::approximate_orientation`] – The same idea for direction sets.
    pub fn approximate_baseline_datum(&self, obs: ObservationId) -> Result<BaselineDatum, GeonetError> {
        let (dimension, baselines) = self.datum_baselines(obs)?;
        let pairs = baselines
            .iter()
            .filter_map(|&id| self.baseline_pair(id, dimension))
            .collect_vec();
        debug!(
            "baseline datum: {} of {} baseline(s) complete",
            pairs.len(),
            baselines.len()
        );

        Ok(match dimension {
            1 => datum_1d(&pairs.iter().map(|(d, t)| (*d, t.z)).collect_vec()),
            2 => datum_2d(&pairs.iter().map(|(d, t)| (d.xy(), t.xy())).collect_vec()),
            _ => datum_3d(&pairs),
        })
    }

    /// Write the approximated datum into the shared scale and rotation parameters of `obs`.
    ///
    /// Disabled parameters are held fixed and keep their value.
    pub fn set_approximated_baseline_datum(
        &mut self,
        obs: ObservationId,
    ) -> Result<BaselineDatum, GeonetError> {
        let datum = self.approximate_baseline_datum(obs)?;
        let group = self.baseline_of(obs)?;
        let targets = parameter_kinds_for(group.dimension())
            .iter()
            .filter_map(|&kind| Some((group.parameter(kind)?, datum.value(kind)?)))
            .collect_vec();
        for (id, value) in targets {
            let parameter = self.parameter_mut(id)?;
            if parameter.is_enabled() {
                parameter.set_value(value);
            }
        }
        Ok(datum)
    }
}

#[cfg(test)]
mod baseline_datum_test {
    use super::*;
    use crate::point::Point;
    use approx::assert_abs_diff_eq;

    fn network() -> Network {
        let mut net = Network::new();
        for (name, x, y, z) in [
            ("S", 0.0, 0.0, 0.0),
            ("A", 1200.0, 300.0, 40.0),
            ("B", -400.0, 900.0, -25.0),
            ("C", 250.0, -700.0, 310.0),
            ("D", 800.0, 650.0, -120.0),
        ] {
            net.add_point(Point::new(name, x, y, z)).unwrap();
        }
        net
    }

    /// Replace every a-priori value by the model prediction under the current datum.
    fn observe_exactly(net: &mut Network, ids: &[ObservationId]) {
        for &id in ids {
            let value = net.observation(id).unwrap().value_aposteriori(net);
            net.observation_core_mut(id).unwrap().set_value_apriori(value);
        }
    }

    fn set_datum(net: &mut Network, obs: ObservationId, datum: &BaselineDatum) {
        for kind in [
            ParameterType::Scale,
            ParameterType::RotationX,
            ParameterType::RotationY,
            ParameterType::RotationZ,
        ] {
            if let (Some(id), Some(v)) = (
                net.observation(obs).unwrap().parameter(kind),
                datum.value(kind),
            ) {
                net.parameter_mut(id).unwrap().set_value(v);
            }
        }
    }

    /// Add one baseline from `S` to every other point, all sharing the datum of the first.
    fn shared_baselines(net: &mut Network, dimension: u8) -> Vec<ObservationId> {
        let mut ids: Vec<ObservationId> = Vec::new();
        for (i, end) in ["A", "B", "C", "D"].into_iter().enumerate() {
            let new = match dimension {
                1 => vec![net.add_gnss_baseline_1d(i, "S", end, 1.5, 1.2, 0.0).unwrap()],
                2 => net
                    .add_gnss_baseline_2d(i, "S", end, 0.0, 0.0, 0.0, 0.0)
                    .unwrap()
                    .to_vec(),
                _ => net
                    .add_gnss_baseline_3d(i, "S", end, 1.5, 1.2, 0.0, 0.0, 0.0)
                    .unwrap()
                    .to_vec(),
            };
            if let Some(&first) = ids.first() {
                for &kind in parameter_kinds_for(dimension) {
                    let shared = net.observation(first).unwrap().parameter(kind).unwrap();
                    net.set_parameter(new[0], kind, shared).unwrap();
                }
            }
            ids.extend(new);
        }
        ids
    }

    fn recover(dimension: u8, truth: BaselineDatum) {
        let mut net = network();
        let ids = shared_baselines(&mut net, dimension);
        set_datum(&mut net, ids[0], &truth);
        observe_exactly(&mut net, &ids);
        set_datum(&mut net, ids[0], &BaselineDatum::identity(dimension));

        let datum = net.set_approximated_baseline_datum(ids[0]).unwrap();
        assert_abs_diff_eq!(datum.scale, truth.scale, epsilon = 1e-10);
        for kind in [
            ParameterType::RotationX,
            ParameterType::RotationY,
            ParameterType::RotationZ,
        ] {
            match (datum.value(kind), truth.value(kind)) {
                (Some(a), Some(b)) => assert_abs_diff_eq!(a, b, epsilon = 1e-10),
                (a, b) => assert_eq!(a, b),
            }
        }
        for &id in &ids {
            let obs = net.observation(id).unwrap();
            assert_abs_diff_eq!(obs.correction(&net), 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_recovers_rotated_and_scaled_3d_baselines() {
        recover(
            3,
            BaselineDatum {
                scale: 1.000_05,
                rotation_x: Some(0.01),
                rotation_y: Some(-0.02),
                rotation_z: Some(0.03),
            },
        );
    }

    #[test]
    fn test_recovers_rotated_and_scaled_2d_baselines() {
        recover(
            2,
            BaselineDatum {
                scale: 0.999_9,
                rotation_x: None,
                rotation_y: None,
                rotation_z: Some(-0.004),
            },
        );
    }

    #[test]
    fn test_recovers_tilted_height_baselines() {
        recover(
            1,
            BaselineDatum {
                scale: 1.000_2,
                rotation_x: Some(3e-4),
                rotation_y: Some(-5e-4),
                rotation_z: None,
            },
        );
    }

    #[test]
    fn test_degenerate_geometry_falls_back_to_identity() {
        let mut net = Network::new();
        net.add_point(Point::new("S", 10.0, 10.0, 10.0)).unwrap();
        net.add_point(Point::new("E", 10.0, 10.0, 10.0)).unwrap();
        let ids = net
            .add_gnss_baseline_3d(1, "S", "E", 0.0, 0.0, 5.0, 5.0, 5.0)
            .unwrap();
        assert_eq!(
            net.approximate_baseline_datum(ids[0]),
            Ok(BaselineDatum::identity(3))
        );

        let lone = net
            .add_gnss_baseline_component(2, "S", "E", 0.0, 0.0, 5.0, ComponentType::X, 3)
            .unwrap();
        assert_eq!(
            net.approximate_baseline_datum(lone),
            Ok(BaselineDatum::identity(3))
        );
    }

    #[test]
    fn test_disabled_parameters_are_kept() {
        let mut net = network();
        let ids = shared_baselines(&mut net, 2);
        let truth = BaselineDatum {
            scale: 1.001,
            rotation_x: None,
            rotation_y: None,
            rotation_z: Some(0.002),
        };
        set_datum(&mut net, ids[0], &truth);
        observe_exactly(&mut net, &ids);
        set_datum(&mut net, ids[0], &BaselineDatum::identity(2));

        let rz = net
            .observation(ids[0])
            .unwrap()
            .parameter(ParameterType::RotationZ)
            .unwrap();
        net.parameter_mut(rz).unwrap().set_enabled(false);
        net.set_approximated_baseline_datum(ids[0]).unwrap();

        assert_eq!(net.parameter(rz).unwrap().value(), 0.0);
        let scale = net
            .observation(ids[0])
            .unwrap()
            .parameter(ParameterType::Scale)
            .unwrap();
        assert_abs_diff_eq!(net.parameter(scale).unwrap().value(), 1.001, epsilon = 1e-10);
    }

    #[test]
    fn test_requires_a_baseline_component() {
        let mut net = network();
        let d = net.add_delta_z(1, "S", "A", 0.0, 0.0, 40.0).unwrap();
        assert_eq!(
            net.approximate_baseline_datum(d),
            Err(GeonetError::NotABaselineComponent(d.0))
        );
    }
}
