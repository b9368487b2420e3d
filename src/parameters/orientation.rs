//! # Orientation of direction sets
//!
//! Approximate values for the orientation unknown of a set of horizontal directions, and the
//! detection of directions recorded in the second telescope face.
//!
//! ## Overview
//!
//! For every direction of the set, the difference between the predicted azimuth and the
//! measured direction is a sample of the orientation. Samples close to the 2π seam are
//! unwrapped against their predecessor, then a robust mean is formed:
//!
//! 1. the plain mean is accepted if it lies within the threshold of the median,
//! 2. otherwise the mean of the samples within the threshold of the median is used,
//! 3. the median itself when no sample qualifies.
//!
//! The threshold is the larger of the default direction averaging threshold and 100 times
//! the largest a-priori standard deviation of the set.

use std::f64::consts::PI;

use itertools::Itertools;
use log::debug;
use ordered_float::OrderedFloat;

use crate::constants::{
    normalize_angle, Radian, ANGLE_ZERO_POINT_OFFSET, AVERAGE_THRESHOLD_FACTOR, DPI,
};
use crate::geonet_errors::GeonetError;
use crate::network::Network;
use crate::observations::{Direction, Observation, ObservationId, ObservationModel};
use crate::parameters::{ParameterId, ParameterType};

/// Samples closer than this to the 2π seam are unwrapped.
const SEAM_DISTANCE: Radian = 0.5;

/// Robust mean of orientation samples.
///
/// Arguments
/// -----------------
/// * `samples`: unwrapped orientation samples, in the order of the directions.
/// * `threshold`: admissible deviation from the median.
///
/// Return
/// ----------
/// * The robust mean, or `0.0` for an empty set.
pub fn robust_orientation(samples: &[Radian], threshold: f64) -> Radian {
    if samples.is_empty() {
        return 0.0;
    }

    let sorted = samples
        .iter()
        .map(|&o| OrderedFloat(o))
        .sorted()
        .map(|o| o.0)
        .collect_vec();
    let median = sorted[(sorted.len() - 1) / 2];
    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;

    if (mean - median).abs() < threshold {
        return mean;
    }

    let (sum, count) = sorted
        .iter()
        .filter(|&&o| (o - median).abs() < threshold)
        .fold((0.0, 0usize), |(s, n), &o| (s + o, n + 1));

    debug!(
        "orientation: {} of {} samples outside ±{threshold} around the median",
        sorted.len() - count,
        sorted.len()
    );

    if count > 0 {
        sum / count as f64
    } else {
        median
    }
}

/// Orientation samples `apost − apriori`, unwrapped against the previous sample.
fn orientation_samples<'a>(
    network: &Network,
    directions: impl Iterator<Item = &'a Direction>,
) -> Vec<Radian> {
    let mut samples: Vec<Radian> = Vec::new();
    for direction in directions {
        let mut o = normalize_angle(
            direction.value_aposteriori(network) - direction.reduced_value_apriori(network),
        );
        if let Some(&previous) = samples.last() {
            if DPI - (previous - o).abs() < SEAM_DISTANCE {
                if o < previous {
                    o += DPI;
                } else {
                    o -= DPI;
                }
            }
        }
        samples.push(o);
    }
    samples
}

impl Network {
    fn orientation_directions(&self, id: ParameterId) -> Result<Vec<ObservationId>, GeonetError> {
        let parameter = self.parameter(id)?;
        if parameter.kind() != ParameterType::Orientation {
            return Err(GeonetError::ParameterKindMismatch {
                expected: ParameterType::Orientation,
                found: parameter.kind(),
            });
        }
        Ok(parameter
            .owners()
            .iter()
            .copied()
            .filter(|&o| matches!(self.observation(o), Ok(obs) if obs.as_direction().is_some()))
            .collect())
    }

    /// Robust approximation of the orientation increment of a direction set.
    ///
    /// The value is the correction to add to the current orientation so that the predicted
    /// directions match the measured ones.
    ///
    /// Return
    /// ----------
    /// * `Err(GeonetError::ParameterKindMismatch)` if `id` is not an orientation.
    pub fn approximate_orientation(&self, id: ParameterId) -> Result<Radian, GeonetError> {
        let ids = self.orientation_directions(id)?;
        let directions = ids
            .iter()
            .filter_map(|&o| self.observations[o.0].as_direction())
            .collect_vec();

        let max_std = directions
            .iter()
            .filter_map(|d| d.core().std_apriori())
            .fold(f64::MIN_POSITIVE, f64::max);
        let threshold = (ANGLE_ZERO_POINT_OFFSET * AVERAGE_THRESHOLD_FACTOR).max(100.0 * max_std);

        let samples = orientation_samples(self, directions.into_iter());
        Ok(robust_orientation(&samples, threshold))
    }

    /// Detect second-face directions of a set and refresh the orientation value.
    ///
    /// Each direction whose measured value shifted by π fits the model better than the
    /// value itself is flipped by π and its face toggled. Afterwards, if the orientation is
    /// enabled and may be approximated, the robust approximation is added to its value.
    pub fn check_orientation_face(&mut self, id: ParameterId) -> Result<(), GeonetError> {
        let ids = self.orientation_directions(id)?;
        let parameter = self.parameter(id)?;
        let estimate = parameter.is_enabled() && parameter.estimate_approximation();

        let delta = if estimate {
            self.approximate_orientation(id)?
        } else {
            0.0
        };

        let wrapped = |a: f64, b: f64| {
            let d = (a - b).abs();
            d.min((d - DPI).abs())
        };

        for obs in ids {
            let Some(direction) = self.observations[obs.0].as_direction() else {
                continue;
            };
            let apriori = direction.core().value_apriori();
            let calculated = direction.value_aposteriori(self);
            let face_one = normalize_angle(delta + direction.reduced_value_apriori(self));
            let face_two = normalize_angle(face_one + PI);

            if wrapped(calculated, face_one) > wrapped(calculated, face_two) {
                let face = direction.face().flipped();
                debug!("direction {} flipped to face {face}", direction.core().id());
                if let Observation::Direction(d) = &mut self.observations[obs.0] {
                    d.core.set_value_apriori(normalize_angle(apriori + PI));
                    d.set_face(face);
                }
            }
        }

        if estimate {
            let delta = self.approximate_orientation(id)?;
            let parameter = self.parameter_mut(id)?;
            let value = parameter.value();
            parameter.set_value(normalize_angle(value + delta));
        }
        Ok(())
    }
}

#[cfg(test)]
mod orientation_test {
    use super::*;
    use crate::observations::FaceType;
    use crate::point::Point;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_robust_orientation_drops_outlier() {
        let samples = [0.100, 0.1001, 0.0999, 0.1002, 2.0];
        let o = robust_orientation(&samples, 0.01);
        assert_abs_diff_eq!(o, (0.100 + 0.1001 + 0.0999 + 0.1002) / 4.0, epsilon = 1e-12);

        let o = robust_orientation(&[0.1, 0.1002], 0.01);
        assert_abs_diff_eq!(o, 0.1001, epsilon = 1e-12);
        assert_eq!(robust_orientation(&[], 0.01), 0.0);
    }

    fn station() -> Network {
        let mut net = Network::new();
        net.add_point(Point::new("S", 0.0, 0.0, 0.0)).unwrap();
        net.add_point(Point::new("A", 100.0, 0.0, 0.0)).unwrap();
        net.add_point(Point::new("B", 0.0, 100.0, 0.0)).unwrap();
        net.add_point(Point::new("C", -100.0, 0.0, 0.0)).unwrap();
        net
    }

    #[test]
    fn test_orientation_of_a_set() {
        let mut net = station();
        // circle reading zero points 0.3 rad left of the x axis
        let a = net.add_direction(1, "S", "A", 0.0, 0.0, DPI - 0.3).unwrap();
        let ori = net.observation(a).unwrap().parameter(ParameterType::Orientation).unwrap();
        net.add_direction_with_orientation(2, "S", "B", 0.0, 0.0, FRAC_PI_2 - 0.3, ori)
            .unwrap();
        net.add_direction_with_orientation(3, "S", "C", 0.0, 0.0, PI - 0.3, ori)
            .unwrap();

        let delta = net.approximate_orientation(ori).unwrap();
        assert_abs_diff_eq!(normalize_angle(delta), 0.3, epsilon = 1e-12);

        net.check_orientation_face(ori).unwrap();
        assert_abs_diff_eq!(net.parameter(ori).unwrap().value(), 0.3, epsilon = 1e-12);
        for id in net.parameter(ori).unwrap().owners().to_vec() {
            assert_abs_diff_eq!(net.observation(id).unwrap().correction(&net), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_second_face_direction_is_flipped() {
        let mut net = station();
        let a = net.add_direction(1, "S", "A", 0.0, 0.0, 0.0).unwrap();
        let ori = net.observation(a).unwrap().parameter(ParameterType::Orientation).unwrap();
        let b = net
            .add_direction_with_orientation(2, "S", "B", 0.0, 0.0, FRAC_PI_2, ori)
            .unwrap();
        let c = net
            .add_direction_with_orientation(3, "S", "C", 0.0, 0.0, 0.0, ori)
            .unwrap();

        net.check_orientation_face(ori).unwrap();
        let direction = net.observation(c).unwrap().as_direction().unwrap();
        assert_eq!(direction.face(), FaceType::Two);
        assert_abs_diff_eq!(direction.core().value_apriori(), PI, epsilon = 1e-15);
        assert_eq!(
            net.observation(b).unwrap().as_direction().unwrap().face(),
            FaceType::One
        );
        assert_abs_diff_eq!(net.parameter(ori).unwrap().value(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_wrong_parameter_kind() {
        let mut net = station();
        let d = net.add_horizontal_distance(1, "S", "A", 0.0, 0.0, 100.0).unwrap();
        let scale = net.observation(d).unwrap().parameter(ParameterType::Scale).unwrap();
        assert_eq!(
            net.approximate_orientation(scale),
            Err(GeonetError::ParameterKindMismatch {
                expected: ParameterType::Orientation,
                found: ParameterType::Scale,
            })
        );
    }
}
