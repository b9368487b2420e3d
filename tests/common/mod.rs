#![allow(dead_code)]

use std::f64::consts::PI;

use geonet::constants::DPI;
use geonet::jacobian::Unknown;
use geonet::network::Network;
use geonet::observations::{ObservationId, ObservationModel};
use geonet::parameters::ParameterType;
use geonet::point::Point;
use rand::rngs::StdRng;
use rand::Rng;

/// Network with a station `S` and a target `E` at a random, non-degenerate position.
///
/// The horizontal distance is at least 50 m, the height difference at most 60 m and both
/// points carry small random deflections.
pub fn random_pair(rng: &mut StdRng) -> Network {
    let mut net = Network::new();
    let sx = rng.random_range(-1000.0..1000.0);
    let sy = rng.random_range(-1000.0..1000.0);
    let sz = rng.random_range(0.0..200.0);
    let azimuth = rng.random_range(0.0..DPI);
    let distance = rng.random_range(50.0..2000.0);
    let dz = rng.random_range(-60.0..60.0);

    let mut s = Point::new("S", sx, sy, sz);
    let mut e = Point::new(
        "E",
        sx + distance * azimuth.cos(),
        sy + distance * azimuth.sin(),
        sz + dz,
    );
    for p in [&mut s, &mut e] {
        p.set_deflection(
            rng.random_range(-1e-4..1e-4),
            rng.random_range(-1e-4..1e-4),
        );
    }
    net.add_point(s).unwrap();
    net.add_point(e).unwrap();
    net
}

/// Draw a plausible value for every parameter of the network.
pub fn randomize_parameters(net: &mut Network, rng: &mut StdRng) {
    for i in 0..net.parameters().len() {
        let id = geonet::parameters::ParameterId(i);
        let kind = net.parameter(id).unwrap().kind();
        let value = match kind {
            ParameterType::Orientation => rng.random_range(0.0..DPI),
            ParameterType::Scale => 1.0 + rng.random_range(-1e-4..1e-4),
            ParameterType::ZeroPointOffset => rng.random_range(-0.01..0.01),
            ParameterType::RefractionCoefficient => rng.random_range(0.0..0.2),
            ParameterType::RotationX | ParameterType::RotationY | ParameterType::RotationZ => {
                rng.random_range(-1e-4..1e-4)
            }
        };
        net.parameter_mut(id).unwrap().set_value(value);
    }
}

pub fn unknown_value(net: &Network, unknown: Unknown) -> f64 {
    match unknown {
        Unknown::Coordinate { point, axis } => {
            let p = net.point(point).unwrap();
            match axis {
                geonet::point::Axis::X => p.x(),
                geonet::point::Axis::Y => p.y(),
                geonet::point::Axis::Z => p.z(),
            }
        }
        Unknown::DeflectionX(point) => net.point(point).unwrap().deflection_x().value(),
        Unknown::DeflectionY(point) => net.point(point).unwrap().deflection_y().value(),
        Unknown::Parameter(id) => net.parameter(id).unwrap().value(),
    }
}

pub fn set_unknown(net: &mut Network, unknown: Unknown, value: f64) {
    match unknown {
        Unknown::Coordinate { point, axis } => {
            net.point_mut(point).unwrap().set_coordinate(axis, value)
        }
        Unknown::DeflectionX(point) => {
            net.point_mut(point).unwrap().deflection_x_mut().set_value(value)
        }
        Unknown::DeflectionY(point) => {
            net.point_mut(point).unwrap().deflection_y_mut().set_value(value)
        }
        Unknown::Parameter(id) => net.parameter_mut(id).unwrap().set_value(value),
    }
}

/// Step of the central difference for an unknown.
pub fn step(unknown: Unknown) -> f64 {
    match unknown {
        Unknown::Coordinate { .. } => 1e-4,
        Unknown::DeflectionX(_) | Unknown::DeflectionY(_) => 1e-6,
        Unknown::Parameter(_) => 1e-5,
    }
}

/// Difference of two model values, taken the short way round for angles.
fn value_difference(net: &Network, obs: ObservationId, plus: f64, minus: f64) -> f64 {
    let d = plus - minus;
    if net.observation(obs).unwrap().observation_type().is_angular() {
        (d + PI).rem_euclid(DPI) - PI
    } else {
        d
    }
}

/// Central finite difference of the a-posteriori value with respect to one unknown.
pub fn numeric_partial(net: &mut Network, obs: ObservationId, unknown: Unknown) -> f64 {
    let x0 = unknown_value(net, unknown);
    let h = step(unknown);

    set_unknown(net, unknown, x0 + h);
    let plus = net.observation(obs).unwrap().value_aposteriori(net);
    set_unknown(net, unknown, x0 - h);
    let minus = net.observation(obs).unwrap().value_aposteriori(net);
    set_unknown(net, unknown, x0);

    value_difference(net, obs, plus, minus) / (2.0 * h)
}

/// Compare every analytic partial of an observation with its finite-difference estimate.
pub fn assert_partials_consistent(net: &mut Network, obs: ObservationId) {
    let description = net.describe(obs).unwrap();
    for (unknown, analytic) in net.partials(obs).unwrap() {
        let numeric = numeric_partial(net, obs, unknown);
        let tolerance = 1e-6 * analytic.abs().max(1.0);
        assert!(
            (analytic - numeric).abs() <= tolerance,
            "{description}: d/d{unknown:?} analytic {analytic:e} numeric {numeric:e}"
        );
    }
}
