//! # Additional unknown parameters
//!
//! Scalar nuisance unknowns of the observation equations: the orientation of a direction set,
//! the scale and zero-point offset of a distance meter, the refraction coefficient of zenith
//! angles and the rotation angles of a GNSS baseline datum.
//!
//! Parameters live in the [`Network`](crate::network::Network) arena and are addressed by a
//! [`ParameterId`]. One parameter may be shared by many observations (all directions of one
//! set, all components of one baseline); every parameter therefore keeps the list of its
//! owning observations, re-linked by the network setters.
//!
//! ## See also
//! ------------
//! * [`orientation`] – Robust approximation of direction-set orientations.
//! * [`baseline_datum`] – Least-squares scale and rotations of GNSS baselines.

pub mod baseline_datum;
pub mod orientation;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::ZERO;
use crate::observations::ObservationId;

/// Stable handle of an [`AdditionalUnknownParameter`] inside a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParameterId(pub usize);

/// Kind of an additional unknown parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    Orientation,
    Scale,
    ZeroPointOffset,
    RefractionCoefficient,
    RotationX,
    RotationY,
    RotationZ,
}

impl ParameterType {
    /// Value the parameter takes when the instrument is free of this systematic effect.
    pub fn expectation_value(self) -> f64 {
        match self {
            ParameterType::Scale => 1.0,
            _ => 0.0,
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterType::Orientation => "orientation",
            ParameterType::Scale => "scale",
            ParameterType::ZeroPointOffset => "zero-point offset",
            ParameterType::RefractionCoefficient => "refraction coefficient",
            ParameterType::RotationX => "rotation x",
            ParameterType::RotationY => "rotation y",
            ParameterType::RotationZ => "rotation z",
        };
        write!(f, "{s}")
    }
}

/// Post-adjustment test quantities of a parameter, filled by the driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterStatistics {
    t_prio: f64,
    t_post: f64,
    pub p_prio: f64,
    pub p_post: f64,
    pub gross_error: f64,
    pub minimal_detectable_bias: f64,
    pub significant: bool,
}

impl ParameterStatistics {
    pub fn t_prio(&self) -> f64 {
        if self.t_prio < ZERO {
            0.0
        } else {
            self.t_prio
        }
    }

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
}

/// A scalar unknown shared by one or more observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalUnknownParameter {
    kind: ParameterType,
    value: f64,
    value0: f64,
    column: Option<usize>,
    enabled: bool,
    estimate_approximation: bool,
    std: Option<f64>,
    pub statistics: ParameterStatistics,
    owners: Vec<ObservationId>,
}

impl AdditionalUnknownParameter {
    /// Create a parameter at its expectation value (1 for scale, 0 otherwise).
    pub fn new(kind: ParameterType) -> Self {
        AdditionalUnknownParameter::with_value(kind, kind.expectation_value())
    }

    pub fn with_value(kind: ParameterType, value: f64) -> Self {
        AdditionalUnknownParameter {
            kind,
            value,
            value0: value,
            column: None,
            enabled: true,
            estimate_approximation: kind == ParameterType::Orientation,
            std: None,
            statistics: ParameterStatistics::default(),
            owners: Vec::new(),
        }
    }

    pub fn kind(&self) -> ParameterType {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn value0(&self) -> f64 {
        self.value0
    }

    /// Overwrite the current value; the approximate value is kept.
    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn set_value0(&mut self, value0: f64) {
        self.value0 = value0;
    }

    pub fn expectation_value(&self) -> f64 {
        self.kind.expectation_value()
    }

    /// Column in the design matrix, `None` when the parameter is held fixed.
    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn set_column(&mut self, column: Option<usize>) {
        self.column = column;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Whether the orientation approximation may overwrite the value.
    pub fn estimate_approximation(&self) -> bool {
        self.estimate_approximation
    }

    pub fn set_estimate_approximation(&mut self, estimate: bool) {
        self.estimate_approximation = estimate;
    }

    pub fn std(&self) -> Option<f64> {
        self.std
    }

    pub fn set_std(&mut self, std: f64) {
        if std > 0.0 {
            self.std = Some(std);
        }
    }

    /// Observations whose model contains this parameter.
    pub fn owners(&self) -> &[ObservationId] {
        &self.owners
    }

    pub(crate) fn add_owner(&mut self, id: ObservationId) {
        if !self.owners.contains(&id) {
            self.owners.push(id);
        }
    }

    pub(crate) fn remove_owner(&mut self, id: ObservationId) {
        self.owners.retain(|o| *o != id);
    }
}

#[cfg(test)]
mod parameters_test {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(AdditionalUnknownParameter::new(ParameterType::Scale).value(), 1.0);
        assert_eq!(
            AdditionalUnknownParameter::new(ParameterType::ZeroPointOffset).value(),
            0.0
        );
        let ori = AdditionalUnknownParameter::new(ParameterType::Orientation);
        assert!(ori.estimate_approximation());
        assert!(!AdditionalUnknownParameter::new(ParameterType::RotationZ).estimate_approximation());
    }

    #[test]
    fn test_owner_links() {
        let mut p = AdditionalUnknownParameter::new(ParameterType::Scale);
        p.add_owner(ObservationId(1));
        p.add_owner(ObservationId(2));
        p.add_owner(ObservationId(1));
        assert_eq!(p.owners(), &[ObservationId(1), ObservationId(2)]);
        p.remove_owner(ObservationId(1));
        assert_eq!(p.owners(), &[ObservationId(2)]);
    }

    #[test]
    fn test_small_test_statistics_read_as_zero() {
        let mut s = ParameterStatistics::default();
        s.set_test_statistics(1e-10, 3.5);
        assert_eq!(s.t_prio(), 0.0);
        assert_eq!(s.t_post(), 3.5);
    }
}
