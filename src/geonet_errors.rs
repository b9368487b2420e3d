use thiserror::Error;

use crate::observations::ObservationType;
use crate::parameters::ParameterType;

#[derive(Error, Debug, PartialEq)]
pub enum GeonetError {
    #[error("Start and end point of an observation must differ: {0}")]
    IdenticalStartAndEndPoint(String),

    #[error("Unknown point: {0}")]
    UnknownPoint(String),

    #[error("Point already exists: {0}")]
    DuplicatePoint(String),

    #[error("Observation not found: {0}")]
    ObservationNotFound(usize),

    #[error("Additional parameter not found: {0}")]
    ParameterNotFound(usize),

    #[error("Baseline group not found: {0}")]
    BaselineNotFound(usize),

    #[error("Reduction not found: {0}")]
    ReductionNotFound(usize),

    #[error("Observation group not found: {0}")]
    GroupNotFound(usize),

    #[error("Parameter kind mismatch: expected {expected:?}, found {found:?}")]
    ParameterKindMismatch {
        expected: ParameterType,
        found: ParameterType,
    },

    #[error("Observation type mismatch: expected {expected:?}, found {found:?}")]
    ObservationTypeMismatch {
        expected: ObservationType,
        found: ObservationType,
    },

    #[error("Observation {observation} has no {kind} parameter")]
    UnsupportedParameter {
        observation: usize,
        kind: ParameterType,
    },

    #[error("Observation {0} is not a GNSS baseline component")]
    NotABaselineComponent(usize),

    #[error("Baseline components cannot be associated: {0}")]
    IncompatibleBaselineComponent(String),

    #[error("Invalid redundancy matrix: {0}")]
    InvalidRedundancyMatrix(String),

    #[error("Invalid ellipsoid: {0}")]
    InvalidEllipsoid(String),

    #[error("Invalid reduction parameter: {0}")]
    InvalidReduction(String),

    #[error("Invalid uncertainty: {0}")]
    InvalidUncertainty(String),

    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
}
