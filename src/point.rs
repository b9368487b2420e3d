//! # Network points
//!
//! A [`Point`] is a leaf of the network graph: a named 3D position with its approximate
//! (linearisation) coordinates, the two vertical-deflection angles (ξ, η) of the local plumb
//! line and the back-references to every observation touching it.
//!
//! ## Conventions
//!
//! - `x` is the **north-like** axis and `y` the **east-like** axis of the local frame, `z` is up.
//!   Directions are counted from `x` towards `y`.
//! - Deflections are small rotation angles in **radians**; `deflection_x` rotates about the
//!   `x` axis, `deflection_y` about the `y` axis.
//! - The [`SphericalDeflection`] is not an unknown. It is written by the
//!   [`SphericalDeflectionModel`](crate::reduction::spherical_deflection::SphericalDeflectionModel)
//!   and only takes part in the observation frame when the projection is
//!   [`LocalEllipsoidal`](crate::reduction::ProjectionType::LocalEllipsoidal).
//!
//! ## Mutability
//!
//! Coordinates and deflections are changed by the adjustment driver between iterations,
//! through [`Network::point_mut`](crate::network::Network::point_mut). The observation models
//! only ever read them.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::constants::{Meter, Radian};
use crate::observations::ObservationId;

/// Stable handle of a [`Point`] inside a [`Network`](crate::network::Network).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointId(pub usize);

/// Cartesian axis of a point coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One vertical-deflection angle of a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerticalDeflection {
    value: Radian,
    value0: Radian,
    column: Option<usize>,
    std: Option<f64>,
}

impl VerticalDeflection {
    pub fn new(value: Radian) -> Self {
        VerticalDeflection {
            value,
            value0: value,
            column: None,
            std: None,
        }
    }

    /// Current value.
    pub fn value(&self) -> Radian {
        self.value
    }

    /// Approximate value used for a-priori quantities.
    pub fn value0(&self) -> Radian {
        self.value0
    }

    pub fn set_value(&mut self, value: Radian) {
        self.value = value;
    }

    pub fn set_value0(&mut self, value0: Radian) {
        self.value0 = value0;
    }

    /// Column of this deflection in the design matrix, `None` when it is not estimated.
    pub fn column(&self) -> Option<usize> {
        self.column
    }

    pub fn set_column(&mut self, column: Option<usize>) {
        self.column = column;
    }

    pub fn std(&self) -> Option<f64> {
        self.std
    }

    /// Set the a-priori uncertainty of the deflection; non-positive values are ignored.
    pub fn set_std(&mut self, std: f64) {
        if std > 0.0 {
            self.std = Some(std);
        }
    }
}

/// Deflection of the ellipsoidal normal relative to the local frame axis, plus the height of
/// the point above the tangent plane of the principal point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SphericalDeflection {
    pub x: Radian,
    pub y: Radian,
    pub frame_intersection_height: Meter,
}

/// A named network point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    name: String,
    dimension: u8,
    coordinates: Vector3<Meter>,
    approximate_coordinates: Vector3<Meter>,
    deflection_x: VerticalDeflection,
    deflection_y: VerticalDeflection,
    spherical_deflection: SphericalDeflection,
    columns: [Option<usize>; 3],
    observations: Vec<ObservationId>,
}

impl Point {
    /// Create a 3D point whose approximate coordinates equal the given ones.
    ///
    /// Arguments
    /// -----------------
    /// * `name`: Unique point name.
    /// * `x`, `y`, `z`: Local coordinates in meters.
    ///
    /// Return
    /// ----------
    /// * A point with zero deflections, no column assignment and no observations.
    pub fn new(name: impl Into<String>, x: Meter, y: Meter, z: Meter) -> Self {
        Point::with_dimension(name, 3, x, y, z)
    }

    /// Create a planimetric point (`z` is carried but not estimated).
    pub fn new_2d(name: impl Into<String>, x: Meter, y: Meter) -> Self {
        Point::with_dimension(name, 2, x, y, 0.0)
    }

    /// Create a height point.
    pub fn new_1d(name: impl Into<String>, z: Meter) -> Self {
        Point::with_dimension(name, 1, 0.0, 0.0, z)
    }

    fn with_dimension(name: impl Into<String>, dimension: u8, x: Meter, y: Meter, z: Meter) -> Self {
        let coordinates = Vector3::new(x, y, z);
        Point {
            name: name.into(),
            dimension,
            coordinates,
            approximate_coordinates: coordinates,
            deflection_x: VerticalDeflection::new(0.0),
            deflection_y: VerticalDeflection::new(0.0),
            spherical_deflection: SphericalDeflection::default(),
            columns: [None; 3],
            observations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of estimated coordinate axes (1, 2 or 3).
    pub fn dimension(&self) -> u8 {
        self.dimension
    }

    pub fn x(&self) -> Meter {
        self.coordinates.x
    }

    pub fn y(&self) -> Meter {
        self.coordinates.y
    }

    pub fn z(&self) -> Meter {
        self.coordinates.z
    }

    pub fn x0(&self) -> Meter {
        self.approximate_coordinates.x
    }

    pub fn y0(&self) -> Meter {
        self.approximate_coordinates.y
    }

    pub fn z0(&self) -> Meter {
        self.approximate_coordinates.z
    }

    pub fn coordinates(&self) -> &Vector3<Meter> {
        &self.coordinates
    }

    pub fn approximate_coordinates(&self) -> &Vector3<Meter> {
        &self.approximate_coordinates
    }

    /// Overwrite the current coordinates, the approximate ones are kept.
    pub fn set_coordinates(&mut self, x: Meter, y: Meter, z: Meter) {
        self.coordinates = Vector3::new(x, y, z);
    }

    pub fn set_coordinate(&mut self, axis: Axis, value: Meter) {
        match axis {
            Axis::X => self.coordinates.x = value,
            Axis::Y => self.coordinates.y = value,
            Axis::Z => self.coordinates.z = value,
        }
    }

    pub fn set_approximate_coordinates(&mut self, x0: Meter, y0: Meter, z0: Meter) {
        self.approximate_coordinates = Vector3::new(x0, y0, z0);
    }

    pub fn deflection_x(&self) -> &VerticalDeflection {
        &self.deflection_x
    }

    pub fn deflection_y(&self) -> &VerticalDeflection {
        &self.deflection_y
    }

    pub fn deflection_x_mut(&mut self) -> &mut VerticalDeflection {
        &mut self.deflection_x
    }

    pub fn deflection_y_mut(&mut self) -> &mut VerticalDeflection {
        &mut self.deflection_y
    }

    /// Set both current deflection angles.
    pub fn set_deflection(&mut self, x: Radian, y: Radian) {
        self.deflection_x.set_value(x);
        self.deflection_y.set_value(y);
    }

    /// Set both approximate deflection angles.
    pub fn set_deflection0(&mut self, x0: Radian, y0: Radian) {
        self.deflection_x.set_value0(x0);
        self.deflection_y.set_value0(y0);
    }

    pub fn spherical_deflection(&self) -> &SphericalDeflection {
        &self.spherical_deflection
    }

    pub fn set_spherical_deflection(&mut self, deflection: SphericalDeflection) {
        self.spherical_deflection = deflection;
    }

    /// Design-matrix column of a coordinate, `None` when the coordinate is fixed.
    pub fn column(&self, axis: Axis) -> Option<usize> {
        self.columns[axis as usize]
    }

    pub fn set_column(&mut self, axis: Axis, column: Option<usize>) {
        self.columns[axis as usize] = column;
    }

    /// Observations touching this point.
    pub fn observations(&self) -> &[ObservationId] {
        &self.observations
    }

    pub(crate) fn add_observation(&mut self, id: ObservationId) {
        if !self.observations.contains(&id) {
            self.observations.push(id);
        }
    }
}
