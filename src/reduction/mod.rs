//! # Reductions and projections
//!
//! A [`Reduction`] is the shared, read-only configuration describing how raw observations
//! relate to the 3D model of the network: which projection the coordinates live in, which
//! systematic corrections are applied to the a-priori side of an observation, and the Earth
//! model used by those corrections.
//!
//! Reductions are stored once in the [`Network`](crate::network::Network) and attached to
//! observations by [`ReductionId`]. Observations without an attached reduction behave as if
//! they used [`Reduction::default()`]: local Cartesian frame, no reduction task.
//!
//! ## Corrections
//!
//! | Task | Observation | Correction of the a-priori value |
//! |---|---|---|
//! | `Direction` | Direction | meridian-convergence term `−Δx(2yS+yE)/(6R²m²)` in GK/UTM |
//! | `Height` | HorizontalDistance | `s·R/(R+h)`, `h` the mean height of the 3D endpoints or the reference height |
//! | `EarthCurvature` | HorizontalDistance | arc to chord, `2R·sin(s/2R)` |
//! | `Distance` | HorizontalDistance | projection scale `m·(1+(yS²+yS·yE+yE²)/(6R²))` in GK/UTM |
//!
//! The GK/UTM terms are only applied when both eastings fall inside the configured
//! projected-easting bounds. Eastings carry a zone prefix; they are reduced to the central
//! meridian by `((y / zone) mod 1)·zone − false_easting`.
//!
//! ## Configuration
//!
//! ```rust
//! use geonet::reduction::{ProjectionType, Reduction, ReductionTaskType};
//!
//! let reduction = Reduction::builder()
//!     .projection_type(ProjectionType::Utm)
//!     .task(ReductionTaskType::Distance)
//!     .task(ReductionTaskType::Direction)
//!     .reference_height(120.0)
//!     .build()?;
//! assert!(reduction.has_reduction_task(ReductionTaskType::Distance));
//! # Ok::<(), geonet::geonet_errors::GeonetError>(())
//! ```
//!
//! ## See also
//! ------------
//! * [`ellipsoid::Ellipsoid`] – Earth model.
//! * [`principal_point::PrincipalPoint`] – Origin of the local frame.
//! * [`spherical_deflection::SphericalDeflectionModel`] – Normals of a local ellipsoidal frame.

pub mod ellipsoid;
pub mod principal_point;
pub mod spherical_deflection;

use std::cmp::Ordering::{Equal, Greater, Less};
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    Meter, Radian, EARTH_RADIUS, FALSE_EASTING, MAX_PROJECTED_EASTING, MIN_PROJECTED_EASTING,
    UTM_SCALE, ZONE_WIDTH,
};
use crate::geonet_errors::GeonetError;

pub use ellipsoid::Ellipsoid;
pub use principal_point::PrincipalPoint;

/// Stable handle of a [`Reduction`] inside a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReductionId(pub usize);

/// Frame in which the point coordinates are given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectionType {
    #[default]
    LocalCartesian,
    GaussKrueger,
    Utm,
    LocalEllipsoidal,
}

/// Systematic correction applied to the a-priori side of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReductionTaskType {
    Direction,
    Distance,
    Height,
    EarthCurvature,
}

/// Shared reduction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reduction {
    projection_type: ProjectionType,
    tasks: BTreeSet<ReductionTaskType>,
    earth_radius: Meter,
    reference_height: Meter,
    ellipsoid: Ellipsoid,
    principal_point: PrincipalPoint,
    min_projected_easting: Meter,
    max_projected_easting: Meter,
    zone_width: Meter,
    false_easting: Meter,
    utm_scale: f64,
}

impl Default for Reduction {
    fn default() -> Self {
        Reduction {
            projection_type: ProjectionType::LocalCartesian,
            tasks: BTreeSet::new(),
            earth_radius: EARTH_RADIUS,
            reference_height: 0.0,
            ellipsoid: Ellipsoid::default(),
            principal_point: PrincipalPoint::default(),
            min_projected_easting: MIN_PROJECTED_EASTING,
            max_projected_easting: MAX_PROJECTED_EASTING,
            zone_width: ZONE_WIDTH,
            false_easting: FALSE_EASTING,
            utm_scale: UTM_SCALE,
        }
    }
}

impl Reduction {
    pub fn new() -> Self {
        Reduction::default()
    }

    /// Start a fluent, validating builder initialised with the defaults.
    pub fn builder() -> ReductionBuilder {
        ReductionBuilder::new()
    }

    pub fn projection_type(&self) -> ProjectionType {
        self.projection_type
    }

    pub fn set_projection_type(&mut self, projection_type: ProjectionType) {
        self.projection_type = projection_type;
    }

    pub fn apply_reduction_task(&mut self, task: ReductionTaskType) {
        self.tasks.insert(task);
    }

    pub fn remove_reduction_task(&mut self, task: ReductionTaskType) {
        self.tasks.remove(&task);
    }

    pub fn clear_reduction_tasks(&mut self) {
        self.tasks.clear();
    }

    pub fn has_reduction_task(&self, task: ReductionTaskType) -> bool {
        self.tasks.contains(&task)
    }

    pub fn reduction_tasks(&self) -> impl Iterator<Item = ReductionTaskType> + '_ {
        self.tasks.iter().copied()
    }

    pub fn earth_radius(&self) -> Meter {
        self.earth_radius
    }

    pub fn reference_height(&self) -> Meter {
        self.reference_height
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    pub fn principal_point(&self) -> &PrincipalPoint {
        &self.principal_point
    }

    pub fn set_principal_point(&mut self, principal_point: PrincipalPoint) {
        self.principal_point = principal_point;
    }

    /// `true` for Gauß-Krüger and UTM.
    pub fn is_projected(&self) -> bool {
        matches!(
            self.projection_type,
            ProjectionType::GaussKrueger | ProjectionType::Utm
        )
    }

    /// Scale of the central meridian, `m0` for UTM and 1 otherwise.
    pub fn projection_scale(&self) -> f64 {
        if self.projection_type == ProjectionType::Utm {
            self.utm_scale
        } else {
            1.0
        }
    }

    /// Easting relative to the central meridian, `None` if `y` is outside the projected range.
    pub fn reduced_easting(&self, y: Meter) -> Option<Meter> {
        if y < self.min_projected_easting || y > self.max_projected_easting {
            return None;
        }
        Some(((y / self.zone_width) % 1.0) * self.zone_width - self.false_easting)
    }

    /// Meridian-convergence term added to an a-priori direction.
    ///
    /// Arguments
    /// -----------------
    /// * `xs`, `ys`: Northing and easting of the station.
    /// * `xe`, `ye`: Northing and easting of the target.
    ///
    /// Return
    /// ----------
    /// * `Some(k)` in radians when the direction task is enabled, the projection is GK/UTM and
    ///   both eastings are in range; `None` otherwise.
    pub fn direction_reduction(&self, xs: Meter, ys: Meter, xe: Meter, ye: Meter) -> Option<Radian> {
        if !self.has_reduction_task(ReductionTaskType::Direction) || !self.is_projected() {
            return None;
        }
        let ys = self.reduced_easting(ys)?;
        let ye = self.reduced_easting(ye)?;
        let r = self.earth_radius;
        let m = self.projection_scale();
        Some(-(xe - xs) * (2.0 * ys + ye) / (6.0 * r * r * m * m))
    }

    /// Reduce a measured horizontal distance to the model frame.
    ///
    /// Arguments
    /// -----------------
    /// * `distance`: Measured horizontal distance.
    /// * `ys`, `ye`: Eastings of both points (only used by the projection task).
    /// * `zs`, `ze`: Heights of both points, `None` for points without a height component
    ///   (only used by the height task).
    ///
    /// Return
    /// ----------
    /// * The distance after the enabled height, Earth-curvature and projection tasks, in that
    ///   order.
    pub fn reduce_horizontal_distance(
        &self,
        distance: Meter,
        ys: Meter,
        ye: Meter,
        zs: Option<Meter>,
        ze: Option<Meter>,
    ) -> Meter {
        let r = self.earth_radius;
        let mut s = distance;

        if self.has_reduction_task(ReductionTaskType::Height) {
            let h = match (zs, ze) {
                (Some(zs), Some(ze)) => 0.5 * (zs + ze),
                (Some(z), None) | (None, Some(z)) => z,
                (None, None) => self.reference_height,
            };
            s *= r / (r + h);
        }

        if self.has_reduction_task(ReductionTaskType::EarthCurvature) {
            s = 2.0 * r * (s / (2.0 * r)).sin();
        }

        if self.has_reduction_task(ReductionTaskType::Distance) && self.is_projected() {
            if let (Some(ys), Some(ye)) = (self.reduced_easting(ys), self.reduced_easting(ye)) {
                let k = (ys * ys + ys * ye + ye * ye) / (6.0 * r * r);
                s *= self.projection_scale() * (1.0 + k);
            }
        }
        s
    }
}

/// Builder for [`Reduction`], with validation.
#[derive(Debug, Clone, Default)]
pub struct ReductionBuilder {
    reduction: Reduction,
}

impl ReductionBuilder {
    pub fn new() -> Self {
        ReductionBuilder {
            reduction: Reduction::default(),
        }
    }

    pub fn projection_type(mut self, v: ProjectionType) -> Self {
        self.reduction.projection_type = v;
        self
    }
    pub fn task(mut self, v: ReductionTaskType) -> Self {
        self.reduction.tasks.insert(v);
        self
    }
    pub fn earth_radius(mut self, v: Meter) -> Self {
        self.reduction.earth_radius = v;
        self
    }
    pub fn reference_height(mut self, v: Meter) -> Self {
        self.reduction.reference_height = v;
        self
    }
    pub fn ellipsoid(mut self, v: Ellipsoid) -> Self {
        self.reduction.ellipsoid = v;
        self
    }
    pub fn principal_point(mut self, v: PrincipalPoint) -> Self {
        self.reduction.principal_point = v;
        self
    }
    pub fn projected_easting_bounds(mut self, min: Meter, max: Meter) -> Self {
        self.reduction.min_projected_easting = min;
        self.reduction.max_projected_easting = max;
        self
    }
    pub fn zone_width(mut self, v: Meter) -> Self {
        self.reduction.zone_width = v;
        self
    }
    pub fn false_easting(mut self, v: Meter) -> Self {
        self.reduction.false_easting = v;
        self
    }
    pub fn utm_scale(mut self, v: f64) -> Self {
        self.reduction.utm_scale = v;
        self
    }

    /// Return true iff x > 0.0 and comparable (i.e., not NaN).
    #[inline]
    fn gt0(x: f64) -> bool {
        x.partial_cmp(&0.0) == Some(Greater)
    }

    /// Finalize the builder and produce a [`Reduction`].
    ///
    /// Validation rules
    /// -----------------
    /// * `earth_radius > 0`, `zone_width > 0`, `utm_scale > 0`.
    /// * `min_projected_easting <= max_projected_easting`.
    /// * `reference_height` and `false_easting` are finite.
    ///
    /// Errors
    /// ----------
    /// * [`GeonetError::InvalidReduction`] naming the first violated rule.
    pub fn build(self) -> Result<Reduction, GeonetError> {
        let r = &self.reduction;

        if !Self::gt0(r.earth_radius) {
            return Err(GeonetError::InvalidReduction(
                "earth_radius must be > 0".into(),
            ));
        }
        if !Self::gt0(r.zone_width) {
            return Err(GeonetError::InvalidReduction("zone_width must be > 0".into()));
        }
        if !Self::gt0(r.utm_scale) {
            return Err(GeonetError::InvalidReduction("utm_scale must be > 0".into()));
        }
        if !matches!(
            r.min_projected_easting.partial_cmp(&r.max_projected_easting),
            Some(Less) | Some(Equal)
        ) {
            return Err(GeonetError::InvalidReduction(
                "require min_projected_easting <= max_projected_easting".into(),
            ));
        }
        if !r.reference_height.is_finite() || !r.false_easting.is_finite() {
            return Err(GeonetError::InvalidReduction(
                "reference_height and false_easting must be finite".into(),
            ));
        }

        Ok(self.reduction)
    }
}
