//! # Design-matrix assembly
//!
//! Gathers the partial derivatives of every observation into rows of the design (Jacobian)
//! matrix and the vector of corrections (reduced observed minus calculated).
//!
//! ## Overview
//!
//! - [`Unknown`] names the target of one partial derivative: a point coordinate, a point
//!   deflection angle or an additional parameter.
//! - [`Network::partials`] lists every applicable partial of one observation.
//! - [`Network::jacobian_row`] keeps the partials whose unknown has a column assigned by the
//!   driver and drops exact zeros.
//! - [`Network::assemble_jacobian`] evaluates every observation with a row and writes the dense
//!   matrix. With the `parallel` feature the rows are evaluated with rayon over a shared
//!   `&Network`; the matrix is written once all rows are available.
//!
//! Disabled parameters are held fixed and never contribute a column entry.

use log::trace;
use nalgebra::{DMatrix, DVector};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::geonet_errors::GeonetError;
use crate::network::Network;
use crate::observations::{ObservationId, ObservationModel};
use crate::parameters::ParameterId;
use crate::point::{Axis, PointId};

/// Target of one partial derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unknown {
    Coordinate { point: PointId, axis: Axis },
    DeflectionX(PointId),
    DeflectionY(PointId),
    Parameter(ParameterId),
}

/// One row of the design matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianRow {
    pub row: usize,
    /// `(column, partial)` pairs, zeros omitted.
    pub entries: Vec<(usize, f64)>,
    pub correction: f64,
}

impl Network {
    /// Every applicable partial derivative of an observation, in a fixed order: start and end
    /// coordinates, deflections of both endpoints, then the additional parameters.
    pub fn partials(&self, obs: ObservationId) -> Result<Vec<(Unknown, f64)>, GeonetError> {
        let o = self.observation(obs)?;
        let s = o.core().start_point();
        let e = o.core().end_point();

        let mut partials = vec![
            (Unknown::Coordinate { point: s, axis: Axis::X }, o.diff_xs(self)),
            (Unknown::Coordinate { point: s, axis: Axis::Y }, o.diff_ys(self)),
            (Unknown::Coordinate { point: s, axis: Axis::Z }, o.diff_zs(self)),
            (Unknown::Coordinate { point: e, axis: Axis::X }, o.diff_xe(self)),
            (Unknown::Coordinate { point: e, axis: Axis::Y }, o.diff_ye(self)),
            (Unknown::Coordinate { point: e, axis: Axis::Z }, o.diff_ze(self)),
            (Unknown::DeflectionX(s), o.diff_vertical_deflection_xs(self)),
            (Unknown::DeflectionY(s), o.diff_vertical_deflection_ys(self)),
            (Unknown::DeflectionX(e), o.diff_vertical_deflection_xe(self)),
            (Unknown::DeflectionY(e), o.diff_vertical_deflection_ye(self)),
        ];
        partials.extend(o.parameter_kinds().iter().filter_map(|&kind| {
            o.parameter(kind)
                .map(|p| (Unknown::Parameter(p), o.diff_parameter(self, kind)))
        }));
        Ok(partials)
    }

    /// Column assigned to an unknown, `None` if it is held fixed.
    pub fn column_of(&self, unknown: Unknown) -> Option<usize> {
        match unknown {
            Unknown::Coordinate { point, axis } => self.points.get(point.0)?.column(axis),
            Unknown::DeflectionX(point) => self.points.get(point.0)?.deflection_x().column(),
            Unknown::DeflectionY(point) => self.points.get(point.0)?.deflection_y().column(),
            Unknown::Parameter(id) => {
                let parameter = self.parameters.get(id.0)?;
                if parameter.is_enabled() {
                    parameter.column()
                } else {
                    None
                }
            }
        }
    }

    /// Design-matrix row of an observation.
    ///
    /// Return
    /// ----------
    /// * `Ok(None)` if the observation has no row assigned, otherwise the non-zero partials
    ///   of every unknown with a column and the correction.
    pub fn jacobian_row(&self, obs: ObservationId) -> Result<Option<JacobianRow>, GeonetError> {
        let Some(row) = self.observation(obs)?.core().row() else {
            return Ok(None);
        };
        let entries = self
            .partials(obs)?
            .into_iter()
            .filter(|&(_, value)| value != 0.0)
            .filter_map(|(unknown, value)| self.column_of(unknown).map(|c| (c, value)))
            .collect();
        let correction = self.observations[obs.0].correction(self);

        trace!("jacobian row {row} (observation {}): {entries:?}", obs.0);
        Ok(Some(JacobianRow {
            row,
            entries,
            correction,
        }))
    }

    #[cfg(feature = "parallel")]
    fn jacobian_rows(&self) -> Result<Vec<JacobianRow>, GeonetError> {
        (0..self.observations.len())
            .into_par_iter()
            .filter_map(|i| self.jacobian_row(ObservationId(i)).transpose())
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn jacobian_rows(&self) -> Result<Vec<JacobianRow>, GeonetError> {
        (0..self.observations.len())
            .filter_map(|i| self.jacobian_row(ObservationId(i)).transpose())
            .collect()
    }

    /// Dense design matrix and correction vector of all observations with a row.
    ///
    /// Arguments
    /// -----------------
    /// * `n_cols`: Number of columns; every assigned column must be below it.
    ///
    /// Return
    /// ----------
    /// * `(A, l)` with one row per assigned observation row (`max row + 1` rows in total),
    ///   or `Err(GeonetError::DimensionMismatch)` if a column is out of range.
    pub fn assemble_jacobian(
        &self,
        n_cols: usize,
    ) -> Result<(DMatrix<f64>, DVector<f64>), GeonetError> {
        let rows = self.jacobian_rows()?;
        let n_rows = rows.iter().map(|r| r.row + 1).max().unwrap_or(0);

        let mut a = DMatrix::zeros(n_rows, n_cols);
        let mut l = DVector::zeros(n_rows);
        for row in &rows {
            for &(column, value) in &row.entries {
                if column >= n_cols {
                    return Err(GeonetError::DimensionMismatch(format!(
                        "column {column} outside a design matrix of {n_cols} columns"
                    )));
                }
                a[(row.row, column)] += value;
            }
            l[row.row] = row.correction;
        }
        Ok((a, l))
    }
}

#[cfg(test)]
mod jacobian_test {
    use super::*;
    use crate::parameters::ParameterType;
    use crate::point::Point;
    use approx::assert_abs_diff_eq;

    fn network() -> (Network, ObservationId, ObservationId) {
        let mut net = Network::new();
        net.add_point(Point::new("S", 0.0, 0.0, 0.0)).unwrap();
        net.add_point(Point::new("E", 100.0, 0.0, 0.0)).unwrap();
        let d = net.add_horizontal_distance(1, "S", "E", 0.0, 0.0, 100.003).unwrap();
        let h = net.add_delta_z(2, "S", "E", 0.0, 0.0, 0.25).unwrap();

        let e = net.point_id("E").unwrap();
        let point = net.point_mut(e).unwrap();
        point.set_column(Axis::X, Some(0));
        point.set_column(Axis::Y, Some(1));
        point.set_column(Axis::Z, Some(2));
        (net, d, h)
    }

    #[test]
    fn test_row_without_assignment() {
        let (net, d, _) = network();
        assert_eq!(net.jacobian_row(d), Ok(None));
    }

    #[test]
    fn test_row_skips_fixed_unknowns_and_zeros() {
        let (mut net, d, _) = network();
        net.set_row(d, Some(0)).unwrap();
        let row = net.jacobian_row(d).unwrap().unwrap();
        assert_eq!(row.row, 0);
        assert_eq!(row.entries, vec![(0, 1.0)]);
        assert_abs_diff_eq!(row.correction, 0.003, epsilon = 1e-12);

        let scale = net.observation(d).unwrap().parameter(ParameterType::Scale).unwrap();
        net.set_column(scale, Some(3)).unwrap();
        let row = net.jacobian_row(d).unwrap().unwrap();
        assert_eq!(row.entries, vec![(0, 1.0), (3, -100.0)]);

        net.parameter_mut(scale).unwrap().set_enabled(false);
        let row = net.jacobian_row(d).unwrap().unwrap();
        assert_eq!(row.entries, vec![(0, 1.0)]);
    }

    #[test]
    fn test_assembled_matrix() {
        let (mut net, d, h) = network();
        net.set_row(d, Some(0)).unwrap();
        net.set_row(h, Some(1)).unwrap();

        let (a, l) = net.assemble_jacobian(3).unwrap();
        assert_eq!(a.shape(), (2, 3));
        assert_eq!(a[(0, 0)], 1.0);
        assert_eq!(a[(0, 2)], 0.0);
        assert_eq!(a[(1, 2)], 1.0);
        assert_abs_diff_eq!(l[0], 0.003, epsilon = 1e-12);
        assert_abs_diff_eq!(l[1], 0.25, epsilon = 1e-12);

        assert!(matches!(
            net.assemble_jacobian(2),
            Err(GeonetError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_partials_cover_parameters() {
        let (net, d, _) = network();
        let partials = net.partials(d).unwrap();
        assert_eq!(partials.len(), 12);
        assert!(matches!(partials[10].0, Unknown::Parameter(_)));
        assert_abs_diff_eq!(partials[11].1, -1.0);
    }
}
