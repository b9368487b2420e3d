//! # Topocentric observation frame
//!
//! Every terrestrial observation (direction, zenith angle, horizontal and slope distance)
//! is a function of one vector `(u, v, w)`: the coordinate difference between start and end
//! point, corrected for the target height and rotated into the plumb-line frame of the
//! station by the vertical deflections of both points.
//!
//! With `d = (dx, dy, dz) = end − start`, station deflections `(ξs, ηs)`, target deflections
//! `(ξe, ηe)`, instrument height `ih` and target height `th`:
//!
//! ```text
//! u = cos ηs·dx + sin ηs·dz − th·sin(ηe − ηs)·cos ξe
//! v = cos ξs·dy + sin ξs·(sin ηs·dx − cos ηs·dz) − th·(cos ξe·sin ξs·cos(ηe − ηs) − cos ξs·sin ξe)
//! w = sin ξs·dy + cos ξs·(cos ηs·dz − sin ηs·dx) + th·(sin ξe·sin ξs + cos ξe·cos ξs·cos(ηe − ηs)) − ih
//! ```
//!
//! `u` is the horizontal component along `x`, `v` the horizontal component along `y`, `w` the
//! vertical one. [`TopocentricFrame::new`] evaluates the vector **and** its partial
//! derivatives with respect to the seven independent variables of [`FrameVariable`] in one
//! pass, so value and derivatives of every observation type always share the exact same
//! intermediate quantities. The end-point coordinate derivatives are the negated start-point
//! ones, since the frame only depends on coordinate differences.
//!
//! The derivatives are compact thanks to two identities of the rotation:
//! `∂v/∂ξs = −(w + ih)`, `∂w/∂ξs = v`, `∂v/∂ηs = sin ξs·u` and `∂w/∂ηs = −cos ξs·u`.

use nalgebra::Vector3;

use crate::constants::{Meter, Radian};

/// Independent variable of the observation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameVariable {
    Xs,
    Ys,
    Zs,
    DeflectionXs,
    DeflectionYs,
    DeflectionXe,
    DeflectionYe,
}

/// Partial derivatives of one frame component.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameGradient {
    pub xs: f64,
    pub ys: f64,
    pub zs: f64,
    pub deflection_xs: f64,
    pub deflection_ys: f64,
    pub deflection_xe: f64,
    pub deflection_ye: f64,
}

impl FrameGradient {
    pub fn get(&self, variable: FrameVariable) -> f64 {
        match variable {
            FrameVariable::Xs => self.xs,
            FrameVariable::Ys => self.ys,
            FrameVariable::Zs => self.zs,
            FrameVariable::DeflectionXs => self.deflection_xs,
            FrameVariable::DeflectionYs => self.deflection_ys,
            FrameVariable::DeflectionXe => self.deflection_xe,
            FrameVariable::DeflectionYe => self.deflection_ye,
        }
    }
}

/// Deflection angles of a point as they enter the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameDeflection {
    pub x: Radian,
    pub y: Radian,
}

/// The rotated difference vector `(u, v, w)` and its gradients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopocentricFrame {
    pub u: Meter,
    pub v: Meter,
    pub w: Meter,
    pub du: FrameGradient,
    pub dv: FrameGradient,
    pub dw: FrameGradient,
}

impl TopocentricFrame {
    /// Evaluate the frame.
    ///
    /// Arguments
    /// -----------------
    /// * `start`, `end`: Coordinates of station and target.
    /// * `start_height`: Instrument height `ih` above the station.
    /// * `end_height`: Target height `th` above the target point.
    /// * `start_deflection`, `end_deflection`: Deflections of both points.
    ///
    /// Return
    /// ----------
    /// * The frame vector and its derivatives.
    pub fn new(
        start: &Vector3<Meter>,
        end: &Vector3<Meter>,
        start_height: Meter,
        end_height: Meter,
        start_deflection: FrameDeflection,
        end_deflection: FrameDeflection,
    ) -> Self {
        let d = end - start;
        let (dx, dy, dz) = (d.x, d.y, d.z);
        let ih = start_height;
        let th = end_height;

        let (srxs, crxs) = start_deflection.x.sin_cos();
        let (srys, crys) = start_deflection.y.sin_cos();
        let (srxe, crxe) = end_deflection.x.sin_cos();
        let (sdry, cdry) = (end_deflection.y - start_deflection.y).sin_cos();

        let u = crys * dx + srys * dz - th * sdry * crxe;
        let v = crxs * dy + srxs * (srys * dx - crys * dz) - th * (crxe * srxs * cdry - crxs * srxe);
        let w = srxs * dy + crxs * (crys * dz - srys * dx) + th * (srxe * srxs + crxe * crxs * cdry)
            - ih;

        let du = FrameGradient {
            xs: -crys,
            ys: 0.0,
            zs: -srys,
            deflection_xs: 0.0,
            deflection_ys: crys * dz - srys * dx + th * cdry * crxe,
            deflection_xe: th * sdry * srxe,
            deflection_ye: -th * cdry * crxe,
        };

        let dv = FrameGradient {
            xs: -srxs * srys,
            ys: -crxs,
            zs: srxs * crys,
            deflection_xs: -(w + ih),
            deflection_ys: srxs * u,
            deflection_xe: th * (crxe * crxs + srxe * srxs * cdry),
            deflection_ye: th * crxe * srxs * sdry,
        };

        let dw = FrameGradient {
            xs: crxs * srys,
            ys: -srxs,
            zs: -crxs * crys,
            deflection_xs: v,
            deflection_ys: -crxs * u,
            deflection_xe: th * (crxe * srxs - srxe * crxs * cdry),
            deflection_ye: -th * crxe * crxs * sdry,
        };

        TopocentricFrame {
            u,
            v,
            w,
            du,
            dv,
            dw,
        }
    }

    /// Squared horizontal distance `u² + v²`.
    pub fn horizontal_distance_squared(&self) -> f64 {
        self.u * self.u + self.v * self.v
    }

    /// Horizontal distance `hypot(u, v)`.
    pub fn horizontal_distance(&self) -> Meter {
        self.u.hypot(self.v)
    }

    /// Spatial distance `√(u² + v² + w²)`.
    pub fn slope_distance(&self) -> Meter {
        (self.horizontal_distance_squared() + self.w * self.w).sqrt()
    }

    /// Partials `(∂u, ∂v, ∂w)` with respect to one variable.
    pub fn partials(&self, variable: FrameVariable) -> (f64, f64, f64) {
        (
            self.du.get(variable),
            self.dv.get(variable),
            self.dw.get(variable),
        )
    }
}

#[cfg(test)]
mod frame_test {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    type Params = [f64; 12];

    fn eval(p: &Params) -> TopocentricFrame {
        TopocentricFrame::new(
            &Vector3::new(p[0], p[1], p[2]),
            &Vector3::new(p[3], p[4], p[5]),
            p[10],
            p[11],
            FrameDeflection { x: p[6], y: p[7] },
            FrameDeflection { x: p[8], y: p[9] },
        )
    }

    #[test]
    fn test_frame_without_deflection_is_coordinate_difference() {
        let f = TopocentricFrame::new(
            &Vector3::new(1.0, 2.0, 3.0),
            &Vector3::new(11.0, -8.0, 5.0),
            1.5,
            1.2,
            FrameDeflection::default(),
            FrameDeflection::default(),
        );
        assert_relative_eq!(f.u, 10.0);
        assert_relative_eq!(f.v, -10.0);
        assert_relative_eq!(f.w, 2.0 + 1.2 - 1.5);
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(42);
        let variables = [
            (FrameVariable::Xs, 0),
            (FrameVariable::Ys, 1),
            (FrameVariable::Zs, 2),
            (FrameVariable::DeflectionXs, 6),
            (FrameVariable::DeflectionYs, 7),
            (FrameVariable::DeflectionXe, 8),
            (FrameVariable::DeflectionYe, 9),
        ];

        for _ in 0..50 {
            let mut p: Params = [0.0; 12];
            for v in p.iter_mut().take(6) {
                *v = rng.random_range(-500.0..500.0);
            }
            for v in p.iter_mut().skip(6).take(4) {
                *v = rng.random_range(-1e-3..1e-3);
            }
            p[10] = rng.random_range(0.0..2.0);
            p[11] = rng.random_range(0.0..2.0);

            let f = eval(&p);
            for (variable, index) in variables {
                let h = if index < 6 { 1e-3 } else { 1e-6 };
                let mut plus = p;
                let mut minus = p;
                plus[index] += h;
                minus[index] -= h;
                let (fp, fm) = (eval(&plus), eval(&minus));
                let (du, dv, dw) = f.partials(variable);
                assert_relative_eq!((fp.u - fm.u) / (2.0 * h), du, epsilon = 1e-6);
                assert_relative_eq!((fp.v - fm.v) / (2.0 * h), dv, epsilon = 1e-6);
                assert_relative_eq!((fp.w - fm.w) / (2.0 * h), dw, epsilon = 1e-6);
            }
        }
    }
}
