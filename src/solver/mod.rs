//! QP solver interface and backends
//!
//! The controller only ever produces one problem shape: two decision
//! variables (the virtual velocity) and five inequality rows (one barrier row
//! plus four box rows). [`QpProblem`] fixes that shape in the type, and any
//! [`QpSolver`](crate::common::QpSolver) can be plugged in behind it.

pub mod active_set;
pub mod clarabel;

pub use self::active_set::ActiveSetSolver;
pub use self::clarabel::ClarabelSolver;

use nalgebra::{Matrix2, Matrix5x2, Vector2, Vector5};

/// Number of inequality rows: barrier row + 4 box rows
pub const NUM_CONSTRAINTS: usize = 5;

/// `minimize 0.5 u'Pu + q'u  subject to  Gu <= h`
#[derive(Debug, Clone, PartialEq)]
pub struct QpProblem {
    pub p: Matrix2<f64>,
    pub q: Vector2<f64>,
    pub g: Matrix5x2<f64>,
    pub h: Vector5<f64>,
}

impl QpProblem {
    pub fn objective(&self, u: &Vector2<f64>) -> f64 {
        0.5 * (u.transpose() * self.p * u)[0] + self.q.dot(u)
    }

    /// Largest row residual `(Gu - h)_i`; positive means violated
    pub fn max_violation(&self, u: &Vector2<f64>) -> f64 {
        (self.g * u - self.h).max()
    }

    pub fn is_feasible(&self, u: &Vector2<f64>, tol: f64) -> bool {
        self.max_violation(u) <= tol
    }

    /// Minimizer of the cost alone, `-P^-1 q`
    pub fn unconstrained_minimizer(&self) -> Option<Vector2<f64>> {
        self.p.try_inverse().map(|p_inv| -(p_inv * self.q))
    }
}
