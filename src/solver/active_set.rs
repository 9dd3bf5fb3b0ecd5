//! Exact QP solver for two decision variables
//!
//! With two variables at most two constraints are active at a vertex, so
//! the optimum is one of: the unconstrained minimizer, the minimizer on a
//! single constraint line, or the intersection of two constraint lines. All
//! candidates are enumerated and the cheapest feasible one wins.

use nalgebra::{Matrix2, Vector2};

use crate::common::{QpSolver, RoboticsError, RoboticsResult};
use crate::solver::{QpProblem, NUM_CONSTRAINTS};

const DEGENERATE_EPS: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct ActiveSetSolver {
    /// Allowed constraint residual when accepting a candidate
    pub feasibility_tol: f64,
}

impl Default for ActiveSetSolver {
    fn default() -> Self {
        Self { feasibility_tol: 1e-9 }
    }
}

impl ActiveSetSolver {
    pub fn new(feasibility_tol: f64) -> Self {
        Self { feasibility_tol }
    }

    fn row(problem: &QpProblem, i: usize) -> Vector2<f64> {
        Vector2::new(problem.g[(i, 0)], problem.g[(i, 1)])
    }

    fn candidates(problem: &QpProblem, p_inv: &Matrix2<f64>) -> Vec<Vector2<f64>> {
        let u0 = -(p_inv * problem.q);
        let mut out = Vec::with_capacity(1 + NUM_CONSTRAINTS + NUM_CONSTRAINTS * (NUM_CONSTRAINTS - 1) / 2);
        out.push(u0);

        // minimizer restricted to a_i'u = h_i
        for i in 0..NUM_CONSTRAINTS {
            let a = Self::row(problem, i);
            let denom = (a.transpose() * p_inv * a)[0];
            if denom.abs() < DEGENERATE_EPS {
                continue;
            }
            let lambda = (a.dot(&u0) - problem.h[i]) / denom;
            out.push(u0 - p_inv * a * lambda);
        }

        // vertices a_i'u = h_i, a_j'u = h_j
        for i in 0..NUM_CONSTRAINTS {
            for j in (i + 1)..NUM_CONSTRAINTS {
                let a_i = Self::row(problem, i);
                let a_j = Self::row(problem, j);
                let m = Matrix2::new(a_i[0], a_i[1], a_j[0], a_j[1]);
                if m.determinant().abs() < DEGENERATE_EPS {
                    continue;
                }
                if let Some(m_inv) = m.try_inverse() {
                    out.push(m_inv * Vector2::new(problem.h[i], problem.h[j]));
                }
            }
        }
        out
    }
}

impl QpSolver for ActiveSetSolver {
    fn solve(&self, problem: &QpProblem) -> RoboticsResult<Vector2<f64>> {
        let p_inv = problem.p.try_inverse().ok_or_else(|| {
            RoboticsError::NumericalError("cost matrix P is singular".to_string())
        })?;

        Self::candidates(problem, &p_inv)
            .into_iter()
            .filter(|u| u.iter().all(|v| v.is_finite()))
            .filter(|u| problem.is_feasible(u, self.feasibility_tol))
            .map(|u| (problem.objective(&u), u))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, u)| u)
            .ok_or_else(|| {
                RoboticsError::SolverInfeasible(format!(
                    "no point satisfies G u <= h (h = {:?})",
                    problem.h.as_slice()
                ))
            })
    }

    fn name(&self) -> &'static str {
        "active-set"
    }
}
