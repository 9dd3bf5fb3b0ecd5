//! Clarabel backend
//!
//! Clarabel is a pure-Rust interior-point solver. Inequalities map onto its
//! nonnegative cone: `G u + s = h, s >= 0` is exactly `G u <= h`.

use std::time::Instant;

use ::clarabel::algebra::CscMatrix;
use ::clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT::NonnegativeConeT,
};
use nalgebra::{DMatrix, Vector2};
use tracing::trace;

use crate::common::{QpSolver, RoboticsError, RoboticsResult};
use crate::config::SolverConfig;
use crate::solver::{QpProblem, NUM_CONSTRAINTS};

/// Interior-point QP solver with an iteration cap and a time limit
#[derive(Debug, Clone)]
pub struct ClarabelSolver {
    config: SolverConfig,
}

impl ClarabelSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl Default for ClarabelSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl QpSolver for ClarabelSolver {
    fn solve(&self, problem: &QpProblem) -> RoboticsResult<Vector2<f64>> {
        let start = Instant::now();

        let p = DMatrix::from_iterator(2, 2, problem.p.iter().copied());
        let g = DMatrix::from_iterator(NUM_CONSTRAINTS, 2, problem.g.iter().copied());
        let p_csc = dmatrix_to_csc_upper_tri(&p);
        let g_csc = dmatrix_to_csc(&g);

        let q: Vec<f64> = problem.q.iter().copied().collect();
        let h: Vec<f64> = problem.h.iter().copied().collect();
        let cones = vec![NonnegativeConeT(NUM_CONSTRAINTS)];

        let tol = self.config.tolerance;
        let settings = DefaultSettingsBuilder::default()
            .max_iter(self.config.max_iter)
            .time_limit(self.config.time_limit_ms as f64 / 1000.0)
            .verbose(false)
            .tol_gap_abs(tol)
            .tol_gap_rel(tol)
            .tol_feas(tol)
            .build()
            .map_err(|e| RoboticsError::InvalidParameter(format!("clarabel settings: {:?}", e)))?;

        let mut solver = DefaultSolver::new(&p_csc, &q, &g_csc, &h, &cones, settings)
            .map_err(|e| RoboticsError::NumericalError(format!("clarabel setup: {:?}", e)))?;
        solver.solve();

        let solution = &solver.solution;
        let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        trace!(status = ?solution.status, iterations = solution.iterations, elapsed_us, "clarabel solve");

        match solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                Ok(Vector2::new(solution.x[0], solution.x[1]))
            }
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                Err(RoboticsError::SolverInfeasible(format!(
                    "clarabel reported {:?}",
                    solution.status
                )))
            }
            SolverStatus::MaxTime => Err(RoboticsError::SolverTimeout {
                elapsed_us,
                budget_us: self.config.time_limit_ms.saturating_mul(1000),
            }),
            status => Err(RoboticsError::NumericalError(format!(
                "clarabel stopped with {:?} after {} iterations",
                status, solution.iterations
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "clarabel"
    }
}

/// Convert a nalgebra `DMatrix<f64>` to a Clarabel `CscMatrix<f64>` (full matrix).
fn dmatrix_to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..nrows {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}

/// Upper triangle of a symmetric `DMatrix<f64>` as a `CscMatrix<f64>`.
fn dmatrix_to_csc_upper_tri(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let (nrows, ncols) = m.shape();
    let mut colptr = vec![0usize; ncols + 1];
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();

    for j in 0..ncols {
        for i in 0..=j.min(nrows - 1) {
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr[j + 1] = rowval.len();
    }

    CscMatrix::new(nrows, ncols, colptr, rowval, nzval)
}
