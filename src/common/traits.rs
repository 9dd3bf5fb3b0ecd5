//! Common traits defining the seams of the control pipeline

use nalgebra::Vector2;

use crate::common::error::RoboticsResult;
use crate::common::types::VelocityCommand;
use crate::pipeline::RobotId;
use crate::solver::QpProblem;

/// Convex QP backend: minimize `0.5 u'Pu + q'u` subject to `Gu <= h`.
///
/// Implementations report infeasibility as `RoboticsError::SolverInfeasible`
/// and an exhausted time budget as `RoboticsError::SolverTimeout`.
pub trait QpSolver: Send + Sync {
    /// Solve the two-variable problem and return the minimizer
    fn solve(&self, problem: &QpProblem) -> RoboticsResult<Vector2<f64>>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

impl<S: QpSolver + ?Sized> QpSolver for Box<S> {
    fn solve(&self, problem: &QpProblem) -> RoboticsResult<Vector2<f64>> {
        (**self).solve(problem)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Source of the set of active robots, consulted once at startup
pub trait RobotDiscovery {
    fn discover(&self) -> RoboticsResult<Vec<RobotId>>;
}

/// Per-robot command output. Delivery is best effort.
pub trait CommandSink: Send {
    /// Returns false when the command was dropped
    fn publish(&self, command: VelocityCommand) -> bool;
}
