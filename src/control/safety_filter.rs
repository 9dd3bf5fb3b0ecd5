//! Per-sample safety-filtered velocity controller
//!
//! `pose sample -> heading -> CBF-QP -> solver -> J^-1 -> command`. The
//! controller keeps no state between calls; the only shared input is the
//! scene snapshot taken at the start of each call.

use std::time::{Duration, Instant};

use nalgebra::Vector2;
use tracing::debug;

use crate::common::{ControlInput, Point2D, Pose2D, PoseSample, QpSolver, RoboticsError, RoboticsResult, VelocityCommand};
use crate::config::{OutputConfig, SceneHandle, SolverConfig};
use crate::control::cbf_qp::build_safety_qp;
use crate::control::orientation::quaternion_to_yaw;
use crate::control::unicycle::UnicycleMapper;

/// Everything one invocation produced, in SI units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlOutput {
    pub input: ControlInput,
    /// Optimal virtual velocity of the lookahead point
    pub virtual_control: Vector2<f64>,
    pub lookahead: Point2D,
    pub barrier: f64,
    pub heading: f64,
}

/// CBF-QP controller generic over the QP backend
pub struct CbfController<S: QpSolver> {
    scene: SceneHandle,
    solver: S,
    budget: Duration,
    quaternion_tolerance: f64,
    output: OutputConfig,
}

impl<S: QpSolver> CbfController<S> {
    pub fn new(scene: SceneHandle, solver: S, solver_config: &SolverConfig, output: OutputConfig) -> Self {
        Self {
            scene,
            solver,
            budget: Duration::from_millis(solver_config.time_limit_ms),
            quaternion_tolerance: solver_config.quaternion_tolerance,
            output,
        }
    }

    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Safe unicycle input for one pose sample
    pub fn compute(&self, sample: &PoseSample) -> RoboticsResult<ControlOutput> {
        sample.validate(self.quaternion_tolerance)?;
        let scene = self.scene.load();
        let mapper = UnicycleMapper::new(scene.lookahead)?;

        let heading = quaternion_to_yaw(&sample.orientation);
        let pose = Pose2D::new(sample.position.x, sample.position.y, heading);
        let qp = build_safety_qp(&pose, &scene);

        let start = Instant::now();
        let u = self.solver.solve(&qp.problem)?;
        let elapsed = start.elapsed();
        if elapsed > self.budget {
            return Err(RoboticsError::SolverTimeout {
                elapsed_us: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
                budget_us: u64::try_from(self.budget.as_micros()).unwrap_or(u64::MAX),
            });
        }
        if !(u[0].is_finite() && u[1].is_finite()) {
            return Err(RoboticsError::NumericalError(format!(
                "{} returned a non-finite solution",
                self.solver.name()
            )));
        }

        let input = mapper.to_unicycle(&u, heading);
        debug!(
            x = pose.x,
            y = pose.y,
            heading,
            barrier = qp.barrier,
            u1 = u[0],
            u2 = u[1],
            v = input.v,
            w = input.omega,
            "safety filter"
        );

        Ok(ControlOutput {
            input,
            virtual_control: u,
            lookahead: qp.lookahead,
            barrier: qp.barrier,
            heading,
        })
    }

    /// Convert to the robot's native units. `seq` is left at 0.
    pub fn to_command(&self, input: &ControlInput) -> VelocityCommand {
        VelocityCommand {
            linear: input.v * self.output.linear_scale,
            angular: input.omega,
            seq: 0,
        }
    }

    /// [`compute`](Self::compute) followed by unit conversion, tagged with
    /// the sample's sequence number
    pub fn command(&self, sample: &PoseSample) -> RoboticsResult<VelocityCommand> {
        let out = self.compute(sample)?;
        Ok(VelocityCommand { seq: sample.seq, ..self.to_command(&out.input) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Point3D, Quaternion};
    use crate::config::SceneConfig;
    use crate::control::cbf_qp::build_safety_qp;
    use crate::solver::{ActiveSetSolver, ClarabelSolver};
    use approx::assert_abs_diff_eq;

    fn solver_config() -> SolverConfig {
        SolverConfig { time_limit_ms: 1000, ..Default::default() }
    }

    fn controller<S: QpSolver>(scene: SceneConfig, solver: S) -> CbfController<S> {
        CbfController::new(SceneHandle::new(scene).unwrap(), solver, &solver_config(), OutputConfig::default())
    }

    #[test]
    fn test_zero_effort_at_goal() {
        // z = (-0.56 + 0.06, 0) = goal
        let sample = PoseSample::from_pose(&Pose2D::new(-0.56, 0.0, 0.0));

        let exact = controller(SceneConfig::default(), ActiveSetSolver::default());
        let cmd = exact.command(&sample).unwrap();
        assert_abs_diff_eq!(cmd.linear, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cmd.angular, 0.0, epsilon = 1e-9);

        let ipm = controller(SceneConfig::default(), ClarabelSolver::new(solver_config()));
        let out = ipm.compute(&sample).unwrap();
        assert_abs_diff_eq!(out.input.v, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.input.omega, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn test_solution_satisfies_constraints() {
        let scene = SceneConfig::default();
        let ctrl = controller(scene.clone(), ClarabelSolver::new(solver_config()));
        let mut checked = 0;
        for i in 0..8 {
            for j in 0..5 {
                let pose = Pose2D::new(-1.0 + 0.4 * i as f64, -1.0 + 0.5 * j as f64, 0.7 * i as f64 - 2.0);
                let qp = build_safety_qp(&pose, &scene);
                if qp.barrier < 0.0 {
                    continue;
                }
                let out = ctrl.compute(&PoseSample::from_pose(&pose)).unwrap();
                assert!(
                    qp.problem.is_feasible(&out.virtual_control, 1e-6),
                    "violation {} at {:?}",
                    qp.problem.max_violation(&out.virtual_control),
                    pose
                );
                checked += 1;
            }
        }
        assert!(checked > 20);
    }

    #[test]
    fn test_output_unit_conversion() {
        let ctrl = controller(SceneConfig::default(), ActiveSetSolver::default());
        // facing the goal from the far side of the obstacle-free half plane
        let sample = PoseSample::from_pose(&Pose2D::new(-0.5, 0.8, -std::f64::consts::FRAC_PI_2));
        let out = ctrl.compute(&sample).unwrap();
        let cmd = ctrl.to_command(&out.input);
        assert_abs_diff_eq!(cmd.linear, out.input.v * 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(cmd.angular, out.input.omega, epsilon = 1e-12);
        assert!(cmd.linear > 0.0);
    }

    #[test]
    fn test_malformed_sample_rejected() {
        let ctrl = controller(SceneConfig::default(), ActiveSetSolver::default());
        let sample = PoseSample::new(Point3D::new(0.0, 0.0, 0.0), Quaternion::new(0.0, 0.0, 0.5, 0.5));
        assert!(matches!(ctrl.command(&sample), Err(RoboticsError::MalformedInput(_))));
    }

    #[test]
    fn test_infeasible_inside_obstacle() {
        // lookahead point next to the obstacle center: escaping needs |u1| > ub
        let sample = PoseSample::from_pose(&Pose2D::new(0.45, 0.0, 0.0));
        let exact = controller(SceneConfig::default(), ActiveSetSolver::default());
        assert!(matches!(exact.command(&sample), Err(RoboticsError::SolverInfeasible(_))));

        let ipm = controller(SceneConfig::default(), ClarabelSolver::new(solver_config()));
        assert!(matches!(ipm.command(&sample), Err(RoboticsError::SolverInfeasible(_))));
    }

    #[test]
    fn test_tighter_radius_shrinks_approach_speed() {
        // z = (1.5, 0) heading at the obstacle, goal behind it
        let pose = Pose2D::new(1.44, 0.0, 0.0);
        let sample = PoseSample::from_pose(&pose);
        let mut last = f64::INFINITY;
        for &radius in [0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 0.99].iter() {
            let mut scene = SceneConfig::default();
            scene.obstacle.radius = radius;
            let ctrl = controller(scene.clone(), ActiveSetSolver::default());
            let out = ctrl.compute(&sample).unwrap();
            // unit vector from z toward the obstacle center is (-1, 0)
            let approach = -out.virtual_control[0];
            let bound = scene.gamma * out.barrier.powi(3) / (2.0 * 1.0);
            assert!(approach <= last + 1e-12);
            assert_abs_diff_eq!(approach, bound.min(1.0), epsilon = 1e-9);
            last = approach;
        }
        assert!(last < 1e-3);
    }

    #[test]
    fn test_scene_replacement_takes_effect() {
        let ctrl = controller(SceneConfig::default(), ActiveSetSolver::default());
        let sample = PoseSample::from_pose(&Pose2D::new(-0.56, 0.0, 0.0));
        assert_abs_diff_eq!(ctrl.compute(&sample).unwrap().input.v, 0.0, epsilon = 1e-9);

        let moved = SceneConfig { goal: Point2D::new(-1.0, 0.0), ..Default::default() };
        ctrl.scene().replace(moved).unwrap();
        // goal now behind the lookahead point along -x, robot facing +x
        assert!(ctrl.compute(&sample).unwrap().input.v < 0.0);
    }

    /// Delegates to the exact solver after sleeping
    struct SlowSolver(std::time::Duration);

    impl QpSolver for SlowSolver {
        fn solve(&self, problem: &crate::solver::QpProblem) -> RoboticsResult<Vector2<f64>> {
            std::thread::sleep(self.0);
            ActiveSetSolver::default().solve(problem)
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[test]
    fn test_overrunning_solve_is_timeout() {
        let ctrl = CbfController::new(
            SceneHandle::new(SceneConfig::default()).unwrap(),
            SlowSolver(Duration::from_millis(30)),
            &SolverConfig { time_limit_ms: 5, ..Default::default() },
            OutputConfig::default(),
        );
        let sample = PoseSample::from_pose(&Pose2D::new(1.5, 0.2, 3.0));
        match ctrl.compute(&sample) {
            Err(RoboticsError::SolverTimeout { elapsed_us, budget_us }) => {
                assert_eq!(budget_us, 5_000);
                assert!(elapsed_us >= 30_000);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_command_echoes_sample_seq() {
        let ctrl = controller(SceneConfig::default(), ActiveSetSolver::default());
        let sample = PoseSample::from_pose(&Pose2D::new(1.5, 0.2, 3.0)).with_seq(42);
        assert_eq!(ctrl.command(&sample).unwrap().seq, 42);
    }
}
