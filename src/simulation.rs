//! Closed-loop simulation of a unicycle under the safety filter
//!
//! Stands in for the motion-capture loop when no robot is attached: the
//! pose is integrated with Euler kinematics and fed back as a sample.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::common::{ControlInput, Pose2D, PoseSample, QpSolver, RoboticsError, RoboticsResult};
use crate::control::CbfController;

/// Unicycle kinematics `x' = V cos th, y' = V sin th, th' = W`
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicycleModel;

impl UnicycleModel {
    pub fn step(&self, pose: &Pose2D, input: &ControlInput, dt: f64) -> Pose2D {
        let mut next = Pose2D::new(
            pose.x + input.v * pose.yaw.cos() * dt,
            pose.y + input.v * pose.yaw.sin() * dt,
            pose.yaw + input.omega * dt,
        );
        next.normalize_yaw();
        next
    }
}

/// Gaussian measurement noise on position and heading
#[derive(Debug, Clone, Copy)]
pub struct PoseNoise {
    position: Normal<f64>,
    heading: Normal<f64>,
}

impl PoseNoise {
    pub fn new(position_std: f64, heading_std: f64) -> RoboticsResult<Self> {
        let position = Normal::new(0.0, position_std)
            .map_err(|e| RoboticsError::InvalidParameter(format!("position noise: {}", e)))?;
        let heading = Normal::new(0.0, heading_std)
            .map_err(|e| RoboticsError::InvalidParameter(format!("heading noise: {}", e)))?;
        Ok(Self { position, heading })
    }

    pub fn perturb<R: Rng + ?Sized>(&self, pose: &Pose2D, rng: &mut R) -> Pose2D {
        Pose2D::new(
            pose.x + self.position.sample(rng),
            pose.y + self.position.sample(rng),
            pose.yaw + self.heading.sample(rng),
        )
    }
}

/// One simulated control period
#[derive(Debug, Clone, Copy)]
pub struct TrajectoryStep {
    pub time: f64,
    pub pose: Pose2D,
    /// Barrier value at the lookahead point, `None` if the cycle was skipped
    pub barrier: Option<f64>,
    /// Applied input; zero on a skipped cycle
    pub input: ControlInput,
}

#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub steps: Vec<TrajectoryStep>,
    pub skipped: usize,
}

impl Trajectory {
    pub fn xy(&self) -> Vec<(f64, f64)> {
        self.steps.iter().map(|s| (s.pose.x, s.pose.y)).collect()
    }

    pub fn final_pose(&self) -> Option<Pose2D> {
        self.steps.last().map(|s| s.pose)
    }

    /// Smallest barrier value over the solved cycles
    pub fn min_barrier(&self) -> Option<f64> {
        self.steps
            .iter()
            .filter_map(|s| s.barrier)
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Run `steps` control periods from `start` without measurement noise
pub fn simulate<S: QpSolver>(
    controller: &CbfController<S>,
    start: Pose2D,
    steps: usize,
    dt: f64,
) -> Trajectory {
    // noise is off, the generator is never drawn from
    let mut rng = StdRng::seed_from_u64(0);
    simulate_with_noise(controller, start, steps, dt, None, &mut rng)
}

/// Like [`simulate`], with the controller seeing noisy poses.
///
/// A skipped cycle holds the robot still for that period.
pub fn simulate_with_noise<S: QpSolver, R: Rng + ?Sized>(
    controller: &CbfController<S>,
    start: Pose2D,
    steps: usize,
    dt: f64,
    noise: Option<&PoseNoise>,
    rng: &mut R,
) -> Trajectory {
    let model = UnicycleModel;
    let mut trajectory = Trajectory { steps: Vec::with_capacity(steps), skipped: 0 };
    let mut pose = start;

    for k in 0..steps {
        let measured = match noise {
            Some(n) => n.perturb(&pose, rng),
            None => pose,
        };
        let (barrier, input) = match controller.compute(&PoseSample::from_pose(&measured)) {
            Ok(out) => (Some(out.barrier), out.input),
            Err(_) => {
                trajectory.skipped += 1;
                (None, ControlInput::zero())
            }
        };
        trajectory.steps.push(TrajectoryStep { time: k as f64 * dt, pose, barrier, input });
        pose = model.step(&pose, &input, dt);
    }
    trajectory
}
