//! Startup configuration
//!
//! Everything the control law needs is collected in [`SceneConfig`], built
//! once at startup and shared read-only by every pipeline invocation. The
//! surrounding [`AppConfig`] adds solver limits, output units and the static
//! robot list, and is loaded from a TOML file.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::common::{CircleObstacle, Point2D, Pose2D, RoboticsError, RoboticsResult};

/// Scene and gain parameters of the CBF-QP controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Static obstacle; `radius` is the safe radius r_o
    pub obstacle: CircleObstacle,
    /// Goal for the lookahead point
    pub goal: Point2D,
    /// Proportional gain of the nominal tracking controller
    pub kp: f64,
    /// Class-K gain of the barrier constraint
    pub gamma: f64,
    /// Lookahead offset d [m] along the heading axis
    pub lookahead: f64,
    /// Per-axis bound on the virtual velocity [m/s]
    pub velocity_bound: [f64; 2],
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            obstacle: CircleObstacle::new(Point2D::new(0.5, 0.0), 0.5),
            goal: Point2D::new(-0.5, 0.0),
            kp: 1.0,
            gamma: 3.0,
            lookahead: 0.06,
            velocity_bound: [1.0, 1.0],
        }
    }
}

impl SceneConfig {
    /// Reject configurations the controller cannot run with.
    ///
    /// `lookahead == 0` is reported as [`RoboticsError::SingularMapping`].
    pub fn validate(&self) -> RoboticsResult<()> {
        let finite = [
            self.obstacle.center.x,
            self.obstacle.center.y,
            self.obstacle.radius,
            self.goal.x,
            self.goal.y,
            self.kp,
            self.gamma,
            self.lookahead,
            self.velocity_bound[0],
            self.velocity_bound[1],
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err(RoboticsError::InvalidParameter(
                "scene parameters must be finite".to_string(),
            ));
        }
        if self.lookahead == 0.0 {
            return Err(RoboticsError::SingularMapping(self.lookahead));
        }
        if self.lookahead < 0.0 {
            return Err(RoboticsError::InvalidParameter(format!(
                "lookahead must be positive, got {}",
                self.lookahead
            )));
        }
        if self.kp <= 0.0 {
            return Err(RoboticsError::InvalidParameter(format!("kp must be positive, got {}", self.kp)));
        }
        if self.gamma <= 0.0 {
            return Err(RoboticsError::InvalidParameter(format!(
                "gamma must be positive, got {}",
                self.gamma
            )));
        }
        if self.obstacle.radius <= 0.0 {
            return Err(RoboticsError::InvalidParameter(format!(
                "obstacle radius must be positive, got {}",
                self.obstacle.radius
            )));
        }
        if self.velocity_bound.iter().any(|&ub| ub <= 0.0) {
            return Err(RoboticsError::InvalidParameter(format!(
                "velocity bounds must be positive, got {:?}",
                self.velocity_bound
            )));
        }
        Ok(())
    }
}

/// QP solver limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Interior-point iteration cap
    pub max_iter: u32,
    /// Wall-clock budget per solve [ms]
    pub time_limit_ms: u64,
    /// Feasibility / optimality tolerance
    pub tolerance: f64,
    /// Allowed deviation of |q| from 1 before a sample is rejected
    pub quaternion_tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iter: 200,
            time_limit_ms: 10,
            tolerance: 1e-8,
            quaternion_tolerance: 1e-3,
        }
    }
}

/// Output unit conversion and channel sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Factor from m/s to the robot's native linear unit (1000: mm/s)
    pub linear_scale: f64,
    /// Capacity of each per-robot command channel
    pub channel_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            linear_scale: 1000.0,
            channel_capacity: 10,
        }
    }
}

/// One statically configured robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotEntry {
    pub id: String,
    /// Initial pose, used only by the simulator
    pub start: Pose2D,
}

/// Top-level application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scene: SceneConfig,
    pub solver: SolverConfig,
    pub output: OutputConfig,
    pub robots: Vec<RobotEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            solver: SolverConfig::default(),
            output: OutputConfig::default(),
            robots: vec![
                RobotEntry { id: "k101".to_string(), start: Pose2D::new(1.5, 0.1, std::f64::consts::PI) },
                RobotEntry { id: "k102".to_string(), start: Pose2D::new(1.3, -0.4, 2.8) },
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> RoboticsResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> RoboticsResult<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> RoboticsResult<()> {
        self.scene.validate()?;
        if self.solver.time_limit_ms == 0 || self.solver.max_iter == 0 {
            return Err(RoboticsError::InvalidParameter(
                "solver time limit and iteration cap must be non-zero".to_string(),
            ));
        }
        if !(self.solver.tolerance > 0.0 && self.solver.quaternion_tolerance > 0.0) {
            return Err(RoboticsError::InvalidParameter(
                "solver tolerances must be positive".to_string(),
            ));
        }
        if !(self.output.linear_scale.is_finite() && self.output.linear_scale > 0.0) {
            return Err(RoboticsError::InvalidParameter(format!(
                "linear_scale must be positive, got {}",
                self.output.linear_scale
            )));
        }
        if self.output.channel_capacity == 0 {
            return Err(RoboticsError::InvalidParameter(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared, atomically replaceable view of the scene.
///
/// Readers take an `Arc` snapshot per invocation; a replacement is validated
/// before the swap, so no invocation ever sees a half-updated scene.
#[derive(Debug, Clone)]
pub struct SceneHandle {
    inner: Arc<RwLock<Arc<SceneConfig>>>,
}

impl SceneHandle {
    pub fn new(scene: SceneConfig) -> RoboticsResult<Self> {
        scene.validate()?;
        Ok(Self { inner: Arc::new(RwLock::new(Arc::new(scene))) })
    }

    /// Current snapshot
    pub fn load(&self) -> Arc<SceneConfig> {
        Arc::clone(&*self.inner.read())
    }

    /// Swap in a new scene. The old one stays alive for in-flight readers.
    pub fn replace(&self, scene: SceneConfig) -> RoboticsResult<()> {
        scene.validate()?;
        *self.inner.write() = Arc::new(scene);
        Ok(())
    }
}
