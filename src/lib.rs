//! barrier_certificate - CBF-QP safety filter for unicycle robots
//!
//! For every pose sample of every tracked robot this crate computes one safe
//! velocity command: the heading is decoded from the motion-capture
//! quaternion, a control-barrier-function QP filters a proportional
//! goal-tracking law so the robot stays clear of a circular obstacle, and the
//! resulting virtual velocity is mapped back to unicycle speed and turn rate.

// Core modules
pub mod common;
pub mod config;

// Algorithm modules
pub mod control;
pub mod solver;

// Runtime
pub mod pipeline;
pub mod simulation;

// Re-export common types for convenience
pub use common::{Point2D, Pose2D, PoseSample, Quaternion, ControlInput, VelocityCommand, CircleObstacle};
pub use common::{QpSolver, RobotDiscovery, CommandSink};
pub use common::{RoboticsError, RoboticsResult};
pub use config::{AppConfig, SceneConfig, SceneHandle};
pub use control::{CbfController, ControlOutput};
