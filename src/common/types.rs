//! Common types used throughout barrier_certificate

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::common::error::{RoboticsError, RoboticsResult};

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

/// 3D point representation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// 2D pose (position + orientation)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose2D {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self { x, y, yaw }
    }

    /// Normalize yaw to [-pi, pi]
    pub fn normalize_yaw(&mut self) {
        while self.yaw > std::f64::consts::PI {
            self.yaw -= 2.0 * std::f64::consts::PI;
        }
        while self.yaw < -std::f64::consts::PI {
            self.yaw += 2.0 * std::f64::consts::PI;
        }
    }
}

/// Orientation quaternion as delivered by the motion-capture system.
///
/// Assumed unit-norm; nothing here re-normalizes it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }

    /// Pure rotation about the world z axis
    pub fn from_yaw(yaw: f64) -> Self {
        let half = 0.5 * yaw;
        Self { x: 0.0, y: 0.0, z: half.sin(), w: half.cos() }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.w.is_finite()
    }
}

/// One pose measurement for one robot: world-frame translation and rotation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub position: Point3D,
    pub orientation: Quaternion,
    /// Measurement sequence number, echoed in the resulting command
    #[serde(default)]
    pub seq: u64,
}

impl PoseSample {
    pub fn new(position: Point3D, orientation: Quaternion) -> Self {
        Self { position, orientation, seq: 0 }
    }

    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    /// Planar sample with a pure-yaw orientation
    pub fn from_pose(pose: &Pose2D) -> Self {
        Self {
            position: Point3D::new(pose.x, pose.y, 0.0),
            orientation: Quaternion::from_yaw(pose.yaw),
            seq: 0,
        }
    }

    /// Reject non-finite components and quaternions further than
    /// `norm_tolerance` from unit length.
    pub fn validate(&self, norm_tolerance: f64) -> RoboticsResult<()> {
        let p = &self.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(RoboticsError::MalformedInput(format!(
                "non-finite position ({}, {}, {})",
                p.x, p.y, p.z
            )));
        }
        if !self.orientation.is_finite() {
            return Err(RoboticsError::MalformedInput(format!(
                "non-finite quaternion {:?}",
                self.orientation
            )));
        }
        let norm = self.orientation.norm();
        if (norm - 1.0).abs() > norm_tolerance {
            return Err(RoboticsError::MalformedInput(format!(
                "quaternion norm {:.6} is not unit (tolerance {})",
                norm, norm_tolerance
            )));
        }
        Ok(())
    }
}

/// Control input for a unicycle / differential drive robot (SI units)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlInput {
    pub v: f64,      // linear velocity [m/s]
    pub omega: f64,  // angular velocity [rad/s]
}

impl ControlInput {
    pub fn new(v: f64, omega: f64) -> Self {
        Self { v, omega }
    }

    pub fn zero() -> Self {
        Self { v: 0.0, omega: 0.0 }
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.v, self.omega)
    }
}

impl From<Vector2<f64>> for ControlInput {
    fn from(v: Vector2<f64>) -> Self {
        Self { v: v[0], omega: v[1] }
    }
}

/// Command in the robot's native units, ready to publish
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityCommand {
    /// Linear speed in native units (mm/s for the Khepera IV)
    pub linear: f64,
    /// Angular rate [rad/s]
    pub angular: f64,
    /// `seq` of the pose sample this command answers
    pub seq: u64,
}

/// Static circular obstacle with its safe radius
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleObstacle {
    pub center: Point2D,
    pub radius: f64,
}

impl CircleObstacle {
    pub fn new(center: Point2D, radius: f64) -> Self {
        Self { center, radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point2d_distance() {
        let p1 = Point2D::new(0.0, 0.0);
        let p2 = Point2D::new(3.0, 4.0);
        assert!((p1.distance(&p2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_pose2d_normalize_yaw() {
        let mut pose = Pose2D::new(0.0, 0.0, 4.0);
        pose.normalize_yaw();
        assert!(pose.yaw >= -std::f64::consts::PI && pose.yaw <= std::f64::consts::PI);
    }

    #[test]
    fn test_quaternion_from_yaw_is_unit() {
        let q = Quaternion::from_yaw(1.234);
        assert!((q.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pose_sample_validate() {
        let ok = PoseSample::from_pose(&Pose2D::new(0.1, 0.2, 0.3));
        assert!(ok.validate(1e-3).is_ok());

        let nan = PoseSample::new(Point3D::new(f64::NAN, 0.0, 0.0), Quaternion::identity());
        assert!(matches!(nan.validate(1e-3), Err(RoboticsError::MalformedInput(_))));

        let scaled = PoseSample::new(Point3D::new(0.0, 0.0, 0.0), Quaternion::new(0.0, 0.0, 0.0, 2.0));
        assert!(matches!(scaled.validate(1e-3), Err(RoboticsError::MalformedInput(_))));

        let inf = PoseSample::new(
            Point3D::new(0.0, 0.0, 0.0),
            Quaternion::new(0.0, 0.0, f64::INFINITY, 1.0),
        );
        assert!(matches!(inf.validate(1e-3), Err(RoboticsError::MalformedInput(_))));
    }
}
