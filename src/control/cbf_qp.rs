//! Control-barrier-function safety filter as a QP
//!
//! The unicycle is controlled through a point `z` a distance `d` ahead of its
//! center, which behaves like a single integrator `z' = u`. A proportional
//! law pulls `z` to the goal; the QP
//!
//! ```text
//! minimize   |u - u_nom|^2
//! subject to -grad h(z)' u <= gamma h(z)^3
//!            -ub <= u <= ub
//! ```
//!
//! returns the closest velocity to the nominal one that keeps
//! `h(z) = |z - c|^2 - r^2` from dropping faster than `gamma h^3`.
//!
//! Ref:
//!     - A. D. Ames et al., "Control Barrier Functions: Theory and Applications", ECC 2019

use nalgebra::{Matrix2, Matrix5x2, Vector2, Vector5};

use crate::common::{CircleObstacle, Point2D, Pose2D};
use crate::config::SceneConfig;
use crate::solver::QpProblem;

/// Point on the heading axis `d` ahead of the robot center
pub fn lookahead_point(pose: &Pose2D, d: f64) -> Point2D {
    Point2D::new(pose.x + d * pose.yaw.cos(), pose.y + d * pose.yaw.sin())
}

/// Squared-distance safety margin; non-negative outside the obstacle
pub fn barrier_value(z: &Point2D, obstacle: &CircleObstacle) -> f64 {
    (z.x - obstacle.center.x).powi(2) + (z.y - obstacle.center.y).powi(2) - obstacle.radius.powi(2)
}

/// Proportional goal-tracking velocity for the lookahead point
pub fn nominal_control(z: &Point2D, scene: &SceneConfig) -> Vector2<f64> {
    -scene.kp * (z.to_vector() - scene.goal.to_vector())
}

/// A built safety-filter QP and the quantities it was built from
#[derive(Debug, Clone, PartialEq)]
pub struct SafetyQp {
    pub problem: QpProblem,
    pub lookahead: Point2D,
    pub barrier: f64,
    pub nominal: Vector2<f64>,
}

/// Build the CBF-QP for one pose.
///
/// Row 0 is the barrier constraint, rows 1..5 bound each virtual velocity
/// component to `[-ub_i, ub_i]`.
pub fn build_safety_qp(pose: &Pose2D, scene: &SceneConfig) -> SafetyQp {
    let z = lookahead_point(pose, scene.lookahead);
    let h = barrier_value(&z, &scene.obstacle);
    let nominal = nominal_control(&z, scene);

    let p = Matrix2::identity() * 2.0;
    let q = -2.0 * nominal;

    // cube keeps the sign of h
    let a = Vector2::new(
        -2.0 * (z.x - scene.obstacle.center.x),
        -2.0 * (z.y - scene.obstacle.center.y),
    );
    let b = scene.gamma * h.powi(3);

    let g = Matrix5x2::new(
        a[0], a[1],
        1.0, 0.0,
        0.0, 1.0,
        -1.0, 0.0,
        0.0, -1.0,
    );
    let [ub1, ub2] = scene.velocity_bound;
    let h_vec = Vector5::new(b, ub1, ub2, ub1, ub2);

    SafetyQp {
        problem: QpProblem { p, q, g, h: h_vec },
        lookahead: z,
        barrier: h,
        nominal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_lookahead_point() {
        let z = lookahead_point(&Pose2D::new(1.0, 2.0, std::f64::consts::FRAC_PI_2), 0.06);
        assert_abs_diff_eq!(z.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(z.y, 2.06, epsilon = 1e-12);
    }

    #[test]
    fn test_barrier_sign() {
        let obstacle = CircleObstacle::new(Point2D::new(0.5, 0.0), 0.5);
        assert!(barrier_value(&Point2D::new(-0.5, 0.0), &obstacle) > 0.0);
        assert_abs_diff_eq!(barrier_value(&Point2D::new(1.0, 0.0), &obstacle), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(barrier_value(&Point2D::new(0.5, 0.0), &obstacle), -0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_matrices_match_reference_layout() {
        let scene = SceneConfig::default();
        let qp = build_safety_qp(&Pose2D::new(1.44, 0.0, 0.0), &scene);
        // z = (1.5, 0), h = 1 - 0.25
        assert_abs_diff_eq!(qp.lookahead.x, 1.5, epsilon = 1e-12);
        assert_abs_diff_eq!(qp.barrier, 0.75, epsilon = 1e-12);
        assert_abs_diff_eq!(qp.nominal[0], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(qp.nominal[1], 0.0, epsilon = 1e-12);

        let p = &qp.problem;
        assert_eq!(p.p, Matrix2::new(2.0, 0.0, 0.0, 2.0));
        assert_abs_diff_eq!(p.q[0], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.g[(0, 0)], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.g[(0, 1)], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.h[0], 3.0 * 0.75_f64.powi(3), epsilon = 1e-12);
        assert_eq!(p.g.row(1)[0], 1.0);
        assert_eq!(p.g.row(2)[1], 1.0);
        assert_eq!(p.g.row(3)[0], -1.0);
        assert_eq!(p.g.row(4)[1], -1.0);
        assert_eq!(p.h.rows(1, 4).iter().copied().collect::<Vec<_>>(), vec![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_bound_goes_negative_inside_obstacle() {
        let scene = SceneConfig::default();
        let qp = build_safety_qp(&Pose2D::new(0.44, 0.0, 0.0), &scene);
        assert!(qp.barrier < 0.0);
        assert!(qp.problem.h[0] < 0.0);
        assert!(!qp.problem.is_feasible(&Vector2::zeros(), 0.0));
    }

    #[test]
    fn test_zero_is_feasible_when_safe() {
        let scene = SceneConfig::default();
        for &(x, y, yaw) in [(1.5, 0.3, 3.0), (-0.2, 0.8, -1.0), (0.5, -1.2, 1.57)].iter() {
            let qp = build_safety_qp(&Pose2D::new(x, y, yaw), &scene);
            assert!(qp.barrier >= 0.0);
            assert!(qp.problem.is_feasible(&Vector2::zeros(), 0.0));
        }
    }

    #[test]
    fn test_asymmetric_velocity_bound_rows() {
        let scene = SceneConfig { velocity_bound: [0.3, 0.7], ..Default::default() };
        let p = build_safety_qp(&Pose2D::new(1.44, 0.0, 0.0), &scene).problem;
        // u1 <= ub1, u2 <= ub2, -u1 <= ub1, -u2 <= ub2
        assert_eq!(p.h.rows(1, 4).iter().copied().collect::<Vec<_>>(), vec![0.3, 0.7, 0.3, 0.7]);
        assert!(p.is_feasible(&Vector2::new(0.3, -0.7), 1e-12));
        assert!(!p.is_feasible(&Vector2::new(0.0, 0.71), 1e-12));
        assert!(!p.is_feasible(&Vector2::new(-0.31, 0.0), 1e-12));
    }

    #[test]
    fn test_unconstrained_minimizer_is_nominal() {
        let scene = SceneConfig::default();
        let qp = build_safety_qp(&Pose2D::new(-0.3, 0.4, 0.7), &scene);
        let u = qp.problem.unconstrained_minimizer().unwrap();
        assert_abs_diff_eq!(u[0], qp.nominal[0], epsilon = 1e-12);
        assert_abs_diff_eq!(u[1], qp.nominal[1], epsilon = 1e-12);
    }
}
