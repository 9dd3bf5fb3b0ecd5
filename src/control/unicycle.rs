//! Feedback-linearization map between the lookahead point and the unicycle
//!
//! For a unicycle with speed `V` and turn rate `W`, the point `d` ahead of
//! the center moves with
//!
//! ```text
//! z' = R(theta) diag(1, d) [V, W]' = J [V, W]'
//! ```
//!
//! `det J = d`, so the map is invertible exactly when `d != 0`.

use nalgebra::{Matrix2, Vector2};

use crate::common::{ControlInput, RoboticsError, RoboticsResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnicycleMapper {
    d: f64,
}

impl UnicycleMapper {
    /// Fails with [`RoboticsError::SingularMapping`] for `d == 0` or a
    /// non-finite offset.
    pub fn new(d: f64) -> RoboticsResult<Self> {
        if d == 0.0 || !d.is_finite() {
            return Err(RoboticsError::SingularMapping(d));
        }
        Ok(Self { d })
    }

    fn rotation(theta: f64) -> Matrix2<f64> {
        let (s, c) = theta.sin_cos();
        Matrix2::new(c, -s, s, c)
    }

    /// `J = R(theta) diag(1, d)`
    pub fn jacobian(&self, theta: f64) -> Matrix2<f64> {
        Self::rotation(theta) * Matrix2::new(1.0, 0.0, 0.0, self.d)
    }

    /// `(V, W) = J^-1 u`, evaluated as `diag(1, 1/d) R(theta)' u`
    pub fn to_unicycle(&self, u: &Vector2<f64>, theta: f64) -> ControlInput {
        let body = Self::rotation(theta).transpose() * u;
        ControlInput::from(Vector2::new(body[0], body[1] / self.d))
    }

    /// `u = J (V, W)`
    pub fn to_virtual(&self, input: &ControlInput, theta: f64) -> Vector2<f64> {
        self.jacobian(theta) * input.to_vector()
    }
}
