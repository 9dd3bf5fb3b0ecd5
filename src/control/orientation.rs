//! Heading from a motion-capture quaternion

use std::f64::consts::PI;

use crate::common::Quaternion;

/// Yaw of the roll-pitch-yaw decomposition, in (-pi, pi].
///
/// The quaternion is taken as given; a non-unit input yields a defined but
/// geometrically wrong angle.
pub fn quaternion_to_yaw(q: &Quaternion) -> f64 {
    let t3 = 2.0 * (q.w * q.z + q.x * q.y);
    let t4 = 1.0 - 2.0 * (q.y * q.y + q.z * q.z);
    let yaw = t3.atan2(t4);
    if yaw <= -PI {
        yaw + 2.0 * PI
    } else {
        yaw
    }
}
