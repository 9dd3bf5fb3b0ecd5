//! Control algorithms module
//!
//! CBF-QP safety filter for a unicycle tracking a goal past a circular
//! obstacle: heading decoding, QP construction, the feedback-linearization
//! map and the controller that chains them.

pub mod orientation;
pub mod cbf_qp;
pub mod unicycle;
pub mod safety_filter;

pub use orientation::quaternion_to_yaw;
pub use cbf_qp::{barrier_value, build_safety_qp, lookahead_point, nominal_control, SafetyQp};
pub use unicycle::UnicycleMapper;
pub use safety_filter::{CbfController, ControlOutput};
