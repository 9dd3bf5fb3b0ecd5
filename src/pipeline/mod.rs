//! Fan-out of pose samples to per-robot controller workers
//!
//! The robot set is discovered once at startup. Each robot gets its own
//! worker thread, pose channel and command channel; workers share only the
//! controller (and through it the read-only scene snapshot), so a failed
//! cycle for one robot never affects another.

pub mod registry;
pub mod dispatcher;

pub use registry::{RobotId, RobotRegistry, StaticDiscovery};
pub use dispatcher::{await_command, process_sample, Dispatcher, WorkerStats};
