//! One worker thread per robot

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use crate::common::{CommandSink, PoseSample, QpSolver, RoboticsError, RoboticsResult, VelocityCommand};
use crate::control::CbfController;
use crate::pipeline::registry::{RobotId, RobotRegistry};

/// Per-robot counters, returned when the worker stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Samples taken off the pose channel
    pub processed: u64,
    /// Commands accepted by the sink
    pub emitted: u64,
    /// Cycles skipped because the sample could not be turned into a safe command
    pub skipped: u64,
    /// Commands computed but dropped by a full sink
    pub dropped: u64,
}

/// Run one pipeline cycle for `robot` and publish the result.
///
/// A failed cycle emits nothing: the last command is never resent, since
/// its safety certificate belongs to an older pose.
pub fn process_sample<S: QpSolver>(
    controller: &CbfController<S>,
    robot: &RobotId,
    sample: &PoseSample,
    sink: &dyn CommandSink,
    stats: &mut WorkerStats,
) {
    stats.processed += 1;
    match controller.command(sample) {
        Ok(command) => {
            if sink.publish(command) {
                stats.emitted += 1;
            } else {
                stats.dropped += 1;
                debug!(robot = %robot, "command channel full, command dropped");
            }
        }
        Err(err) => {
            stats.skipped += 1;
            warn!(robot = %robot, error = %err, "skipping control cycle");
        }
    }
}

/// Wait up to `timeout` for the command answering sample `seq`.
///
/// Commands for earlier samples that arrive late are discarded, so a robot
/// never executes a command certified for a pose it has already left.
pub fn await_command(
    rx: &Receiver<VelocityCommand>,
    seq: u64,
    timeout: Duration,
) -> Option<VelocityCommand> {
    let deadline = Instant::now() + timeout;
    loop {
        match rx.recv_deadline(deadline) {
            Ok(cmd) if cmd.seq == seq => return Some(cmd),
            Ok(cmd) => debug!(stale = cmd.seq, expected = seq, "discarding late command"),
            Err(_) => return None,
        }
    }
}

/// Routes pose samples to per-robot workers
pub struct Dispatcher {
    pose_senders: BTreeMap<RobotId, Sender<PoseSample>>,
    workers: Vec<(RobotId, JoinHandle<WorkerStats>)>,
}

impl Dispatcher {
    /// Spawn a worker for every robot in the registry
    pub fn spawn<S: QpSolver + 'static>(
        controller: Arc<CbfController<S>>,
        registry: RobotRegistry,
        pose_capacity: usize,
    ) -> RoboticsResult<Self> {
        let mut pose_senders = BTreeMap::new();
        let mut workers = Vec::with_capacity(registry.len());

        for (robot, sink) in registry.into_sinks() {
            let (pose_tx, pose_rx) = bounded::<PoseSample>(pose_capacity);
            let worker_ctrl = Arc::clone(&controller);
            let worker_id = robot.clone();
            let handle = thread::Builder::new()
                .name(format!("cbf-{}", robot))
                .spawn(move || {
                    let mut stats = WorkerStats::default();
                    for sample in pose_rx.iter() {
                        process_sample(&worker_ctrl, &worker_id, &sample, &sink, &mut stats);
                    }
                    stats
                })?;
            info!(robot = %robot, solver = controller.solver().name(), "controller worker started");
            pose_senders.insert(robot.clone(), pose_tx);
            workers.push((robot, handle));
        }

        Ok(Self { pose_senders, workers })
    }

    /// Hand a sample to the robot's worker.
    ///
    /// Returns `Ok(false)` when the worker is backed up and the sample was
    /// dropped; the next sample supersedes it anyway.
    pub fn submit(&self, robot: &RobotId, sample: PoseSample) -> RoboticsResult<bool> {
        let tx = self
            .pose_senders
            .get(robot)
            .ok_or_else(|| RoboticsError::UnknownRobot(robot.0.clone()))?;
        match tx.try_send(sample) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                debug!(robot = %robot, "pose channel full, sample dropped");
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => {
                error!(robot = %robot, "controller worker is gone");
                Ok(false)
            }
        }
    }

    /// Close every pose channel, wait for the workers and collect their stats
    pub fn shutdown(self) -> BTreeMap<RobotId, WorkerStats> {
        drop(self.pose_senders);
        let mut stats = BTreeMap::new();
        for (robot, handle) in self.workers {
            match handle.join() {
                Ok(s) => {
                    info!(
                        robot = %robot,
                        processed = s.processed,
                        emitted = s.emitted,
                        skipped = s.skipped,
                        dropped = s.dropped,
                        "controller worker stopped"
                    );
                    stats.insert(robot, s);
                }
                Err(_) => {
                    error!(robot = %robot, "controller worker panicked");
                    stats.insert(robot, WorkerStats::default());
                }
            }
        }
        stats
    }
}
