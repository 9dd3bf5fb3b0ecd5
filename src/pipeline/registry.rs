//! Robot identities, discovery and the command-channel registry

use std::collections::BTreeMap;
use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::info;

use crate::common::{CommandSink, RobotDiscovery, RoboticsError, RoboticsResult, VelocityCommand};
use crate::config::RobotEntry;

/// Identifier of one tracked robot (e.g. the last octet of its IP, "k101")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RobotId(pub String);

impl RobotId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discovery over a fixed, configured list of robots
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    ids: Vec<RobotId>,
}

impl StaticDiscovery {
    pub fn new(ids: Vec<RobotId>) -> Self {
        Self { ids }
    }

    pub fn from_entries(entries: &[RobotEntry]) -> Self {
        Self { ids: entries.iter().map(|e| RobotId::new(e.id.clone())).collect() }
    }
}

impl RobotDiscovery for StaticDiscovery {
    fn discover(&self) -> RoboticsResult<Vec<RobotId>> {
        Ok(self.ids.clone())
    }
}

impl CommandSink for Sender<VelocityCommand> {
    fn publish(&self, command: VelocityCommand) -> bool {
        self.try_send(command).is_ok()
    }
}

/// Command channel per robot, fixed after construction
#[derive(Debug)]
pub struct RobotRegistry {
    sinks: BTreeMap<RobotId, Sender<VelocityCommand>>,
}

impl RobotRegistry {
    /// Run discovery once and open a bounded command channel per robot.
    ///
    /// Returns the registry together with the receiving ends, which belong
    /// to whatever forwards commands to the robots.
    pub fn discover(
        discovery: &dyn RobotDiscovery,
        capacity: usize,
    ) -> RoboticsResult<(Self, BTreeMap<RobotId, Receiver<VelocityCommand>>)> {
        let ids = discovery.discover()?;
        let mut sinks = BTreeMap::new();
        let mut receivers = BTreeMap::new();
        for id in ids {
            if sinks.contains_key(&id) {
                return Err(RoboticsError::DuplicateRobot(id.0));
            }
            let (tx, rx) = bounded(capacity);
            sinks.insert(id.clone(), tx);
            receivers.insert(id, rx);
        }
        info!(
            robots = sinks.len(),
            "robot set fixed at startup; robots joining later are not tracked"
        );
        Ok((Self { sinks }, receivers))
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    pub fn contains(&self, id: &RobotId) -> bool {
        self.sinks.contains_key(id)
    }

    pub fn sink(&self, id: &RobotId) -> RoboticsResult<&Sender<VelocityCommand>> {
        self.sinks
            .get(id)
            .ok_or_else(|| RoboticsError::UnknownRobot(id.0.clone()))
    }

    pub(crate) fn into_sinks(self) -> BTreeMap<RobotId, Sender<VelocityCommand>> {
        self.sinks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Pose2D;

    #[test]
    fn test_registry_from_entries() {
        let entries = vec![
            RobotEntry { id: "k101".into(), start: Pose2D::new(0.0, 0.0, 0.0) },
            RobotEntry { id: "k102".into(), start: Pose2D::new(1.0, 0.0, 0.0) },
        ];
        let (registry, receivers) =
            RobotRegistry::discover(&StaticDiscovery::from_entries(&entries), 4).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(receivers.len(), 2);
        assert!(registry.contains(&RobotId::new("k102")));
        assert!(matches!(
            registry.sink(&RobotId::new("k999")),
            Err(RoboticsError::UnknownRobot(_))
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let discovery = StaticDiscovery::new(vec![RobotId::new("k101"), RobotId::new("k101")]);
        assert!(matches!(
            RobotRegistry::discover(&discovery, 4),
            Err(RoboticsError::DuplicateRobot(_))
        ));
    }

    #[test]
    fn test_sink_drops_when_full() {
        let discovery = StaticDiscovery::new(vec![RobotId::new("k101")]);
        let (registry, receivers) = RobotRegistry::discover(&discovery, 1).unwrap();
        let sink = registry.sink(&RobotId::new("k101")).unwrap();
        let cmd = VelocityCommand { linear: 100.0, angular: 0.1, seq: 0 };
        assert!(sink.publish(cmd));
        assert!(!sink.publish(cmd));
        assert_eq!(receivers[&RobotId::new("k101")].try_recv().unwrap(), cmd);
    }
}
