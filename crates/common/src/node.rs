use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::range::{total_slots, SlotRange};

/// `ParentId` value carried by shard roots.
pub const ROOT_PARENT: &str = "-";

/// Replication role reported by the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Master => write!(f, "master"),
            Role::Slave => write!(f, "slave"),
        }
    }
}

/// Controller-side lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Running,
    Offline,
    WaitFailoverBegin,
    WaitFailoverEnd,
}

impl NodeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeState::Running => "RUNNING",
            NodeState::Offline => "OFFLINE",
            NodeState::WaitFailoverBegin => "WAIT_FAILOVER_BEGIN",
            NodeState::WaitFailoverEnd => "WAIT_FAILOVER_END",
        }
    }

    /// True while a failover is in flight for this node.
    pub fn in_failover(&self) -> bool {
        matches!(
            self,
            NodeState::WaitFailoverBegin | NodeState::WaitFailoverEnd
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runtime counters forwarded untouched from the node's INFO output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeMetrics {
    pub repl_offset: i64,
    pub keys: i64,
    pub instantaneous_ops_per_sec: i64,
    pub instantaneous_input_kbps: f64,
    pub instantaneous_output_kbps: f64,
    pub used_memory: i64,
    pub master_link_status: String,
    pub rdb_bgsave_in_progress: bool,
}

/// Point-in-time heartbeat describing one cluster process.
///
/// Unknown transport fields (`Room`, `PFail`, message counters, ...) are
/// ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeSnapshot {
    pub id: String,
    pub parent_id: String,
    pub role: Role,
    pub region: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub fail: bool,
    #[serde(default)]
    pub readable: bool,
    #[serde(default)]
    pub writable: bool,
    pub state: NodeState,
    #[serde(default)]
    pub free: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub ranges: Vec<SlotRange>,
    #[serde(flatten)]
    pub metrics: NodeMetrics,
}

// Nil slices arrive as `null`.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<SlotRange>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<SlotRange>>::deserialize(deserializer)?.unwrap_or_default())
}

impl NodeSnapshot {
    /// Running, read/write node with no slots and zeroed metrics.
    pub fn new(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        role: Role,
        region: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id: parent_id.into(),
            role,
            region: region.into(),
            zone: String::new(),
            ip: String::new(),
            port: 0,
            tag: String::new(),
            version: 0,
            fail: false,
            readable: true,
            writable: true,
            state: NodeState::Running,
            free: false,
            ranges: Vec::new(),
            metrics: NodeMetrics::default(),
        }
    }

    /// Shard root: a master whose parent is `-`.
    pub fn root(id: impl Into<String>, region: impl Into<String>) -> Self {
        Self::new(id, ROOT_PARENT, Role::Master, region)
    }

    /// Slave replicating from `parent_id`.
    pub fn replica(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let mut node = Self::new(id, parent_id, Role::Slave, region);
        node.writable = false;
        node
    }

    pub fn with_ranges(mut self, ranges: Vec<SlotRange>) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn with_fail(mut self, fail: bool) -> Self {
        self.fail = fail;
        self
    }

    pub fn with_free(mut self, free: bool) -> Self {
        self.free = free;
        self
    }

    pub fn with_state(mut self, state: NodeState) -> Self {
        self.state = state;
        self
    }

    pub fn with_addr(mut self, ip: impl Into<String>, port: u16) -> Self {
        self.ip = ip.into();
        self.port = port;
        self
    }

    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = zone.into();
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id == ROOT_PARENT
    }

    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    /// Identity of the shard this node belongs to.
    pub fn shard_key(&self) -> &str {
        if self.is_root() {
            &self.id
        } else {
            &self.parent_id
        }
    }

    pub fn owns_slots(&self) -> bool {
        !self.ranges.is_empty()
    }

    pub fn total_slots(&self) -> u32 {
        total_slots(&self.ranges)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }

    /// Traffic permissions as `r/w`, `r/-`, `-/w` or `-/-`.
    pub fn mode(&self) -> &'static str {
        match (self.readable, self.writable) {
            (true, true) => "r/w",
            (true, false) => "r/-",
            (false, true) => "-/w",
            (false, false) => "-/-",
        }
    }

    pub fn health(&self) -> &'static str {
        if self.fail {
            "fail"
        } else {
            "ok"
        }
    }

    /// Replication link status; only meaningful for slaves.
    pub fn link_status(&self) -> Option<&str> {
        match self.role {
            Role::Slave => Some(self.metrics.master_link_status.as_str()),
            Role::Master => None,
        }
    }

    pub fn link_down(&self) -> bool {
        self.link_status() == Some("down")
    }

    pub fn used_memory_gib(&self) -> f64 {
        self.metrics.used_memory as f64 / (1024.0 * 1024.0 * 1024.0)
    }

    /// First ten characters of the id, as operators read them.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(10) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEARTBEAT: &str = r#"{
        "Id": "a1b2c3d4e5f6a7b8c9d0",
        "ParentId": "-",
        "Role": "master",
        "Region": "bj",
        "Zone": "bj-1",
        "Room": "r10",
        "PFail": false,
        "Ip": "10.0.0.1",
        "Port": 7000,
        "Tag": "t1",
        "Version": 3,
        "Fail": false,
        "Readable": true,
        "Writable": true,
        "State": "RUNNING",
        "Free": false,
        "Ranges": [{"Left": 0, "Right": 8191}],
        "ReplOffset": 1024,
        "Keys": 77,
        "InstantaneousOpsPerSec": 15,
        "InstantaneousInputKbps": 1.5,
        "InstantaneousOutputKbps": 2.25,
        "UsedMemory": 1073741824,
        "MasterLinkStatus": "",
        "RdbBgsaveInProgress": false,
        "ClusterStatsMessagesSent": 12
    }"#;

    #[test]
    fn test_decode_heartbeat() {
        let node: NodeSnapshot = serde_json::from_str(HEARTBEAT).unwrap();
        assert_eq!(node.id, "a1b2c3d4e5f6a7b8c9d0");
        assert!(node.is_root());
        assert_eq!(node.shard_key(), node.id);
        assert_eq!(node.role, Role::Master);
        assert_eq!(node.state, NodeState::Running);
        assert_eq!(node.total_slots(), 8192);
        assert_eq!(node.metrics.keys, 77);
        assert_eq!(node.used_memory_gib(), 1.0);
        assert_eq!(node.addr(), "10.0.0.1:7000");
        assert_eq!(node.short_id(), "a1b2c3d4e5");
    }

    #[test]
    fn test_decode_minimal_and_null_ranges() {
        let json = r#"{"Id":"s1","ParentId":"m1","Role":"slave","Region":"nj",
            "State":"WAIT_FAILOVER_BEGIN","Ranges":null,"MasterLinkStatus":"down"}"#;
        let node: NodeSnapshot = serde_json::from_str(json).unwrap();
        assert!(node.ranges.is_empty());
        assert_eq!(node.shard_key(), "m1");
        assert!(node.state.in_failover());
        assert!(node.link_down());
        assert_eq!(node.mode(), "-/-");
    }

    #[test]
    fn test_decode_rejects_unknown_role() {
        let json = r#"{"Id":"x","ParentId":"-","Role":"leader","Region":"nj","State":"RUNNING"}"#;
        assert!(serde_json::from_str::<NodeSnapshot>(json).is_err());
    }

    #[test]
    fn test_display_helpers() {
        let master = NodeSnapshot::root("m", "us");
        assert_eq!(master.mode(), "r/w");
        assert_eq!(master.health(), "ok");
        assert_eq!(master.link_status(), None);

        let replica = NodeSnapshot::replica("s", "m", "eu").with_fail(true);
        assert_eq!(replica.mode(), "r/-");
        assert_eq!(replica.health(), "fail");
        assert_eq!(replica.link_status(), Some(""));
        assert_eq!(short_id("short"), "short");
    }

    #[test]
    fn test_state_names() {
        assert_eq!(NodeState::WaitFailoverEnd.to_string(), "WAIT_FAILOVER_END");
        assert_eq!(
            serde_json::to_string(&NodeState::Offline).unwrap(),
            "\"OFFLINE\""
        );
    }
}
