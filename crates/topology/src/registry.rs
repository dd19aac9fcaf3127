//! Latest heartbeat per node, with staleness eviction.
//!
//! A node is only reaped when its region keeps reporting while the node
//! itself has gone quiet. A region with no recent traffic at all is treated
//! as a stalled feed, and its nodes are kept as last seen.

use common::config::{DEFAULT_EXPIRY_CHECK_INTERVAL_MS, DEFAULT_NODE_TTL_MS};
use common::{DashboardConfig, NodeSnapshot};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Ordered, read-only copy of registry contents.
///
/// Nodes are kept in arrival order: the position of a node is fixed by the
/// first heartbeat seen for its id, later heartbeats only replace the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NodeSet {
    nodes: Vec<NodeSnapshot>,
}

impl NodeSet {
    /// Build from heartbeats in arrival order; a repeated id overwrites in place.
    pub fn from_arrivals<I>(arrivals: I) -> Self
    where
        I: IntoIterator<Item = NodeSnapshot>,
    {
        let mut nodes: Vec<NodeSnapshot> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for node in arrivals {
            match index.get(&node.id) {
                Some(&pos) => nodes[pos] = node,
                None => {
                    index.insert(node.id.clone(), nodes.len());
                    nodes.push(node);
                }
            }
        }
        Self { nodes }
    }

    /// Snapshot for `id`, if present.
    pub fn get(&self, id: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Whether a snapshot for `id` is present.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Snapshots in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeSnapshot> {
        self.nodes.iter()
    }

    /// Node ids in arrival order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<'a> IntoIterator for &'a NodeSet {
    type Item = &'a NodeSnapshot;
    type IntoIter = std::slice::Iter<'a, NodeSnapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    node: NodeSnapshot,
    last_seen: u64,
    arrival: u64,
}

/// Mutable store of the latest heartbeat per node id.
///
/// Must be driven by a single writer; readers get [`NodeSet`] copies.
#[derive(Debug)]
pub struct NodeRegistry {
    entries: HashMap<String, Entry>,
    region_activity: HashMap<String, u64>,
    last_expiry_check: Option<u64>,
    next_arrival: u64,
    node_ttl_ms: u64,
    check_interval_ms: u64,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_TTL_MS, DEFAULT_EXPIRY_CHECK_INTERVAL_MS)
    }
}

impl NodeRegistry {
    /// Empty registry evicting after `node_ttl_ms` of silence, sweeping at
    /// most once per `check_interval_ms`.
    pub fn new(node_ttl_ms: u64, check_interval_ms: u64) -> Self {
        Self {
            entries: HashMap::new(),
            region_activity: HashMap::new(),
            last_expiry_check: None,
            next_arrival: 0,
            node_ttl_ms,
            check_interval_ms,
        }
    }

    /// Empty registry with the config's TTL and sweep interval.
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(config.node_ttl_ms, config.expiry_check_interval_ms)
    }

    /// Record a heartbeat, overwriting any previous one for the same id.
    pub fn ingest(&mut self, node: NodeSnapshot, now: u64) {
        self.region_activity.insert(node.region.clone(), now);

        match self.entries.get_mut(&node.id) {
            Some(entry) => {
                entry.node = node;
                entry.last_seen = now;
            }
            None => {
                debug!(node_id = %node.id, region = %node.region, "node joined registry");
                let arrival = self.next_arrival;
                self.next_arrival += 1;
                self.entries.insert(
                    node.id.clone(),
                    Entry {
                        node,
                        last_seen: now,
                        arrival,
                    },
                );
            }
        }
    }

    /// Evict nodes that went quiet while their region kept reporting.
    ///
    /// Runs at most once per check interval; returns the evicted ids.
    pub fn maybe_expire(&mut self, now: u64) -> Vec<String> {
        if let Some(last) = self.last_expiry_check {
            if now.saturating_sub(last) <= self.check_interval_ms {
                return Vec::new();
            }
        }
        self.last_expiry_check = Some(now);

        let ttl = self.node_ttl_ms;
        let region_activity = &self.region_activity;
        let mut expired: Vec<(u64, String)> = self
            .entries
            .values()
            .filter(|entry| {
                let node_age = now.saturating_sub(entry.last_seen);
                let region_age = region_activity
                    .get(&entry.node.region)
                    .map(|seen| now.saturating_sub(*seen))
                    .unwrap_or(u64::MAX);
                region_age < ttl && node_age > ttl
            })
            .map(|entry| (entry.arrival, entry.node.id.clone()))
            .collect();
        expired.sort();

        expired
            .into_iter()
            .filter_map(|(_, id)| self.entries.remove(&id))
            .map(|entry| {
                warn!(
                    node_id = %entry.node.id,
                    region = %entry.node.region,
                    age_ms = now.saturating_sub(entry.last_seen),
                    "node expired"
                );
                entry.node.id
            })
            .collect()
    }

    /// Copy of the current contents in arrival order.
    pub fn snapshot(&self) -> NodeSet {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.arrival);
        NodeSet {
            nodes: entries.into_iter().map(|entry| entry.node.clone()).collect(),
        }
    }

    /// Latest heartbeat for `id`.
    pub fn get(&self, id: &str) -> Option<&NodeSnapshot> {
        self.entries.get(id).map(|entry| &entry.node)
    }

    /// When `id` last reported, in clock milliseconds.
    pub fn last_seen(&self, id: &str) -> Option<u64> {
        self.entries.get(id).map(|entry| entry.last_seen)
    }

    /// When any node of `region` last reported.
    pub fn last_region_activity(&self, region: &str) -> Option<u64> {
        self.region_activity.get(region).copied()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
