//! Shard grouping.
//!
//! A shard is keyed by its root: a node with parent `-` keys its own shard,
//! every other node joins the shard of its parent. Members are kept per
//! region, and can be laid out per zone for placement displays.

use common::NodeSnapshot;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::registry::NodeSet;

/// Replica set derived from the registry. Rebuilt on every refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Shard {
    /// Id of the shard root, whether or not the root is currently present.
    pub root_id: String,
    /// The root node; `None` while it is missing from the registry.
    pub master: Option<NodeSnapshot>,
    /// Every member, master included, by region in arrival order.
    pub region_nodes: BTreeMap<String, Vec<NodeSnapshot>>,
}

impl Shard {
    fn new(root_id: &str) -> Self {
        Self {
            root_id: root_id.to_string(),
            master: None,
            region_nodes: BTreeMap::new(),
        }
    }

    /// Regions with at least one member, sorted.
    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.region_nodes.keys().map(String::as_str)
    }

    /// Master first, then the remaining members region by region.
    pub fn members(&self) -> impl Iterator<Item = &NodeSnapshot> {
        let master_id = self.master.as_ref().map(|m| m.id.as_str());
        self.master.iter().chain(
            self.region_nodes
                .values()
                .flatten()
                .filter(move |node| Some(node.id.as_str()) != master_id),
        )
    }

    /// Members within `region`, bucketed by zone (sorted), arrival order kept
    /// inside each zone. Empty for regions the shard does not reach.
    pub fn zone_nodes(&self, region: &str) -> BTreeMap<&str, Vec<&NodeSnapshot>> {
        let mut zones: BTreeMap<&str, Vec<&NodeSnapshot>> = BTreeMap::new();
        for node in self.region_nodes.get(region).into_iter().flatten() {
            zones.entry(node.zone.as_str()).or_default().push(node);
        }
        zones
    }

    /// Total members across all regions, master included.
    pub fn member_count(&self) -> usize {
        self.region_nodes.values().map(Vec::len).sum()
    }

    /// Whether `node_id` is a member of this shard.
    pub fn contains(&self, node_id: &str) -> bool {
        self.region_nodes
            .values()
            .flatten()
            .any(|node| node.id == node_id)
    }

    /// Root missing from the registry while members remain.
    pub fn is_orphan(&self) -> bool {
        self.master.is_none()
    }
}

/// Group nodes into shards keyed by their root id.
///
/// Shards come out in the order their key was first seen.
pub fn group(nodes: &NodeSet) -> Vec<Shard> {
    let mut shards: Vec<Shard> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for node in nodes {
        let key = node.shard_key();
        let pos = *index.entry(key).or_insert_with(|| {
            shards.push(Shard::new(key));
            shards.len() - 1
        });
        let shard = &mut shards[pos];

        if node.is_root() {
            shard.master = Some(node.clone());
        }
        shard
            .region_nodes
            .entry(node.region.clone())
            .or_default()
            .push(node.clone());
    }

    shards
}
