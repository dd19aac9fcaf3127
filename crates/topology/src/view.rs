//! Composed cluster view.
//!
//! `build_view` is a pure function of the registry and tracker contents; the
//! agent calls it after every mutation and readers only ever see its output.

use common::{MigrationTask, NodeSnapshot};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::classifier::{ClassifiedShard, ShardClassifier};
use crate::grouper::group;
use crate::migration::{MigrationProgress, RangeProgress};
use crate::registry::NodeSet;

/// Composed, read-only topology handed to presentation and admin callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterView {
    pub nodes: NodeSet,
    pub free_nodes: Vec<NodeSnapshot>,
    pub standby_nodes: Vec<NodeSnapshot>,
    pub online_shards: Vec<ClassifiedShard>,
    pub standby_shards: Vec<ClassifiedShard>,
    pub free_shards: Vec<ClassifiedShard>,
    pub orphan_shards: Vec<ClassifiedShard>,
    pub migrations: BTreeMap<String, MigrationProgress>,
    /// Last non-zero version reported per region.
    pub region_versions: BTreeMap<String, i64>,
    /// Zones seen among current nodes, per region.
    pub region_zones: BTreeMap<String, BTreeSet<String>>,
}

/// Compose a view from registry and tracker snapshots. Pure and deterministic.
pub fn build_view(
    nodes: &NodeSet,
    migrations: &BTreeMap<String, MigrationTask>,
    regions: &BTreeSet<String>,
) -> ClusterView {
    let classifier = ShardClassifier::new(regions.iter().cloned());
    let classification = classifier.classify_all(group(nodes), nodes);

    let mut region_versions = BTreeMap::new();
    let mut region_zones: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for node in nodes {
        if node.version != 0 {
            region_versions.insert(node.region.clone(), node.version);
        }
        region_zones
            .entry(node.region.clone())
            .or_default()
            .insert(node.zone.clone());
    }

    ClusterView {
        nodes: nodes.clone(),
        standby_nodes: classification.standby_nodes(),
        free_nodes: classification.free_nodes,
        online_shards: classification.online_shards,
        standby_shards: classification.standby_shards,
        free_shards: classification.free_shards,
        orphan_shards: classification.orphan_shards,
        migrations: migrations
            .iter()
            .map(|(source, task)| (source.clone(), MigrationProgress::from(task)))
            .collect(),
        region_versions,
        region_zones,
    }
}

impl ClusterView {
    /// Every classified shard: online, standby, free, then orphan.
    pub fn shards(&self) -> impl Iterator<Item = &ClassifiedShard> {
        self.online_shards
            .iter()
            .chain(&self.standby_shards)
            .chain(&self.free_shards)
            .chain(&self.orphan_shards)
    }

    /// Shard keyed by `root_id`, whatever its class.
    pub fn shard(&self, root_id: &str) -> Option<&ClassifiedShard> {
        self.shards().find(|shard| shard.root_id() == root_id)
    }

    /// Root id of the shard that holds `node_id`.
    pub fn shard_of(&self, node_id: &str) -> Option<&str> {
        self.nodes.get(node_id).map(NodeSnapshot::shard_key)
    }

    /// Masters of online shards, in shard order.
    pub fn online_masters(&self) -> Vec<&NodeSnapshot> {
        self.online_shards
            .iter()
            .filter_map(ClassifiedShard::master)
            .collect()
    }

    /// Online masters a migration out of `source_id` could target.
    pub fn migration_targets(&self, source_id: &str) -> Vec<&NodeSnapshot> {
        self.online_masters()
            .into_iter()
            .filter(|master| master.id != source_id)
            .collect()
    }

    /// Nodes `node_id` could be re-parented under.
    pub fn reparent_candidates(&self, node_id: &str) -> Vec<&NodeSnapshot> {
        self.nodes.iter().filter(|n| n.id != node_id).collect()
    }

    /// Online shards a rebalance may hand slots to.
    pub fn rebalance_candidates(&self) -> Vec<&ClassifiedShard> {
        self.online_shards
            .iter()
            .filter(|shard| shard.rebalance_eligible)
            .collect()
    }

    /// Per-range labels keyed by migration source.
    pub fn migration_progress(&self) -> BTreeMap<String, Vec<RangeProgress>> {
        self.migrations
            .iter()
            .map(|(source, progress)| (source.clone(), progress.ranges.clone()))
            .collect()
    }

    /// Zones known in `region`, sorted. Empty when the region has no nodes.
    pub fn zones(&self, region: &str) -> impl Iterator<Item = &str> {
        self.region_zones
            .get(region)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.migrations.is_empty()
    }
}
