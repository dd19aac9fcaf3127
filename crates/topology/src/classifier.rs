//! Shard role classification.
//!
//! Each derived shard is labelled exactly one of:
//! - `Online`: root present, not free, and not parked as standby
//! - `Standby`: empty, non-free master whose shard does not yet span every region
//! - `Free`: root is unassigned capacity (its node also shows up in the free pool)
//! - `Orphan`: root missing from the registry while members remain

use common::{NodeSnapshot, Role};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

use crate::grouper::Shard;
use crate::registry::NodeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardClass {
    Online,
    Standby,
    Free,
    Orphan,
}

impl fmt::Display for ShardClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ShardClass::Online => "online",
            ShardClass::Standby => "standby",
            ShardClass::Free => "free",
            ShardClass::Orphan => "orphan",
        };
        f.write_str(label)
    }
}

/// Shard with its classification facts attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedShard {
    #[serde(flatten)]
    pub shard: Shard,
    pub class: ShardClass,
    pub covers_all_regions: bool,
    pub rebalance_eligible: bool,
}

impl ClassifiedShard {
    /// Root id the shard is keyed by.
    pub fn root_id(&self) -> &str {
        &self.shard.root_id
    }

    /// The root node, when present.
    pub fn master(&self) -> Option<&NodeSnapshot> {
        self.shard.master.as_ref()
    }
}

/// Classifier output, one bucket per class plus the free-node pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Classification {
    pub free_nodes: Vec<NodeSnapshot>,
    pub online_shards: Vec<ClassifiedShard>,
    pub standby_shards: Vec<ClassifiedShard>,
    pub free_shards: Vec<ClassifiedShard>,
    pub orphan_shards: Vec<ClassifiedShard>,
}

impl Classification {
    /// Masters of standby shards.
    pub fn standby_nodes(&self) -> Vec<NodeSnapshot> {
        self.standby_shards
            .iter()
            .filter_map(|shard| shard.master().cloned())
            .collect()
    }

    /// Shards across all four classes.
    pub fn shard_count(&self) -> usize {
        self.online_shards.len()
            + self.standby_shards.len()
            + self.free_shards.len()
            + self.orphan_shards.len()
    }
}

/// Labels shards against the set of regions every replica set should span.
#[derive(Debug, Clone)]
pub struct ShardClassifier {
    regions: BTreeSet<String>,
}

impl ShardClassifier {
    /// Classifier expecting every shard to span `regions`.
    pub fn new<I, S>(regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            regions: regions.into_iter().map(Into::into).collect(),
        }
    }

    /// The configured region set.
    pub fn regions(&self) -> &BTreeSet<String> {
        &self.regions
    }

    /// Shard regions equal the configured set, ignoring order.
    pub fn covers_all_regions(&self, shard: &Shard) -> bool {
        shard.region_nodes.len() == self.regions.len()
            && shard
                .region_nodes
                .keys()
                .all(|region| self.regions.contains(region))
    }

    /// Unassigned capacity, surfaced regardless of shard membership.
    pub fn is_free(node: &NodeSnapshot) -> bool {
        node.free
    }

    /// A non-free master holding no slots whose shard misses a region.
    pub fn is_standby(&self, shard: &Shard, master: &NodeSnapshot) -> bool {
        master.role == Role::Master
            && !master.free
            && !master.owns_slots()
            && !self.covers_all_regions(shard)
    }

    /// Healthy, slot-less master whose shard spans every region.
    pub fn rebalance_eligible(&self, shard: &Shard) -> bool {
        match &shard.master {
            Some(master) => {
                !master.fail && !master.owns_slots() && self.covers_all_regions(shard)
            }
            None => false,
        }
    }

    /// Exactly one class per shard; free wins over standby.
    pub fn class_of(&self, shard: &Shard) -> ShardClass {
        match &shard.master {
            None => ShardClass::Orphan,
            Some(master) if Self::is_free(master) => ShardClass::Free,
            Some(master) if self.is_standby(shard, master) => ShardClass::Standby,
            Some(_) => ShardClass::Online,
        }
    }

    /// Attach class, coverage and eligibility to `shard`.
    pub fn classify(&self, shard: Shard) -> ClassifiedShard {
        ClassifiedShard {
            class: self.class_of(&shard),
            covers_all_regions: self.covers_all_regions(&shard),
            rebalance_eligible: self.rebalance_eligible(&shard),
            shard,
        }
    }

    /// Classify every shard and collect the free pool from `nodes`.
    pub fn classify_all(&self, shards: Vec<Shard>, nodes: &NodeSet) -> Classification {
        let mut out = Classification {
            free_nodes: nodes.iter().filter(|n| Self::is_free(n)).cloned().collect(),
            ..Classification::default()
        };

        for shard in shards {
            let classified = self.classify(shard);
            match classified.class {
                ShardClass::Online => out.online_shards.push(classified),
                ShardClass::Standby => out.standby_shards.push(classified),
                ShardClass::Free => out.free_shards.push(classified),
                ShardClass::Orphan => {
                    debug!(root_id = %classified.root_id(), "shard root missing");
                    out.orphan_shards.push(classified)
                }
            }
        }

        out
    }
}
