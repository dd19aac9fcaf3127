//! Topology reconciliation for a sharded key-value cluster.
//!
//! This crate turns the raw node and migration feeds into a consistent,
//! queryable picture of the cluster:
//! - Registry of the latest snapshot per node with region-aware expiry
//! - Shard grouping by root node and role classification
//! - Per-range migration progress labels
//! - A single-writer agent that publishes immutable views to readers

pub mod agent;
pub mod classifier;
pub mod clock;
pub mod feed;
pub mod grouper;
pub mod migration;
pub mod registry;
pub mod view;

#[cfg(test)]
mod tests;

pub use agent::{
    feed_channels, spawn_agent, FeedReceivers, FeedSenders, ReconcileAgent, ViewHandle,
};
pub use classifier::{ClassifiedShard, Classification, ShardClass, ShardClassifier};
pub use clock::{Clock, ManualClock, SystemClock};
pub use feed::{parse_migration_event, parse_node_event};
pub use grouper::{group, Shard};
pub use migration::{
    range_states, MigrationProgress, MigrationTracker, RangeProgress, RangeState,
};
pub use registry::{NodeRegistry, NodeSet};
pub use view::{build_view, ClusterView};
