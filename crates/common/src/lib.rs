//! Shared data model for the shard topology dashboard: slot ranges, node
//! heartbeats, migration task snapshots, dashboard configuration and the
//! administrative request shapes callers build from a cluster view.

pub mod admin;
pub mod config;
pub mod error;
pub mod migration;
pub mod node;
pub mod range;

pub use admin::{AdminRequest, Perm, PermAction};
pub use config::DashboardConfig;
pub use error::{ConfigError, FeedError, RangeError};
pub use migration::MigrationTask;
pub use node::{NodeMetrics, NodeSnapshot, NodeState, Role, ROOT_PARENT};
pub use range::{parse_range_list, SlotRange, MAX_SLOT, SLOT_COUNT};
