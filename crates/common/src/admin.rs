//! Request shapes for the controller's administrative endpoints.
//!
//! Nothing here performs I/O; callers post `body()` to `path()` on the
//! controller leader once the cluster view tells them the action makes sense.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::range::SlotRange;

/// Traffic permission to toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perm {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermAction {
    Enable,
    Disable,
}

impl fmt::Display for Perm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Perm::Read => write!(f, "read"),
            Perm::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateParams {
    pub source_id: String,
    pub target_id: String,
    /// Ranges in operator text form (`"a-b"`).
    pub ranges: Vec<String>,
}

impl MigrateParams {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        ranges: &[SlotRange],
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            ranges: ranges.iter().map(SlotRange::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceParams {
    pub method: String,
    #[serde(default)]
    pub target_ids: Vec<String>,
    #[serde(default)]
    pub show_plan_only: bool,
}

impl Default for RebalanceParams {
    fn default() -> Self {
        Self {
            method: "default".to_string(),
            target_ids: Vec::new(),
            show_plan_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermParams {
    pub node_id: String,
    pub action: PermAction,
    pub perm: Perm,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeParams {
    pub node_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicateParams {
    pub child_id: String,
    pub parent_id: String,
}

/// One administrative action, ready to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminRequest {
    CreateMigration(MigrateParams),
    Rebalance(RebalanceParams),
    TogglePerm(PermParams),
    Meet(NodeParams),
    ForgetAndReset(NodeParams),
    Replicate(ReplicateParams),
    SetAsMaster(NodeParams),
    FailoverTakeover(NodeParams),
}

impl AdminRequest {
    pub fn create_migration(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        ranges: &[SlotRange],
    ) -> Self {
        AdminRequest::CreateMigration(MigrateParams::new(source_id, target_id, ranges))
    }

    pub fn toggle_perm(node_id: impl Into<String>, action: PermAction, perm: Perm) -> Self {
        AdminRequest::TogglePerm(PermParams {
            node_id: node_id.into(),
            action,
            perm,
        })
    }

    pub fn replicate(child_id: impl Into<String>, parent_id: impl Into<String>) -> Self {
        AdminRequest::Replicate(ReplicateParams {
            child_id: child_id.into(),
            parent_id: parent_id.into(),
        })
    }

    /// Controller endpoint the request is posted to.
    pub fn path(&self) -> &'static str {
        match self {
            AdminRequest::CreateMigration(_) => "/migrate/create",
            AdminRequest::Rebalance(_) => "/migrate/rebalance",
            AdminRequest::TogglePerm(_) => "/node/perm",
            AdminRequest::Meet(_) => "/node/meet",
            AdminRequest::ForgetAndReset(_) => "/node/forgetAndReset",
            AdminRequest::Replicate(_) => "/node/replicate",
            AdminRequest::SetAsMaster(_) => "/node/setAsMaster",
            AdminRequest::FailoverTakeover(_) => "/failover/takeover",
        }
    }

    /// JSON body for the request.
    pub fn body(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            AdminRequest::CreateMigration(params) => serde_json::to_value(params),
            AdminRequest::Rebalance(params) => serde_json::to_value(params),
            AdminRequest::TogglePerm(params) => serde_json::to_value(params),
            AdminRequest::Replicate(params) => serde_json::to_value(params),
            AdminRequest::Meet(params)
            | AdminRequest::ForgetAndReset(params)
            | AdminRequest::SetAsMaster(params)
            | AdminRequest::FailoverTakeover(params) => serde_json::to_value(params),
        }
    }
}
