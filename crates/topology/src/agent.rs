//! Reconcile agent - the single writer over registry and tracker.
//!
//! The agent owns the node registry and migration tracker outright. It
//! consumes both feeds and a periodic expiry tick from one loop, recomputes
//! the cluster view after every mutation and publishes it on a watch channel.
//! Readers hold a [`ViewHandle`] and never see a registry mid-update.

use anyhow::{anyhow, Result};
use common::{DashboardConfig, MigrationTask, NodeSnapshot};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::feed::{parse_migration_event, parse_node_event};
use crate::migration::{MigrationTracker, RangeProgress};
use crate::registry::NodeRegistry;
use crate::view::{build_view, ClusterView};

/// Read side of the agent. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ViewHandle {
    rx: watch::Receiver<Arc<ClusterView>>,
}

impl ViewHandle {
    /// Latest published view. Never blocks.
    pub fn current_view(&self) -> Arc<ClusterView> {
        self.rx.borrow().clone()
    }

    /// Per-range labels from the latest view.
    pub fn migration_progress(&self) -> BTreeMap<String, Vec<RangeProgress>> {
        self.current_view().migration_progress()
    }

    /// Wait for the next publication.
    pub async fn changed(&mut self) -> Result<Arc<ClusterView>> {
        self.rx
            .changed()
            .await
            .map_err(|_| anyhow!("reconcile agent stopped"))?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

/// Write side of the feeds: raw JSON payloads, one message per update.
#[derive(Debug, Clone)]
pub struct FeedSenders {
    pub nodes: UnboundedSender<String>,
    pub migrations: UnboundedSender<String>,
}

/// Receiving halves handed to [`ReconcileAgent::run`].
#[derive(Debug)]
pub struct FeedReceivers {
    pub nodes: UnboundedReceiver<String>,
    pub migrations: UnboundedReceiver<String>,
}

/// Create a connected pair of feed channels.
pub fn feed_channels() -> (FeedSenders, FeedReceivers) {
    let (node_tx, node_rx) = mpsc::unbounded_channel();
    let (migration_tx, migration_rx) = mpsc::unbounded_channel();
    (
        FeedSenders {
            nodes: node_tx,
            migrations: migration_tx,
        },
        FeedReceivers {
            nodes: node_rx,
            migrations: migration_rx,
        },
    )
}

pub struct ReconcileAgent<C: Clock = SystemClock> {
    registry: NodeRegistry,
    tracker: MigrationTracker,
    regions: BTreeSet<String>,
    check_interval: Duration,
    clock: C,
    view_tx: watch::Sender<Arc<ClusterView>>,
}

impl ReconcileAgent<SystemClock> {
    /// Create an agent on the wall clock.
    pub fn new(config: &DashboardConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ReconcileAgent<C> {
    /// Create an agent with an explicit time source.
    pub fn with_clock(config: &DashboardConfig, clock: C) -> Result<Self> {
        config.validate()?;
        let (view_tx, _) = watch::channel(Arc::new(ClusterView::default()));

        info!(
            app = %config.app_name,
            regions = ?config.regions,
            master_region = ?config.master_region,
            node_ttl_ms = config.node_ttl_ms,
            "creating reconcile agent"
        );

        Ok(Self {
            registry: NodeRegistry::from_config(config),
            tracker: MigrationTracker::new(),
            regions: config.region_set(),
            check_interval: config.expiry_check_interval(),
            clock,
            view_tx,
        })
    }

    /// New reader subscribed to this agent's publications.
    pub fn handle(&self) -> ViewHandle {
        ViewHandle {
            rx: self.view_tx.subscribe(),
        }
    }

    /// Apply one heartbeat, sweep stale nodes and publish.
    pub fn apply_node(&mut self, node: NodeSnapshot) {
        let now = self.clock.now_ms();
        debug!(node_id = %node.id, region = %node.region, "ingesting node snapshot");
        self.registry.ingest(node, now);
        self.registry.maybe_expire(now);
        self.publish();
    }

    /// Replace the task for its source and publish.
    pub fn apply_migration(&mut self, task: MigrationTask) {
        self.tracker.ingest(task);
        self.publish();
    }

    /// Decode and apply a raw node-feed message; malformed input is dropped.
    pub fn handle_node_payload(&mut self, payload: &str) {
        match parse_node_event(payload) {
            Ok(node) => self.apply_node(node),
            Err(e) => warn!(error = %e, "dropping malformed node message"),
        }
    }

    /// Decode and apply a raw migration-feed message; malformed input is dropped.
    pub fn handle_migration_payload(&mut self, payload: &str) {
        match parse_migration_event(payload) {
            Ok(task) => self.apply_migration(task),
            Err(e) => warn!(error = %e, "dropping malformed migration message"),
        }
    }

    /// Periodic sweep; publishes only when something was evicted.
    pub fn expire(&mut self) -> Vec<String> {
        let evicted = self.registry.maybe_expire(self.clock.now_ms());
        if !evicted.is_empty() {
            self.publish();
        }
        evicted
    }

    /// Tick period for the expiry sweep. One millisecond past the registry's
    /// window so a tick landing on the boundary is not skipped.
    pub(crate) fn sweep_period(&self) -> Duration {
        self.check_interval + Duration::from_millis(1)
    }

    /// Recompute the view from current contents.
    pub fn view(&self) -> ClusterView {
        build_view(
            &self.registry.snapshot(),
            &self.tracker.snapshot(),
            &self.regions,
        )
    }

    fn publish(&self) {
        let view = self.view();
        debug!(
            nodes = view.nodes.len(),
            online = view.online_shards.len(),
            standby = view.standby_shards.len(),
            orphans = view.orphan_shards.len(),
            migrations = view.migrations.len(),
            "publishing cluster view"
        );
        self.view_tx.send_replace(Arc::new(view));
    }

    /// Run until both feeds close. The last published view stays readable
    /// through every [`ViewHandle`] afterwards.
    pub async fn run(mut self, feeds: FeedReceivers) -> Result<()> {
        let FeedReceivers {
            nodes: mut node_rx,
            migrations: mut migration_rx,
        } = feeds;
        let mut nodes_open = true;
        let mut migrations_open = true;

        let mut tick = tokio::time::interval(self.sweep_period());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(regions = self.regions.len(), "reconcile agent started");

        while nodes_open || migrations_open {
            tokio::select! {
                msg = node_rx.recv(), if nodes_open => match msg {
                    Some(payload) => self.handle_node_payload(&payload),
                    None => {
                        info!("node feed closed");
                        nodes_open = false;
                    }
                },
                msg = migration_rx.recv(), if migrations_open => match msg {
                    Some(payload) => self.handle_migration_payload(&payload),
                    None => {
                        info!("migration feed closed");
                        migrations_open = false;
                    }
                },
                _ = tick.tick() => {
                    self.expire();
                }
            }
        }

        info!(
            nodes = self.registry.len(),
            migrations = self.tracker.len(),
            "feeds closed, shutting down agent"
        );
        Ok(())
    }
}

/// Spawn an agent on the current runtime.
pub fn spawn_agent<C: Clock>(
    config: &DashboardConfig,
    clock: C,
) -> Result<(FeedSenders, ViewHandle, JoinHandle<Result<()>>)> {
    let agent = ReconcileAgent::with_clock(config, clock)?;
    let handle = agent.handle();
    let (senders, receivers) = feed_channels();
    let task = tokio::spawn(agent.run(receivers));
    Ok((senders, handle, task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tracing_test::traced_test;

    fn config() -> DashboardConfig {
        DashboardConfig::with_regions(["us", "eu"])
    }

    #[test]
    fn test_agent_rejects_invalid_config() {
        assert!(ReconcileAgent::new(&DashboardConfig::default()).is_err());
    }

    #[test]
    fn test_apply_publishes_to_handle() {
        let mut agent = ReconcileAgent::with_clock(&config(), ManualClock::new(0)).unwrap();
        let handle = agent.handle();
        assert!(handle.current_view().is_empty());

        agent.apply_node(NodeSnapshot::root("m", "us"));
        agent.apply_node(NodeSnapshot::replica("s", "m", "eu"));

        let view = handle.current_view();
        assert_eq!(view.nodes.len(), 2);
        assert!(view.online_shards[0].rebalance_eligible);
    }

    #[test]
    fn test_expiry_through_agent() {
        let clock = ManualClock::new(0);
        let mut agent = ReconcileAgent::with_clock(&config(), clock.clone()).unwrap();
        let handle = agent.handle();

        agent.apply_node(NodeSnapshot::root("a", "us"));
        clock.set(4900);
        agent.apply_node(NodeSnapshot::root("b", "us"));
        clock.set(6000);
        assert_eq!(agent.expire(), vec!["a".to_string()]);

        let view = handle.current_view();
        assert!(!view.nodes.contains("a"));
        assert!(view.nodes.contains("b"));
    }

    #[test]
    fn test_sweep_period_clears_registry_window() {
        let agent = ReconcileAgent::with_clock(&config(), ManualClock::new(0)).unwrap();
        assert_eq!(agent.sweep_period(), Duration::from_millis(1001));
    }

    #[test]
    #[traced_test]
    fn test_malformed_payload_is_dropped() {
        let mut agent = ReconcileAgent::with_clock(&config(), ManualClock::new(0)).unwrap();
        let handle = agent.handle();

        agent.handle_node_payload("{not json");
        agent.handle_migration_payload(r#"{"TargetId":"x"}"#);

        assert!(handle.current_view().is_empty());
        assert!(logs_contain("dropping malformed node message"));
        assert!(logs_contain("dropping malformed migration message"));
    }

    #[tokio::test]
    async fn test_run_until_feeds_close_keeps_last_view() {
        let (senders, mut handle, task) = spawn_agent(&config(), ManualClock::new(0)).unwrap();

        senders
            .nodes
            .send(
                r#"{"Id":"m","ParentId":"-","Role":"master","Region":"us","State":"RUNNING"}"#
                    .to_string(),
            )
            .unwrap();
        let view = handle.changed().await.unwrap();
        assert_eq!(view.nodes.len(), 1);

        senders
            .migrations
            .send(
                r#"{"SourceId":"m","TargetId":"n","State":"MIGRATING","Ranges":[{"Left":0,"Right":9}]}"#
                    .to_string(),
            )
            .unwrap();
        let view = handle.changed().await.unwrap();
        assert_eq!(view.migrations.len(), 1);

        drop(senders);
        task.await.unwrap().unwrap();

        let last = handle.current_view();
        assert_eq!(last.nodes.len(), 1);
        assert_eq!(handle.migration_progress()["m"][0].state.to_string(), "MIGRATING");
    }
}
