//! Scenario tests across registry, classifier and agent

#[cfg(test)]
mod registry_tests {
    use crate::{ManualClock, ReconcileAgent, ShardClass};
    use common::{DashboardConfig, NodeSnapshot};

    fn agent(clock: &ManualClock) -> ReconcileAgent<ManualClock> {
        ReconcileAgent::with_clock(&DashboardConfig::with_regions(["us", "eu"]), clock.clone())
            .unwrap()
    }

    #[test]
    fn test_quiet_region_keeps_its_nodes() {
        let clock = ManualClock::new(0);
        let mut agent = agent(&clock);

        agent.apply_node(NodeSnapshot::root("us-1", "us"));
        agent.apply_node(NodeSnapshot::replica("eu-1", "us-1", "eu"));

        // Only "us" keeps reporting; "eu" went dark as a whole.
        for t in (1000..=12_000).step_by(1000) {
            clock.set(t);
            agent.apply_node(NodeSnapshot::root("us-1", "us"));
        }

        let view = agent.view();
        assert!(view.nodes.contains("us-1"));
        assert!(view.nodes.contains("eu-1"));
    }

    #[test]
    fn test_stale_node_in_live_region_is_evicted() {
        let clock = ManualClock::new(0);
        let mut agent = agent(&clock);

        agent.apply_node(NodeSnapshot::root("a", "us"));
        agent.apply_node(NodeSnapshot::root("b", "us"));
        for t in (1500..=7500).step_by(1500) {
            clock.set(t);
            agent.apply_node(NodeSnapshot::root("b", "us"));
        }

        let ids: Vec<String> = agent.view().nodes.ids().map(String::from).collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_expired_root_leaves_orphan_shard() {
        let clock = ManualClock::new(0);
        let mut agent = agent(&clock);

        agent.apply_node(NodeSnapshot::root("m", "us"));
        agent.apply_node(NodeSnapshot::replica("s", "m", "us"));
        assert_eq!(agent.view().shard("m").unwrap().class, ShardClass::Standby);

        // Only the replica keeps reporting.
        for t in (1500..=7500).step_by(1500) {
            clock.set(t);
            agent.apply_node(NodeSnapshot::replica("s", "m", "us"));
        }

        let view = agent.view();
        assert_eq!(view.nodes.ids().collect::<Vec<_>>(), vec!["s"]);
        let shard = view.shard("m").unwrap();
        assert_eq!(shard.class, ShardClass::Orphan);
        assert!(shard.master().is_none());
        assert!(shard.shard.contains("s"));
        assert_eq!(view.shard_of("s"), Some("m"));
    }

    #[test]
    fn test_heartbeat_overwrites_snapshot() {
        let clock = ManualClock::new(0);
        let mut agent = agent(&clock);

        agent.apply_node(NodeSnapshot::root("m", "us"));
        agent.apply_node(NodeSnapshot::root("m", "us").with_fail(true).with_version(3));

        let view = agent.view();
        assert_eq!(view.nodes.len(), 1);
        assert!(view.nodes.get("m").unwrap().fail);
        assert_eq!(view.region_versions.get("us"), Some(&3));
    }
}

#[cfg(test)]
mod classification_tests {
    use crate::{ManualClock, ReconcileAgent, ShardClass};
    use common::{DashboardConfig, NodeSnapshot, SlotRange};

    #[test]
    fn test_cluster_walkthrough() {
        let mut agent = ReconcileAgent::with_clock(
            &DashboardConfig::with_regions(["us", "eu"]),
            ManualClock::new(0),
        )
        .unwrap();

        let full = SlotRange::new(0, 16383).unwrap();
        agent.apply_node(NodeSnapshot::root("m1", "us").with_ranges(vec![full]));
        agent.apply_node(NodeSnapshot::replica("r1", "m1", "eu"));
        agent.apply_node(NodeSnapshot::root("m2", "us"));
        agent.apply_node(NodeSnapshot::replica("r2", "m2", "eu"));
        agent.apply_node(NodeSnapshot::root("spare", "eu"));
        agent.apply_node(NodeSnapshot::root("idle", "us").with_free(true));
        agent.apply_node(NodeSnapshot::replica("lost", "gone", "eu"));

        let view = agent.view();
        let class_of = |root: &str| view.shard(root).map(|s| s.class);

        assert_eq!(class_of("m1"), Some(ShardClass::Online));
        assert_eq!(class_of("m2"), Some(ShardClass::Online));
        assert_eq!(class_of("spare"), Some(ShardClass::Standby));
        assert_eq!(class_of("idle"), Some(ShardClass::Free));
        assert_eq!(class_of("gone"), Some(ShardClass::Orphan));

        assert_eq!(view.shard_of("r2"), Some("m2"));
        assert_eq!(view.standby_nodes[0].id, "spare");
        assert_eq!(view.free_nodes[0].id, "idle");

        let eligible: Vec<&str> = view
            .rebalance_candidates()
            .iter()
            .map(|s| s.root_id())
            .collect();
        assert_eq!(eligible, vec!["m2"]);
    }

    #[test]
    fn test_free_pool_is_independent_of_shard_class() {
        let mut agent = ReconcileAgent::with_clock(
            &DashboardConfig::with_regions(["us"]),
            ManualClock::new(0),
        )
        .unwrap();

        agent.apply_node(NodeSnapshot::root("m", "us").with_ranges(vec![SlotRange::single(1).unwrap()]));
        agent.apply_node(NodeSnapshot::replica("free-child", "m", "us").with_free(true));

        let view = agent.view();
        assert_eq!(view.shard("m").unwrap().class, ShardClass::Online);
        assert!(view.shard("m").unwrap().shard.contains("free-child"));
        assert_eq!(view.free_nodes.len(), 1);
        assert_eq!(view.free_nodes[0].id, "free-child");
    }
}

#[cfg(test)]
mod migration_tests {
    use crate::{ManualClock, ReconcileAgent};
    use common::{DashboardConfig, MigrationTask, NodeSnapshot, SlotRange};

    #[test]
    fn test_migration_targets_follow_online_masters() {
        let mut agent = ReconcileAgent::with_clock(
            &DashboardConfig::with_regions(["us"]),
            ManualClock::new(0),
        )
        .unwrap();
        let handle = agent.handle();

        let ranges = vec![
            SlotRange::new(0, 99).unwrap(),
            SlotRange::new(100, 199).unwrap(),
        ];
        agent.apply_node(NodeSnapshot::root("src", "us").with_ranges(ranges.clone()));
        agent.apply_node(NodeSnapshot::root("dst", "us").with_ranges(vec![SlotRange::single(500).unwrap()]));
        agent.apply_migration(MigrationTask::new("src", "dst", ranges).at(1, 120, "MIGRATING"));

        let view = handle.current_view();
        let targets: Vec<&str> = view
            .migration_targets("src")
            .iter()
            .map(|n| n.id.as_str())
            .collect();
        assert_eq!(targets, vec!["dst"]);

        let labels: Vec<String> = handle.migration_progress()["src"]
            .iter()
            .map(|p| p.state.to_string())
            .collect();
        assert_eq!(labels, vec!["Done", "MIGRATING"]);
    }
}

#[cfg(test)]
mod agent_tests {
    use crate::{spawn_agent, ManualClock};
    use common::DashboardConfig;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_agent_drops_garbage_and_keeps_running() {
        let config = DashboardConfig::with_regions(["us"]);
        let (senders, mut handle, task) = spawn_agent(&config, ManualClock::new(0)).unwrap();

        senders.nodes.send("garbage".to_string()).unwrap();
        senders
            .nodes
            .send(r#"{"Id":"m","ParentId":"-","Role":"master","Region":"us","State":"RUNNING"}"#.to_string())
            .unwrap();

        let view = timeout(Duration::from_secs(5), handle.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.nodes.len(), 1);

        drop(senders);
        task.await.unwrap().unwrap();
        assert!(handle.changed().await.is_err());
        assert_eq!(handle.current_view().nodes.len(), 1);
    }
}
