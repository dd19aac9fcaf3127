//! Plain-text rendering of cluster views for the terminal.

use common::{DashboardConfig, NodeSnapshot};
use std::fmt::Write;
use topology::{ClassifiedShard, ClusterView, MigrationProgress};

const NODE_HEADER: &str =
    "ver\tid\ttag\tip:port\trole\tmode\tfail\tstate\tdump\trepl\tkeys\tqps\tnet_in\tnet_out\tmem_used\tlink";

pub fn node_row(node: &NodeSnapshot) -> String {
    let metrics = &node.metrics;
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.1}\t{:.1}\t{:.2}G\t{}",
        node.version,
        node.short_id(),
        if node.tag.is_empty() { "-" } else { node.tag.as_str() },
        node.addr(),
        node.role,
        node.mode(),
        node.health(),
        node.state,
        if metrics.rdb_bgsave_in_progress { "yes" } else { "-" },
        metrics.repl_offset,
        metrics.keys,
        metrics.instantaneous_ops_per_sec,
        metrics.instantaneous_input_kbps,
        metrics.instantaneous_output_kbps,
        node.used_memory_gib(),
        node.link_status().filter(|s| !s.is_empty()).unwrap_or("-"),
    )
}

fn shard_block(out: &mut String, shard: &ClassifiedShard) {
    let ranges = shard
        .master()
        .map(|m| {
            m.ranges
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",")
        })
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
        out,
        "shard {} [{}] slots={} regions={} rebalance={}",
        common::node::short_id(shard.root_id()),
        shard.class,
        ranges,
        shard.shard.regions().collect::<Vec<_>>().join(","),
        if shard.rebalance_eligible { "yes" } else { "no" },
    );
    for node in shard.shard.members() {
        let _ = writeln!(out, "  {}", node_row(node));
    }
}

fn section<'a, I>(out: &mut String, title: &str, shards: I)
where
    I: IntoIterator<Item = &'a ClassifiedShard>,
{
    let mut shards = shards.into_iter().peekable();
    if shards.peek().is_none() {
        return;
    }
    let _ = writeln!(out, "== {} ==", title);
    for shard in shards {
        shard_block(out, shard);
    }
}

/// App settings header, as shown above the topology.
pub fn render_app_info(config: &DashboardConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "app: {}\tregions: {}\tmaster region: {}",
        if config.app_name.is_empty() { "-" } else { config.app_name.as_str() },
        config.regions.join(","),
        config.master_region.as_deref().unwrap_or("-"),
    );
    out
}

pub fn render_view(view: &ClusterView) -> String {
    let mut out = String::new();

    if !view.region_zones.is_empty() {
        let zones: Vec<String> = view
            .region_zones
            .keys()
            .map(|region| {
                let names: Vec<&str> = view
                    .zones(region)
                    .map(|zone| if zone.is_empty() { "-" } else { zone })
                    .collect();
                format!("{}=[{}]", region, names.join(","))
            })
            .collect();
        let _ = writeln!(out, "zones: {}", zones.join(" "));
    }

    if !view.region_versions.is_empty() {
        let versions: Vec<String> = view
            .region_versions
            .iter()
            .map(|(region, version)| format!("{}={}", region, version))
            .collect();
        let _ = writeln!(out, "versions: {}", versions.join(" "));
    }
    if view.nodes.is_empty() {
        out.push_str("(no nodes)\n");
    } else {
        let _ = writeln!(out, "  {}", NODE_HEADER);
    }

    section(&mut out, "online", &view.online_shards);
    section(&mut out, "standby", &view.standby_shards);
    section(&mut out, "free", &view.free_shards);
    section(&mut out, "orphan", &view.orphan_shards);

    if !view.free_nodes.is_empty() {
        out.push_str("== free nodes ==\n");
        for node in &view.free_nodes {
            let _ = writeln!(out, "  {}", node_row(node));
        }
    }

    if !view.migrations.is_empty() {
        out.push_str("== migrations ==\n");
        out.push_str(&render_migrations(view.migrations.values()));
    }
    out
}

pub fn render_migrations<'a, I>(migrations: I) -> String
where
    I: IntoIterator<Item = &'a MigrationProgress>,
{
    let mut out = String::new();
    for progress in migrations {
        out.push_str(&progress.to_string());
    }
    if out.is_empty() {
        out.push_str("(no migrations)\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{MigrationTask, NodeState, SlotRange};
    use std::collections::{BTreeMap, BTreeSet};
    use topology::{build_view, NodeSet};

    #[test]
    fn test_node_row_columns() {
        let mut node = NodeSnapshot::replica("abcdefghijklmnop", "m", "us").with_addr("10.0.0.1", 6379);
        node.metrics.master_link_status = "down".into();
        node.metrics.used_memory = 2 * 1024 * 1024 * 1024;

        let row = node_row(&node);
        let cols: Vec<&str> = row.split('\t').collect();
        assert_eq!(cols.len(), NODE_HEADER.split('\t').count());
        assert_eq!(cols[1], "abcdefghij");
        assert_eq!(cols[3], "10.0.0.1:6379");
        assert_eq!(cols[5], "r/-");
        assert_eq!(cols[14], "2.00G");
        assert_eq!(cols[15], "down");
    }

    #[test]
    fn test_render_view_sections() {
        let regions: BTreeSet<String> = ["us".to_string()].into_iter().collect();
        let nodes = NodeSet::from_arrivals(vec![
            NodeSnapshot::root("m1", "us").with_ranges(vec![SlotRange::new(0, 99).unwrap()]),
            NodeSnapshot::replica("r1", "gone", "us"),
        ]);
        let mut migrations = BTreeMap::new();
        migrations.insert(
            "m1".to_string(),
            MigrationTask::new("m1", "m2", vec![SlotRange::new(0, 9).unwrap()]).at(0, 3, "MIGRATING"),
        );

        let text = render_view(&build_view(&nodes, &migrations, &regions));
        assert!(text.contains("== online =="));
        assert!(text.contains("shard m1 [online] slots=0-99 regions=us rebalance=no"));
        assert!(text.contains("== orphan =="));
        assert!(!text.contains("== standby =="));
        assert!(text.contains("0-9\tMIGRATING"));
    }

    #[test]
    fn test_render_zones_and_offline_state() {
        let regions: BTreeSet<String> = ["us".to_string()].into_iter().collect();
        let nodes = NodeSet::from_arrivals(vec![
            NodeSnapshot::root("m1", "us").with_zone("us-a"),
            NodeSnapshot::replica("r1", "m1", "us")
                .with_zone("us-b")
                .with_state(NodeState::Offline),
        ]);
        let text = render_view(&build_view(&nodes, &BTreeMap::new(), &regions));
        assert!(text.contains("zones: us=[us-a,us-b]"));
        assert!(text.contains("\tOFFLINE\t"));
    }

    #[test]
    fn test_render_app_info() {
        let mut config = DashboardConfig::with_regions(["bj", "nj"]);
        config.app_name = "cache".into();
        config.master_region = Some("bj".into());
        assert_eq!(
            render_app_info(&config),
            "app: cache\tregions: bj,nj\tmaster region: bj\n"
        );
        assert!(render_app_info(&DashboardConfig::with_regions(["bj"])).ends_with("master region: -\n"));
    }

    #[test]
    fn test_render_empty() {
        let text = render_view(&ClusterView::default());
        assert!(text.contains("(no nodes)"));
        assert_eq!(render_migrations(Vec::<&MigrationProgress>::new()), "(no migrations)\n");
    }
}
