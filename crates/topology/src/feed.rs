//! Decoding for the two inbound feeds. Anything that fails here is dropped
//! by the caller without touching state.

use common::{FeedError, MigrationTask, NodeSnapshot};
use serde::de::DeserializeOwned;

/// Feed label carried in [`FeedError`] for node heartbeats.
pub const NODE_FEED: &str = "node";
/// Feed label carried in [`FeedError`] for migration snapshots.
pub const MIGRATION_FEED: &str = "migration";

fn decode<T: DeserializeOwned>(feed: &'static str, payload: &str) -> Result<T, FeedError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(FeedError::Empty { feed });
    }
    serde_json::from_str(payload).map_err(|e| FeedError::json(feed, e))
}

/// Decode one node-feed message. The node id must be non-empty.
pub fn parse_node_event(payload: &str) -> Result<NodeSnapshot, FeedError> {
    let node: NodeSnapshot = decode(NODE_FEED, payload)?;
    if node.id.is_empty() {
        return Err(FeedError::MissingId {
            feed: NODE_FEED,
            field: "Id",
        });
    }
    Ok(node)
}

/// Decode one migration-feed message. The source id must be non-empty.
pub fn parse_migration_event(payload: &str) -> Result<MigrationTask, FeedError> {
    let task: MigrationTask = decode(MIGRATION_FEED, payload)?;
    if task.source_id.is_empty() {
        return Err(FeedError::MissingId {
            feed: MIGRATION_FEED,
            field: "SourceId",
        });
    }
    Ok(task)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_event() {
        let node = parse_node_event(
            r#"{"Id":"n1","ParentId":"-","Role":"master","Region":"us","State":"RUNNING"}"#,
        )
        .unwrap();
        assert_eq!(node.id, "n1");
    }

    #[test]
    fn test_node_event_failures() {
        assert!(matches!(
            parse_node_event("   "),
            Err(FeedError::Empty { feed: NODE_FEED })
        ));
        assert!(matches!(
            parse_node_event("{\"Id\": 3"),
            Err(FeedError::Json { .. })
        ));
        assert!(matches!(
            parse_node_event(r#"[1, 2]"#),
            Err(FeedError::Json { .. })
        ));
        assert!(matches!(
            parse_node_event(
                r#"{"Id":"","ParentId":"-","Role":"master","Region":"us","State":"RUNNING"}"#
            ),
            Err(FeedError::MissingId { field: "Id", .. })
        ));
        assert!(matches!(
            parse_node_event(
                r#"{"Id":"n","ParentId":"-","Role":"master","Region":"us","State":"ZOMBIE"}"#
            ),
            Err(FeedError::Json { .. })
        ));
    }

    #[test]
    fn test_migration_event() {
        let task = parse_migration_event(
            r#"{"SourceId":"a","TargetId":"b","State":"MIGRATING","Ranges":[{"Left":1,"Right":2}],"CurrRangeIndex":0,"CurrSlot":1}"#,
        )
        .unwrap();
        assert_eq!(task.ranges.len(), 1);

        assert!(matches!(
            parse_migration_event(r#"{"SourceId":"","TargetId":"b"}"#),
            Err(FeedError::MissingId {
                feed: MIGRATION_FEED,
                ..
            })
        ));
        assert!(parse_migration_event(r#"{"SourceId":"a","TargetId":"b","Ranges":[{"Left":9,"Right":1}]}"#).is_err());
    }
}
