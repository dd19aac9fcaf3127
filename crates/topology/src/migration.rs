//! Migration progress.
//!
//! The tracker keeps the latest task snapshot per source node; a new snapshot
//! replaces the old one outright. Progress labels are derived on read.

use common::node::short_id;
use common::{MigrationTask, SlotRange};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Progress label of one range within a migration task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeState {
    Done,
    /// The range being moved, labelled with the controller's state verbatim.
    Current(String),
    Todo,
}

impl fmt::Display for RangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeState::Done => f.write_str("Done"),
            RangeState::Current(state) => f.write_str(state),
            RangeState::Todo => f.write_str("Todo"),
        }
    }
}

impl Serialize for RangeState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeProgress {
    pub range: SlotRange,
    pub state: RangeState,
}

/// Label each range of `task` relative to its current range index.
pub fn range_states(task: &MigrationTask) -> Vec<RangeProgress> {
    task.ranges
        .iter()
        .enumerate()
        .map(|(idx, range)| {
            let state = if idx < task.curr_range_index {
                RangeState::Done
            } else if idx == task.curr_range_index {
                RangeState::Current(task.state.clone())
            } else {
                RangeState::Todo
            };
            RangeProgress {
                range: *range,
                state,
            }
        })
        .collect()
}

/// A task together with its per-range labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationProgress {
    pub task: MigrationTask,
    pub ranges: Vec<RangeProgress>,
}

impl From<&MigrationTask> for MigrationProgress {
    fn from(task: &MigrationTask) -> Self {
        Self {
            ranges: range_states(task),
            task: task.clone(),
        }
    }
}

impl fmt::Display for MigrationProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} to {}\t{}",
            short_id(&self.task.source_id),
            short_id(&self.task.target_id),
            self.task.curr_slot
        )?;
        for progress in &self.ranges {
            writeln!(f, "  {}\t{}", progress.range, progress.state)?;
        }
        Ok(())
    }
}

/// Latest migration snapshot per source node.
#[derive(Debug, Clone, Default)]
pub struct MigrationTracker {
    tasks: BTreeMap<String, MigrationTask>,
}

impl MigrationTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was known for `task.source_id`.
    pub fn ingest(&mut self, task: MigrationTask) -> Option<MigrationTask> {
        debug!(
            source_id = %task.source_id,
            target_id = %task.target_id,
            range_index = task.curr_range_index,
            state = %task.state,
            "migration task updated"
        );
        self.tasks.insert(task.source_id.clone(), task)
    }

    /// Latest task for `source_id`.
    pub fn get(&self, source_id: &str) -> Option<&MigrationTask> {
        self.tasks.get(source_id)
    }

    /// Copy of all tasks, keyed and sorted by source id.
    pub fn snapshot(&self) -> BTreeMap<String, MigrationTask> {
        self.tasks.clone()
    }

    /// Per-range labels for every task, keyed and sorted by source id.
    pub fn progress(&self) -> BTreeMap<String, Vec<RangeProgress>> {
        self.tasks
            .iter()
            .map(|(source, task)| (source.clone(), range_states(task)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
