use serde::{Deserialize, Serialize};

use crate::range::{total_slots, SlotRange};

/// Progress snapshot of one slot migration, keyed by its source node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MigrationTask {
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub ranges: Vec<SlotRange>,
    #[serde(default)]
    pub curr_range_index: usize,
    #[serde(default)]
    pub curr_slot: u32,
    /// Transport-level state owned by the controller (e.g. `MIGRATING`).
    #[serde(default)]
    pub state: String,
}

impl MigrationTask {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        ranges: Vec<SlotRange>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            ranges,
            curr_range_index: 0,
            curr_slot: 0,
            state: String::new(),
        }
    }

    /// Advance to `index` within the range list, reporting `state`.
    pub fn at(mut self, index: usize, curr_slot: u32, state: impl Into<String>) -> Self {
        self.curr_range_index = index;
        self.curr_slot = curr_slot;
        self.state = state.into();
        self
    }

    pub fn total_slots(&self) -> u32 {
        total_slots(&self.ranges)
    }

    /// Every range has been passed.
    pub fn is_finished(&self) -> bool {
        self.curr_range_index >= self.ranges.len()
    }
}
