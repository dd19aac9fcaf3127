use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RangeError;

/// Number of hash slots in the keyspace.
pub const SLOT_COUNT: u32 = 16384;

/// Highest valid slot number.
pub const MAX_SLOT: u16 = (SLOT_COUNT - 1) as u16;

/// Closed interval of hash slots owned or moved as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", try_from = "RawSlotRange")]
pub struct SlotRange {
    pub left: u16,
    pub right: u16,
}

// Wire shape before bounds are checked.
#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSlotRange {
    left: u32,
    right: u32,
}

impl TryFrom<RawSlotRange> for SlotRange {
    type Error = RangeError;

    fn try_from(raw: RawSlotRange) -> Result<Self, Self::Error> {
        SlotRange::new(raw.left, raw.right)
    }
}

impl SlotRange {
    /// Build a range, rejecting reversed bounds and slots past the keyspace.
    pub fn new(left: u32, right: u32) -> Result<Self, RangeError> {
        for slot in [left, right] {
            if slot > MAX_SLOT as u32 {
                return Err(RangeError::OutOfKeyspace {
                    slot,
                    max: MAX_SLOT,
                });
            }
        }
        let (left, right) = (left as u16, right as u16);
        if left > right {
            return Err(RangeError::Reversed { left, right });
        }
        Ok(Self { left, right })
    }

    /// Range covering exactly one slot.
    pub fn single(slot: u16) -> Result<Self, RangeError> {
        Self::new(slot as u32, slot as u32)
    }

    pub fn num_slots(&self) -> u32 {
        (self.right - self.left) as u32 + 1
    }

    pub fn contains(&self, slot: u16) -> bool {
        self.left <= slot && slot <= self.right
    }
}

impl fmt::Display for SlotRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.left, self.right)
    }
}

/// Parses operator input: `"a-b"` or a lone slot `"a"`.
impl FromStr for SlotRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let parse = |part: &str| -> Result<u32, RangeError> {
            part.trim()
                .parse::<u32>()
                .map_err(|_| RangeError::malformed(text))
        };

        match text.split_once('-') {
            Some((left, right)) => SlotRange::new(parse(left)?, parse(right)?),
            None => {
                let slot = parse(text)?;
                SlotRange::new(slot, slot)
            }
        }
    }
}

/// Parse a comma separated list such as `"0-100,200,300-400"`.
/// Blank items are skipped.
pub fn parse_range_list(input: &str) -> Result<Vec<SlotRange>, RangeError> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(SlotRange::from_str)
        .collect()
}

/// Total number of slots across `ranges`.
pub fn total_slots(ranges: &[SlotRange]) -> u32 {
    ranges.iter().map(SlotRange::num_slots).sum()
}
