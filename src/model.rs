//! Data models for layout generation.
//!
//! - `PlacedBlock`: one archetype instance at a 1-based grid origin
//! - `Configuration`: a complete candidate (or final) layout keyed by block id
//! - `RequiredCounts`: how many blocks of each archetype are requested
//! - `RuleLogEntry`: one line of the user-facing rule log

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

use crate::catalog::{BlockType, Catalog, Footprint};

/// A block placed on the grid.
///
/// Occupies the half-open cell range `[x, x+dx) × [y, y+dy) × [z, z+dz)`.
///
/// # Fields
/// * `id` - Sequential id in placement order, starting at 1
/// * `type` - Archetype of the block
/// * `x`, `y`, `z` - 1-based grid origin
/// * `dx`, `dy`, `dz` - Extents in modules, copied from the archetype
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "id": 1, "type": "Comfort", "x": 1, "y": 1, "z": 1, "dx": 2, "dy": 2, "dz": 1
}))]
pub struct PlacedBlock {
    pub id: u32,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub dx: i32,
    pub dy: i32,
    pub dz: i32,
}

impl PlacedBlock {
    /// Creates a block with extents taken from the archetype footprint.
    pub fn new(
        id: u32,
        block_type: BlockType,
        origin: (i32, i32, i32),
        footprint: Footprint,
    ) -> Self {
        Self {
            id,
            block_type,
            x: origin.0,
            y: origin.1,
            z: origin.2,
            dx: footprint.dx,
            dy: footprint.dy,
            dz: footprint.dz,
        }
    }

    /// Convenience constructor using the catalog footprint.
    pub fn from_catalog(
        id: u32,
        block_type: BlockType,
        origin: (i32, i32, i32),
        catalog: &Catalog,
    ) -> Self {
        Self::new(id, block_type, origin, catalog.footprint(block_type))
    }

    /// Number of unit cells covered.
    pub fn cell_count(&self) -> i64 {
        self.dx as i64 * self.dy as i64 * self.dz as i64
    }

    /// Iterates over every unit cell the block occupies.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, i32)> + '_ {
        (self.x..self.x + self.dx).flat_map(move |i| {
            (self.y..self.y + self.dy)
                .flat_map(move |j| (self.z..self.z + self.dz).map(move |k| (i, j, k)))
        })
    }

    pub fn is_on_ground(&self) -> bool {
        self.z == 1
    }
}

/// A complete candidate or final layout, ordered by block id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Configuration {
    blocks: BTreeMap<u32, PlacedBlock>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a block under its own id, replacing any block with the same id.
    pub fn insert(&mut self, block: PlacedBlock) {
        self.blocks.insert(block.id, block);
    }

    pub fn get(&self, id: u32) -> Option<&PlacedBlock> {
        self.blocks.get(&id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in ascending id order.
    pub fn blocks(&self) -> impl Iterator<Item = &PlacedBlock> {
        self.blocks.values()
    }

    /// Smallest block id, the root of the connectivity traversal.
    pub fn first_id(&self) -> Option<u32> {
        self.blocks.keys().next().copied()
    }

    pub fn count_of(&self, block_type: BlockType) -> usize {
        self.blocks().filter(|b| b.block_type == block_type).count()
    }

    /// Ordered block list for results and export.
    pub fn to_coords(&self) -> Vec<PlacedBlock> {
        self.blocks().copied().collect()
    }
}

impl FromIterator<PlacedBlock> for Configuration {
    fn from_iter<T: IntoIterator<Item = PlacedBlock>>(iter: T) -> Self {
        let mut configuration = Configuration::new();
        for block in iter {
            configuration.insert(block);
        }
        configuration
    }
}

/// Requested number of blocks per archetype.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RequiredCounts {
    pub comfort: u32,
    pub transparent: u32,
    pub opaque: u32,
}

impl RequiredCounts {
    pub const fn new(comfort: u32, transparent: u32, opaque: u32) -> Self {
        Self {
            comfort,
            transparent,
            opaque,
        }
    }

    pub fn count(&self, block_type: BlockType) -> u32 {
        match block_type {
            BlockType::Comfort => self.comfort,
            BlockType::Transparent => self.transparent,
            BlockType::Opaque => self.opaque,
        }
    }

    pub fn total(&self) -> u64 {
        self.comfort as u64 + self.transparent as u64 + self.opaque as u64
    }

    /// One token per requested block, grouped by archetype (unshuffled).
    pub fn tokens(&self) -> Vec<BlockType> {
        BlockType::ALL
            .iter()
            .flat_map(|t| std::iter::repeat_n(*t, self.count(*t) as usize))
            .collect()
    }

    /// Number of unit cells the request needs in total.
    pub fn required_cells(&self, catalog: &Catalog) -> i64 {
        BlockType::ALL
            .iter()
            .map(|t| self.count(*t) as i64 * catalog.footprint(*t).cells())
            .sum()
    }
}

/// Outcome marker of a rule log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStatus {
    Pass,
    Fail,
    Separator,
}

impl RuleStatus {
    pub fn from_passed(passed: bool) -> Self {
        if passed { RuleStatus::Pass } else { RuleStatus::Fail }
    }
}

/// One entry of the diagnostic rule log. Never used for control flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RuleLogEntry {
    pub rule: String,
    pub status: RuleStatus,
    pub message: String,
}

impl RuleLogEntry {
    pub fn new(rule: impl Into<String>, status: RuleStatus, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            status,
            message: message.into(),
        }
    }
}
