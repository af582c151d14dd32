//! Structural rules for a complete layout.
//!
//! Each rule is an independent unit implementing [`LayoutRule`]: a pure check over
//! a finished configuration that reports one or more pass/fail lines. The validator
//! owns the order in which they run.

use std::collections::{HashSet, VecDeque};

use crate::catalog::{BlockType, Catalog};
use crate::geometry::{OccupancyIndex, face_adjacent};
use crate::model::{Configuration, RequiredCounts};

/// Thresholds of the structural rule set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleLimits {
    /// Minimum number of Comfort blocks resting on level 1
    pub min_ground_comfort: usize,
    /// Maximum number of occupied levels in any grid column
    pub max_stacked_levels: usize,
    /// Maximum contiguous run of occupied ground cells along a row or column
    pub max_ground_run: usize,
}

impl RuleLimits {
    pub const DEFAULT_MIN_GROUND_COMFORT: usize = 2;
    pub const DEFAULT_MAX_STACKED_LEVELS: usize = 3;
    pub const DEFAULT_MAX_GROUND_RUN: usize = 4;
}

impl Default for RuleLimits {
    fn default() -> Self {
        Self {
            min_ground_comfort: Self::DEFAULT_MIN_GROUND_COMFORT,
            max_stacked_levels: Self::DEFAULT_MAX_STACKED_LEVELS,
            max_ground_run: Self::DEFAULT_MAX_GROUND_RUN,
        }
    }
}

/// Everything a rule may look at.
pub struct RuleContext<'a> {
    pub configuration: &'a Configuration,
    pub counts: &'a RequiredCounts,
    pub occupancy: &'a OccupancyIndex,
}

/// One reported line of a rule.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleCheck {
    pub rule: String,
    pub passed: bool,
    pub message: String,
}

impl RuleCheck {
    fn new(rule: impl Into<String>, passed: bool, message: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            passed,
            message: message.into(),
        }
    }
}

/// A single structural rule.
pub trait LayoutRule: Send + Sync {
    /// Evaluates the rule. Must not depend on anything but the context.
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<RuleCheck>;
}

/// Every archetype is present exactly as often as requested.
///
/// The generator places complete candidates only, so this passes for its output.
pub struct RequiredCountRule;

impl LayoutRule for RequiredCountRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<RuleCheck> {
        let mismatched: Vec<String> = BlockType::ALL
            .iter()
            .filter_map(|t| {
                let placed = ctx.configuration.count_of(*t);
                let wanted = ctx.counts.count(*t) as usize;
                (placed != wanted).then(|| format!("{} {}/{}", t, placed, wanted))
            })
            .collect();

        let message = if mismatched.is_empty() {
            format!("All {} blocks placed.", ctx.counts.total())
        } else {
            format!("Placed/required mismatch: {}", mismatched.join(", "))
        };
        vec![RuleCheck::new("2.1 Required Block Count", mismatched.is_empty(), message)]
    }
}

/// Enough Comfort blocks on the ground, and Opaque blocks only on the ground.
pub struct GroundSupportRule {
    pub min_ground_comfort: usize,
}

impl LayoutRule for GroundSupportRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<RuleCheck> {
        let comfort_on_ground = ground_comfort_count(ctx.configuration);
        let floating_opaque = opaque_above_ground(ctx.configuration);

        vec![
            RuleCheck::new(
                format!("2.2 Min Comfort on Ground (>={})", self.min_ground_comfort),
                comfort_on_ground >= self.min_ground_comfort,
                format!(
                    "{} Comfort block(s) on level 1, {} required.",
                    comfort_on_ground, self.min_ground_comfort
                ),
            ),
            RuleCheck::new(
                "5.1.1 Opaque Only on Ground (Z=1)",
                floating_opaque.is_empty(),
                if floating_opaque.is_empty() {
                    "All Opaque blocks rest on level 1.".to_string()
                } else {
                    format!("Opaque block(s) above level 1: {:?}", floating_opaque)
                },
            ),
        ]
    }
}

/// The face-adjacency graph over all blocks is a single component.
///
/// The generator already attaches every block to an existing one; this re-verifies
/// the final layout instead of assuming it.
pub struct ConnectivityRule;

impl LayoutRule for ConnectivityRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<RuleCheck> {
        let reached = connected_from_first(ctx.configuration);
        let total = ctx.configuration.len();
        let message = match ctx.configuration.first_id() {
            Some(start) => format!(
                "{} of {} blocks reachable from block {}.",
                reached, total, start
            ),
            None => "No blocks placed.".to_string(),
        };
        vec![RuleCheck::new("2.3 Compactness (Connectivity)", reached == total, message)]
    }
}

/// No grid column holds more than `max_levels` occupied levels.
pub struct StackingRule {
    pub grid_max: i32,
    pub max_levels: usize,
}

impl LayoutRule for StackingRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<RuleCheck> {
        let (levels, column) = max_stacked_levels(ctx.occupancy, self.grid_max);
        let message = match column {
            Some((x, y)) => format!(
                "Highest column ({}, {}) has {} occupied level(s), limit {}.",
                x, y, levels, self.max_levels
            ),
            None => "No occupied columns.".to_string(),
        };
        vec![RuleCheck::new(
            format!("2.4.1 Max {} Stacked Zones", self.max_levels),
            levels <= self.max_levels,
            message,
        )]
    }
}

/// No straight run of occupied ground cells longer than `max_run`.
pub struct LongHouseRule {
    pub grid_max: i32,
    pub max_run: usize,
}

impl LayoutRule for LongHouseRule {
    fn evaluate(&self, ctx: &RuleContext<'_>) -> Vec<RuleCheck> {
        let (x_run, y_run) = longest_ground_runs(ctx.configuration, self.grid_max);
        vec![RuleCheck::new(
            format!("2.4.3 No Long House on Ground (Max {} modules)", self.max_run),
            x_run <= self.max_run && y_run <= self.max_run,
            format!(
                "Longest ground run: {} along X, {} along Y.",
                x_run, y_run
            ),
        )]
    }
}

/// The fixed, ordered rule set for a catalog.
pub fn standard_rules(catalog: &Catalog, limits: RuleLimits) -> Vec<Box<dyn LayoutRule>> {
    vec![
        Box::new(RequiredCountRule),
        Box::new(GroundSupportRule {
            min_ground_comfort: limits.min_ground_comfort,
        }),
        Box::new(ConnectivityRule),
        Box::new(StackingRule {
            grid_max: catalog.grid_max(),
            max_levels: limits.max_stacked_levels,
        }),
        Box::new(LongHouseRule {
            grid_max: catalog.grid_max(),
            max_run: limits.max_ground_run,
        }),
    ]
}

/// Number of Comfort blocks on level 1.
pub fn ground_comfort_count(configuration: &Configuration) -> usize {
    configuration
        .blocks()
        .filter(|b| b.is_on_ground() && b.block_type == BlockType::Comfort)
        .count()
}

/// Ids of Opaque blocks that do not rest on level 1.
pub fn opaque_above_ground(configuration: &Configuration) -> Vec<u32> {
    configuration
        .blocks()
        .filter(|b| b.block_type == BlockType::Opaque && b.z > 1)
        .map(|b| b.id)
        .collect()
}

/// Breadth-first search over face adjacency, starting at the smallest id.
///
/// # Returns
/// Number of blocks reached (0 for an empty configuration)
pub fn connected_from_first(configuration: &Configuration) -> usize {
    let Some(start) = configuration.first_id() else {
        return 0;
    };

    let mut visited: HashSet<u32> = HashSet::from([start]);
    let mut queue: VecDeque<u32> = VecDeque::from([start]);

    while let Some(current_id) = queue.pop_front() {
        let Some(current) = configuration.get(current_id) else {
            continue;
        };
        for other in configuration.blocks() {
            if !visited.contains(&other.id) && face_adjacent(current, other) {
                visited.insert(other.id);
                queue.push_back(other.id);
            }
        }
    }

    visited.len()
}

/// Highest count of occupied levels over all `(x, y)` columns of the grid.
///
/// # Returns
/// `(levels, column)` where `column` is the first column reaching the maximum,
/// or `None` if nothing is occupied
pub fn max_stacked_levels(
    occupancy: &OccupancyIndex,
    grid_max: i32,
) -> (usize, Option<(i32, i32)>) {
    let mut best = (0, None);
    for x in 1..=grid_max {
        for y in 1..=grid_max {
            let levels = (1..=grid_max)
                .filter(|z| occupancy.contains_key(&(x, y, *z)))
                .count();
            if levels > best.0 {
                best = (levels, Some((x, y)));
            }
        }
    }
    best
}

fn longest_run(cells: impl Iterator<Item = bool>) -> usize {
    let mut current = 0;
    let mut longest = 0;
    for occupied in cells {
        current = if occupied { current + 1 } else { 0 };
        longest = longest.max(current);
    }
    longest
}

/// Longest contiguous runs of occupied ground cells.
///
/// Only blocks on level 1 are projected. Runs are measured along X within each row
/// and along Y within each column.
///
/// # Returns
/// `(longest_x_run, longest_y_run)`
pub fn longest_ground_runs(configuration: &Configuration, grid_max: i32) -> (usize, usize) {
    let size = (grid_max + 1) as usize;
    let mut footprint = vec![vec![false; size]; size];
    for block in configuration.blocks().filter(|b| b.is_on_ground()) {
        for i in block.x..block.x + block.dx {
            for j in block.y..block.y + block.dy {
                footprint[i as usize][j as usize] = true;
            }
        }
    }

    let g = grid_max as usize;
    let x_run = (1..=g)
        .map(|j| longest_run((1..=g).map(|i| footprint[i][j])))
        .max()
        .unwrap_or(0);
    let y_run = (1..=g)
        .map(|i| longest_run((1..=g).map(|j| footprint[i][j])))
        .max()
        .unwrap_or(0);

    (x_run, y_run)
}
