//! Geometric helpers on the integer module grid.
//!
//! All boxes are half-open: a block at `x` with extent `dx` covers `x..x+dx`.
//! Touching boxes therefore never collide.

use std::collections::HashMap;

use crate::catalog::Footprint;
use crate::model::{Configuration, PlacedBlock};

/// A unit cell `(i, j, k)` on the grid.
pub type Cell = (i32, i32, i32);

/// Maps each occupied cell to the id of the block covering it.
pub type OccupancyIndex = HashMap<Cell, u32>;

#[inline]
fn spans_overlap(a: i32, a_len: i32, b: i32, b_len: i32) -> bool {
    a < b + b_len && a + a_len > b
}

#[inline]
fn spans_touch(a: i32, a_len: i32, b: i32, b_len: i32) -> bool {
    a + a_len == b || b + b_len == a
}

/// Checks whether two blocks intersect in volume.
///
/// Two boxes do NOT collide if they are separated (or merely touching) on at least one axis.
pub fn overlaps(a: &PlacedBlock, b: &PlacedBlock) -> bool {
    spans_overlap(a.x, a.dx, b.x, b.dx)
        && spans_overlap(a.y, a.dy, b.y, b.dy)
        && spans_overlap(a.z, a.dz, b.z, b.dz)
}

/// Checks whether two blocks share a face.
///
/// True iff the projections overlap on two axes and the boxes touch on the third.
/// Symmetric in `a` and `b`.
pub fn face_adjacent(a: &PlacedBlock, b: &PlacedBlock) -> bool {
    let x_overlap = spans_overlap(a.x, a.dx, b.x, b.dx);
    let y_overlap = spans_overlap(a.y, a.dy, b.y, b.dy);
    let z_overlap = spans_overlap(a.z, a.dz, b.z, b.dz);

    (x_overlap && y_overlap && spans_touch(a.z, a.dz, b.z, b.dz))
        || (x_overlap && z_overlap && spans_touch(a.y, a.dy, b.y, b.dy))
        || (y_overlap && z_overlap && spans_touch(a.x, a.dx, b.x, b.dx))
}

/// Checks that a block lies within `[1, grid_max]` on every axis.
pub fn within_grid(block: &PlacedBlock, grid_max: i32) -> bool {
    let fits = |origin: i32, extent: i32| origin >= 1 && origin + extent - 1 <= grid_max;
    fits(block.x, block.dx) && fits(block.y, block.dy) && fits(block.z, block.dz)
}

/// Largest origin coordinate per axis that keeps a footprint inside the grid.
pub fn max_origin(footprint: Footprint, grid_max: i32) -> (i32, i32, i32) {
    (
        grid_max - footprint.dx + 1,
        grid_max - footprint.dy + 1,
        grid_max - footprint.dz + 1,
    )
}

/// Expands every block into its unit cells.
pub fn occupancy_index(configuration: &Configuration) -> OccupancyIndex {
    let mut index = OccupancyIndex::new();
    for block in configuration.blocks() {
        for cell in block.cells() {
            index.insert(cell, block.id);
        }
    }
    index
}
