//! Randomized sequential placement of one candidate layout.
//!
//! The requested archetypes are shuffled into a single placement order. Each block
//! then gets up to `max_block_retries` uniformly random origins; a sample is kept
//! when it collides with nothing and, for every block after the first, shares a face
//! with a block already placed. If any block runs out of retries the whole candidate
//! is abandoned.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::catalog::{BlockType, Catalog};
use crate::geometry::{face_adjacent, max_origin, overlaps, within_grid};
use crate::model::{Configuration, PlacedBlock, RequiredCounts};

/// Builds candidate configurations from a catalog.
#[derive(Clone, Copy, Debug)]
pub struct PlacementGenerator<'a> {
    catalog: &'a Catalog,
    max_block_retries: u32,
}

impl<'a> PlacementGenerator<'a> {
    pub const DEFAULT_MAX_BLOCK_RETRIES: u32 = 500;

    pub fn new(catalog: &'a Catalog, max_block_retries: u32) -> Self {
        Self {
            catalog,
            max_block_retries,
        }
    }

    /// Attempts one complete layout.
    ///
    /// # Parameters
    /// * `counts` - Requested archetype counts
    /// * `rng` - Randomness source (seed it for reproducible output)
    ///
    /// # Returns
    /// `Some(configuration)` with exactly `counts.total()` blocks, or `None` if some
    /// block could not be placed within the retry budget.
    pub fn try_generate<R: Rng>(
        &self,
        counts: &RequiredCounts,
        rng: &mut R,
    ) -> Option<Configuration> {
        let mut order = counts.tokens();
        order.shuffle(rng);

        let mut configuration = Configuration::new();
        let mut next_id: u32 = 1;

        for block_type in order {
            let block = self.place_block(&configuration, next_id, block_type, rng)?;
            configuration.insert(block);
            next_id += 1;
        }

        Some(configuration)
    }

    fn place_block<R: Rng>(
        &self,
        placed: &Configuration,
        id: u32,
        block_type: BlockType,
        rng: &mut R,
    ) -> Option<PlacedBlock> {
        let footprint = self.catalog.footprint(block_type);
        let (max_x, max_y, max_z) = max_origin(footprint, self.catalog.grid_max());

        for _ in 0..self.max_block_retries {
            let origin = (
                rng.gen_range(1..=max_x),
                rng.gen_range(1..=max_y),
                rng.gen_range(1..=max_z),
            );
            let candidate = PlacedBlock::from_catalog(id, block_type, origin, self.catalog);
            debug_assert!(within_grid(&candidate, self.catalog.grid_max()));

            if placed.blocks().any(|other| overlaps(other, &candidate)) {
                continue;
            }

            // Every block after the first must attach to the existing structure
            if !placed.is_empty()
                && !placed.blocks().any(|other| face_adjacent(other, &candidate))
            {
                continue;
            }

            return Some(candidate);
        }

        None
    }
}
