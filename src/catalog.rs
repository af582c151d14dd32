//! Static catalog of block archetypes and grid constants.
//!
//! The catalog is built once at start-up (defaults, optionally overridden from the
//! environment) and then handed by reference to the generator, the rules and the
//! analyzer. Nothing looks it up globally.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::Vec3;

/// The three block archetypes a layout is composed of.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum BlockType {
    Comfort,
    Transparent,
    Opaque,
}

impl BlockType {
    pub const ALL: [BlockType; 3] = [BlockType::Comfort, BlockType::Transparent, BlockType::Opaque];

    pub fn name(&self) -> &'static str {
        match self {
            BlockType::Comfort => "Comfort",
            BlockType::Transparent => "Transparent",
            BlockType::Opaque => "Opaque",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Module footprint and height of an archetype, in grid modules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footprint {
    pub dx: i32,
    pub dy: i32,
    pub dz: i32,
}

impl Footprint {
    pub const fn new(dx: i32, dy: i32, dz: i32) -> Self {
        Self { dx, dy, dz }
    }

    pub fn cells(&self) -> i64 {
        self.dx as i64 * self.dy as i64 * self.dz as i64
    }
}

/// Catalog entry for one archetype.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockSpec {
    pub footprint: Footprint,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("Invalid module size: {0:?} (all components must be positive and finite)")]
    InvalidModuleSize(Vec3),
    #[error("Invalid grid bound: {0} (must be at least 1)")]
    InvalidGridMax(i32),
    #[error("Archetype {block_type} has an empty footprint")]
    EmptyFootprint { block_type: BlockType },
    #[error("Archetype {block_type} ({dx}x{dy}x{dz}) does not fit into a grid of {grid_max}")]
    FootprintExceedsGrid {
        block_type: BlockType,
        dx: i32,
        dy: i32,
        dz: i32,
        grid_max: i32,
    },
}

/// Immutable archetype catalog plus grid constants.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    module_size: Vec3,
    grid_max: i32,
    comfort: BlockSpec,
    transparent: BlockSpec,
    opaque: BlockSpec,
}

impl Catalog {
    pub const DEFAULT_GRID_MAX: i32 = 5;
    pub const DEFAULT_MODULE_SIZE: Vec3 = Vec3::new(2.75, 2.75, 3.0);

    /// Creates a catalog after validating that every archetype fits into the grid.
    pub fn new(
        module_size: Vec3,
        grid_max: i32,
        comfort: BlockSpec,
        transparent: BlockSpec,
        opaque: BlockSpec,
    ) -> Result<Self, CatalogError> {
        if !module_size.is_valid_dimension() {
            return Err(CatalogError::InvalidModuleSize(module_size));
        }
        if grid_max < 1 {
            return Err(CatalogError::InvalidGridMax(grid_max));
        }

        let catalog = Self {
            module_size,
            grid_max,
            comfort,
            transparent,
            opaque,
        };

        for block_type in BlockType::ALL {
            let Footprint { dx, dy, dz } = catalog.footprint(block_type);
            if dx < 1 || dy < 1 || dz < 1 {
                return Err(CatalogError::EmptyFootprint { block_type });
            }
            if dx > grid_max || dy > grid_max || dz > grid_max {
                return Err(CatalogError::FootprintExceedsGrid {
                    block_type,
                    dx,
                    dy,
                    dz,
                    grid_max,
                });
            }
        }

        Ok(catalog)
    }

    /// Returns a copy with a different grid bound, re-validated.
    pub fn with_grid_max(&self, grid_max: i32) -> Result<Self, CatalogError> {
        Self::new(
            self.module_size,
            grid_max,
            self.comfort.clone(),
            self.transparent.clone(),
            self.opaque.clone(),
        )
    }

    /// Returns a copy with a different physical module size, re-validated.
    pub fn with_module_size(&self, module_size: Vec3) -> Result<Self, CatalogError> {
        Self::new(
            module_size,
            self.grid_max,
            self.comfort.clone(),
            self.transparent.clone(),
            self.opaque.clone(),
        )
    }

    pub fn module_size(&self) -> Vec3 {
        self.module_size
    }

    pub fn grid_max(&self) -> i32 {
        self.grid_max
    }

    pub fn spec(&self, block_type: BlockType) -> &BlockSpec {
        match block_type {
            BlockType::Comfort => &self.comfort,
            BlockType::Transparent => &self.transparent,
            BlockType::Opaque => &self.opaque,
        }
    }

    pub fn footprint(&self, block_type: BlockType) -> Footprint {
        self.spec(block_type).footprint
    }

    pub fn color(&self, block_type: BlockType) -> &str {
        &self.spec(block_type).color
    }

    /// Number of unit cells in the grid.
    pub fn grid_cells(&self) -> i64 {
        let g = self.grid_max as i64;
        g * g * g
    }

    /// Read-only view in the shape served by `GET /constants`.
    pub fn constants(&self) -> CatalogConstants {
        let block_sizes = BlockType::ALL
            .iter()
            .map(|t| {
                let f = self.footprint(*t);
                (t.name().to_string(), [f.dx, f.dy, f.dz])
            })
            .collect();
        let block_colors = BlockType::ALL
            .iter()
            .map(|t| (t.name().to_string(), self.color(*t).to_string()))
            .collect();

        CatalogConstants {
            module_size: self.module_size,
            block_sizes,
            block_colors,
            grid_max: self.grid_max,
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            module_size: Self::DEFAULT_MODULE_SIZE,
            grid_max: Self::DEFAULT_GRID_MAX,
            comfort: BlockSpec {
                footprint: Footprint::new(2, 2, 1),
                color: "#FFD700".to_string(),
            },
            transparent: BlockSpec {
                footprint: Footprint::new(1, 2, 1),
                color: "#87CEEB".to_string(),
            },
            opaque: BlockSpec {
                footprint: Footprint::new(2, 2, 1),
                color: "#3CB371".to_string(),
            },
        }
    }
}

/// Serializable catalog snapshot for frontends.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct CatalogConstants {
    #[serde(rename = "MODULE_SIZE")]
    pub module_size: Vec3,
    #[serde(rename = "BLOCK_SIZES")]
    #[schema(value_type = Object, example = json!({"Comfort": [2, 2, 1]}))]
    pub block_sizes: BTreeMap<String, [i32; 3]>,
    #[serde(rename = "BLOCK_COLORS")]
    pub block_colors: BTreeMap<String, String>,
    #[serde(rename = "GRID_MAX")]
    pub grid_max: i32,
}
