//! Architectural metrics of a finished layout.
//!
//! All outputs are physical (metres), derived from the catalog module size.

use std::collections::HashSet;
use std::fmt;

use serde::{Serialize, Serializer};
use utoipa::ToSchema;

use crate::catalog::Catalog;
use crate::geometry::Cell;
use crate::model::Configuration;
use crate::types::{CentroidAccumulator, Vec3};

/// Overall dimensions and volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct LayoutParameters {
    /// Extent along X in metres
    pub width: f64,
    /// Extent along Y in metres
    pub length: f64,
    /// Extent along Z in metres
    pub height: f64,
    /// Sum of block volumes in cubic metres
    pub volume: f64,
}

/// Horizontal facade directions.
///
/// Declaration order is the enumeration order used for the dominant-facade tie-break.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub enum FacadeDirection {
    #[serde(rename = "X+")]
    PositiveX,
    #[serde(rename = "X-")]
    NegativeX,
    #[serde(rename = "Y+")]
    PositiveY,
    #[serde(rename = "Y-")]
    NegativeY,
}

impl FacadeDirection {
    pub const ALL: [FacadeDirection; 4] = [
        FacadeDirection::PositiveX,
        FacadeDirection::NegativeX,
        FacadeDirection::PositiveY,
        FacadeDirection::NegativeY,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FacadeDirection::PositiveX => "X+",
            FacadeDirection::NegativeX => "X-",
            FacadeDirection::PositiveY => "Y+",
            FacadeDirection::NegativeY => "Y-",
        }
    }

    fn offset(&self) -> (i32, i32) {
        match self {
            FacadeDirection::PositiveX => (1, 0),
            FacadeDirection::NegativeX => (-1, 0),
            FacadeDirection::PositiveY => (0, 1),
            FacadeDirection::NegativeY => (0, -1),
        }
    }
}

impl fmt::Display for FacadeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Exposed area of one facade direction.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct FacadeArea {
    pub direction: FacadeDirection,
    /// Exposed area in square metres
    pub area: f64,
}

/// Facade with the largest exposed area, if any face is exposed at all.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MainFront(pub Option<FacadeDirection>);

impl Serialize for MainFront {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(direction) => serializer.serialize_str(direction.label()),
            None => serializer.serialize_str("N/A"),
        }
    }
}

/// Complete analyzer output.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct LayoutAnalysis {
    pub parameters: LayoutParameters,
    /// Volume-weighted centre of gravity in metres, measured from the grid origin
    pub cog: Vec3,
    #[schema(value_type = String, example = "X+")]
    pub main_front: MainFront,
    /// Areas for X+, X-, Y+, Y- in that order
    pub facade_areas: Vec<FacadeArea>,
}

/// Computes metrics of a configuration under a catalog.
#[derive(Clone, Copy, Debug)]
pub struct GeometricAnalyzer<'a> {
    catalog: &'a Catalog,
}

impl<'a> GeometricAnalyzer<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn analyze(&self, configuration: &Configuration) -> LayoutAnalysis {
        let facade_areas = self.facade_areas(configuration);
        LayoutAnalysis {
            parameters: self.parameters(configuration),
            cog: self.center_of_gravity(configuration),
            main_front: dominant_facade(&facade_areas),
            facade_areas,
        }
    }

    /// Bounding extents (from the grid origin) and total volume.
    pub fn parameters(&self, configuration: &Configuration) -> LayoutParameters {
        let m = self.catalog.module_size();
        let max_x = configuration.blocks().map(|b| b.x + b.dx).max().unwrap_or(0);
        let max_y = configuration.blocks().map(|b| b.y + b.dy).max().unwrap_or(0);
        let max_z = configuration.blocks().map(|b| b.z + b.dz).max().unwrap_or(0);

        let volume = configuration
            .blocks()
            .map(|b| b.cell_count() as f64 * m.volume())
            .sum();

        LayoutParameters {
            width: max_x as f64 * m.x,
            length: max_y as f64 * m.y,
            height: max_z as f64 * m.z,
            volume,
        }
    }

    /// Volume-weighted centroid of all blocks; the origin for an empty layout.
    pub fn center_of_gravity(&self, configuration: &Configuration) -> Vec3 {
        let m = self.catalog.module_size();
        let mut acc = CentroidAccumulator::new();

        for block in configuration.blocks() {
            let size = Vec3::new(block.dx as f64, block.dy as f64, block.dz as f64)
                .scale(m.x, m.y, m.z);
            let corner = Vec3::new(
                (block.x - 1) as f64,
                (block.y - 1) as f64,
                (block.z - 1) as f64,
            )
            .scale(m.x, m.y, m.z);
            acc.add(corner + size * 0.5, size.volume());
        }

        acc.compute().unwrap_or_else(Vec3::zero)
    }

    /// Exposed face area per horizontal direction.
    ///
    /// A cell face counts when the neighbouring cell is free and still inside the
    /// grid; faces on the outer grid boundary are not counted.
    pub fn facade_areas(&self, configuration: &Configuration) -> Vec<FacadeArea> {
        let grid_max = self.catalog.grid_max();
        let occupied: HashSet<Cell> = configuration.blocks().flat_map(|b| b.cells()).collect();

        let m = self.catalog.module_size();
        let face_area = m.x * m.z;

        FacadeDirection::ALL
            .iter()
            .map(|direction| {
                let (di, dj) = direction.offset();
                let exposed = occupied
                    .iter()
                    .filter(|(i, j, k)| {
                        let neighbour = (i + di, j + dj, *k);
                        let inside = (1..=grid_max).contains(&neighbour.0)
                            && (1..=grid_max).contains(&neighbour.1);
                        inside && !occupied.contains(&neighbour)
                    })
                    .count();
                FacadeArea {
                    direction: *direction,
                    area: exposed as f64 * face_area,
                }
            })
            .collect()
    }
}

/// Picks the largest area; ties go to the earliest direction in `FacadeDirection::ALL`.
pub fn dominant_facade(areas: &[FacadeArea]) -> MainFront {
    let mut best: Option<&FacadeArea> = None;
    for candidate in areas.iter().filter(|a| a.area > 0.0) {
        if best.is_none_or(|b| candidate.area > b.area) {
            best = Some(candidate);
        }
    }
    MainFront(best.map(|a| a.direction))
}
