//! CSV rendering of placed blocks for download.

use std::fmt::Write;

use crate::model::PlacedBlock;

pub const CSV_FILE_NAME: &str = "block_coordinates.csv";

pub const CSV_HEADER: [&str; 8] = [
    "Block ID",
    "Type",
    "X_mod (1-based)",
    "Y_mod (1-based)",
    "Z_mod (1-based)",
    "DX_mod",
    "DY_mod",
    "DZ_mod",
];

/// Renders blocks as comma-separated rows in the given order, header first.
///
/// No field needs quoting: ids and coordinates are integers and archetype names are
/// plain words.
pub fn render_csv(coords: &[PlacedBlock]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push('\n');
    for b in coords {
        // Writing into a String cannot fail.
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            b.id, b.block_type, b.x, b.y, b.z, b.dx, b.dy, b.dz
        );
    }
    out
}
