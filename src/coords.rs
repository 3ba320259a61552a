//! Geographic bounding box and grid sample point types.

use std::fs;
use std::path::Path;

use crate::error::{Result, TerrainError};

/// A rectangular region defined by its northwest and southeast corners.
///
/// Invariant: the NW corner is strictly north and west of the SE corner
/// (NW latitude > SE latitude, NW longitude < SE longitude).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBoundingBox {
    pub nw: (f64, f64),
    pub se: (f64, f64),
}

impl GeoBoundingBox {
    pub fn new(nw: (f64, f64), se: (f64, f64)) -> Result<Self> {
        if nw.0 <= se.0 || nw.1 >= se.1 {
            return Err(TerrainError::InvalidBoundingBox {
                nw_lat: nw.0,
                nw_lon: nw.1,
                se_lat: se.0,
                se_lon: se.1,
            });
        }
        Ok(Self { nw, se })
    }

    /// Load from a project coordinates file: a `latitude,longitude` header
    /// followed by the NW then SE corner, one per line. Corner lines may be
    /// plain `lat,lon` pairs or parenthesized `(lat, lon)` tuples.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| TerrainError::io(path, e))?;
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let malformed = |message: &str| TerrainError::InvalidCoordinatesFile {
            path: path.to_path_buf(),
            message: message.to_string(),
        };

        lines.next().ok_or_else(|| malformed("empty file"))?;
        let nw = parse_corner(lines.next().ok_or_else(|| malformed("missing NW corner"))?)
            .ok_or_else(|| malformed("unparseable NW corner"))?;
        let se = parse_corner(lines.next().ok_or_else(|| malformed("missing SE corner"))?)
            .ok_or_else(|| malformed("unparseable SE corner"))?;

        Self::new(nw, se)
    }

    /// True if the point lies within the box (inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat <= self.nw.0 && lat >= self.se.0 && lon >= self.nw.1 && lon <= self.se.1
    }
}

/// Load a clip polygon: one `lat,lon` vertex per line, with an optional
/// `latitude,longitude` header. Needs at least 3 vertices.
pub fn load_polygon(path: &Path) -> Result<Vec<(f64, f64)>> {
    let text = fs::read_to_string(path).map_err(|e| TerrainError::io(path, e))?;
    let mut vertices = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || (i == 0 && line.starts_with("latitude")) {
            continue;
        }
        let vertex = parse_corner(line).ok_or_else(|| TerrainError::InvalidCoordinatesFile {
            path: path.to_path_buf(),
            message: format!("unparseable polygon vertex on line {}", i + 1),
        })?;
        vertices.push(vertex);
    }
    if vertices.len() < 3 {
        return Err(TerrainError::InvalidCoordinatesFile {
            path: path.to_path_buf(),
            message: format!("polygon needs at least 3 vertices, found {}", vertices.len()),
        });
    }
    Ok(vertices)
}

/// Parse one corner line, tolerating `lat,lon` and `(lat, lon)` forms.
fn parse_corner(line: &str) -> Option<(f64, f64)> {
    let cleaned = line.trim().trim_start_matches('(').trim_end_matches(')');
    let (lat, lon) = cleaned.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

/// One grid node emitted by the sampler.
///
/// The offsets are geodesic arc lengths in meters: `x_offset_m` from the NW
/// corner along the box's north edge, `y_offset_m` from the north edge down
/// the point's column. They let later stages rebuild a metric local frame
/// without recomputing geodesics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub lat: f64,
    pub lon: f64,
    pub x_offset_m: f64,
    pub y_offset_m: f64,
}
