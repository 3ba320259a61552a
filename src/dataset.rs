//! The per-project elevation dataset CSV.
//!
//! One row per retrieved sample. Acquisition appends to the file; raster
//! synthesis only reads it. Writes go through a temp file and an atomic
//! rename so an interrupted run never leaves a half-written dataset.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coords::SamplePoint;
use crate::error::{Result, TerrainError};

pub const CSV_HEADER: &str = "latitude,longitude,elevation,resolution,offset-x,offset-y";

/// One elevation sample as stored in the dataset CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElevationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation above sea level in meters.
    pub elevation: f64,
    /// Provider-reported sampling resolution of the returned value, meters.
    pub resolution: f64,
    #[serde(rename = "offset-x")]
    pub x_offset_m: f64,
    #[serde(rename = "offset-y")]
    pub y_offset_m: f64,
}

impl ElevationSample {
    pub fn sample_point(&self) -> SamplePoint {
        SamplePoint {
            lat: self.latitude,
            lon: self.longitude,
            x_offset_m: self.x_offset_m,
            y_offset_m: self.y_offset_m,
        }
    }
}

/// Read the full dataset. A missing file is an i/o error, not an empty set;
/// callers that treat absence as "nothing acquired yet" check existence first.
pub fn read_dataset(path: &Path) -> Result<Vec<ElevationSample>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| TerrainError::CsvParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut samples = Vec::new();
    for row in reader.deserialize() {
        let sample: ElevationSample = row.map_err(|e| TerrainError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

/// Append `rows` to the dataset at `path`, creating it (with header) if absent.
///
/// Merge semantics: any existing content is preserved verbatim, the header is
/// written exactly once, and the new rows follow the old body. There is no
/// coordinate dedup; re-requesting identical points produces duplicate rows.
pub fn append_rows(path: &Path, rows: &[ElevationSample]) -> Result<()> {
    let mut output = if path.exists() {
        let existing = fs::read_to_string(path).map_err(|e| TerrainError::io(path, e))?;
        let mut body = existing;
        if !body.ends_with('\n') {
            body.push('\n');
        }
        body
    } else {
        format!("{CSV_HEADER}\n")
    };

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row).map_err(|e| TerrainError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    }
    let new_rows = writer.into_inner().map_err(|e| TerrainError::CsvParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    output.push_str(&String::from_utf8_lossy(&new_rows));

    write_atomic(path, output.as_bytes())
}

/// Write via a sibling temp file then rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    fs::write(&tmp, bytes).map_err(|e| TerrainError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| TerrainError::io(path, e))?;
    Ok(())
}
