//! Explicit configuration objects: API keys and per-project file layout.
//!
//! Everything here is loaded once at startup and passed into the components
//! that need it; there is no global state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TerrainError};

/// Well-known service names used for API keys and usage accounting.
pub mod services {
    pub const GOOGLE_ELEVATION: &str = "google_elevation";
    pub const GOOGLE_SATELLITE: &str = "google_satellite";
}

/// API keys parsed from a dotenv-style `KEY=VALUE` file.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: HashMap<String, String>,
}

impl ApiKeys {
    /// Load keys from `path`. A missing file yields an empty key set; the
    /// error surfaces later as `MissingApiKey` when a key is actually needed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut keys = HashMap::new();
        if path.is_file() {
            let text = fs::read_to_string(path).map_err(|e| TerrainError::io(path, e))?;
            for line in text.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                if let Some((name, value)) = line.split_once('=') {
                    keys.insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
        Ok(Self { keys })
    }

    pub fn from_map(keys: HashMap<String, String>) -> Self {
        Self { keys }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.keys.get(name).map(String::as_str)
    }

    /// The Google Maps key, shared by the elevation and satellite services.
    pub fn google_maps(&self) -> Result<&str> {
        self.keys
            .get("google_maps")
            .map(String::as_str)
            .ok_or_else(|| TerrainError::MissingApiKey {
                service: "google_maps".to_string(),
            })
    }
}

/// File layout for a single saved project (location) directory.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub coordinates: PathBuf,
    pub elevation_csv: PathBuf,
    pub satellite_img: PathBuf,
    pub elevation_nearest_img: PathBuf,
    pub elevation_linear_img: PathBuf,
    pub contour_img: PathBuf,
    pub sample_distribution_img: PathBuf,
    pub tangent_normal_img: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            coordinates: root.join("Coordinates.csv"),
            elevation_csv: root.join("Elevation.csv"),
            satellite_img: root.join("Satellite.png"),
            elevation_nearest_img: root.join("Elevation_Nearest.png"),
            elevation_linear_img: root.join("Elevation_Linear.png"),
            contour_img: root.join("Contour.png"),
            sample_distribution_img: root.join("SampleDistribution.png"),
            tangent_normal_img: root.join("TangentNormal.png"),
            root,
        }
    }
}

/// Application-level paths shared across projects (the usage ledger and its
/// archive directory).
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub ledger: PathBuf,
    pub archive_dir: PathBuf,
}

impl AppPaths {
    pub fn new(app_dir: impl Into<PathBuf>) -> Self {
        let app_dir = app_dir.into();
        Self {
            ledger: app_dir.join("api_tracker.json"),
            archive_dir: app_dir.join("Archives"),
        }
    }
}
