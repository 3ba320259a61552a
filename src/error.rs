use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the terrain core.
///
/// Transport and schema failures are scoped to a single provider batch by the
/// acquirer; everything else propagates to the caller.
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV at {path}: {message}")]
    CsvParse { path: PathBuf, message: String },

    #[error("invalid bounding box: NW ({nw_lat}, {nw_lon}) / SE ({se_lat}, {se_lon}); expected NW north and west of SE")]
    InvalidBoundingBox {
        nw_lat: f64,
        nw_lon: f64,
        se_lat: f64,
        se_lon: f64,
    },

    #[error("coordinates file {path} is malformed: {message}")]
    InvalidCoordinatesFile { path: PathBuf, message: String },

    #[error("no API key configured for service {service}")]
    MissingApiKey { service: String },

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid provider response: {0}")]
    InvalidProviderResponse(String),

    #[error("insufficient elevation data: {count} samples, at least {required} required")]
    InsufficientData { count: usize, required: usize },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("usage ledger at {path} is corrupt: {message}")]
    LedgerCorrupt { path: PathBuf, message: String },
}

impl TerrainError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, TerrainError>;
