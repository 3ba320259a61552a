//! Terrain grabber core library
//!
//! Acquires elevation data for a geographic bounding box and converts the
//! scattered samples into pixel-aligned raster products.

pub mod acquire;
pub mod config;
pub mod coords;
pub mod dataset;
pub mod delaunay;
pub mod error;
pub mod provider;
pub mod raster;
pub mod sampler;
pub mod usage;
