//! Raster synthesis: turn the elevation dataset into the five pixel-aligned
//! products (nearest/linear height maps, contour overlay, sample
//! distribution overlay, tangent-space normal map).
//!
//! Every product is resampled to the project's reference satellite image
//! dimensions before being written, so overlays composite without scaling.

pub mod contour;
pub mod distribution;
pub mod gridded;
pub mod normal;

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{LumaA, ImageBuffer};
use tracing::{info, warn};

use crate::config::ProjectPaths;
use crate::coords::GeoBoundingBox;
use crate::dataset::ElevationSample;
use crate::delaunay;
use crate::error::{Result, TerrainError};
use self::gridded::HeightGrid;

/// Fewest distinct sample coordinates that still define an interpolation
/// surface.
const MIN_SAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Interpolation grid resolution (cells per side) before resampling.
    pub grid_resolution: usize,
    /// Number of contour levels.
    pub contour_levels: usize,
    /// Contour line thickness in grid pixels.
    pub contour_thickness: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            grid_resolution: 500,
            contour_levels: 50,
            contour_thickness: 1.5,
        }
    }
}

/// Outcome of a single raster product.
#[derive(Debug, Clone, PartialEq)]
pub enum ProductStatus {
    Written(PathBuf),
    Skipped(String),
}

/// Per-product outcome of one synthesis run.
#[derive(Debug, Clone)]
pub struct SynthesisReport {
    pub height_nearest: ProductStatus,
    pub height_linear: ProductStatus,
    pub contour: ProductStatus,
    pub sample_distribution: ProductStatus,
    pub tangent_normal: ProductStatus,
}

impl SynthesisReport {
    fn all_skipped(reason: &str) -> Self {
        let status = ProductStatus::Skipped(reason.to_string());
        Self {
            height_nearest: status.clone(),
            height_linear: status.clone(),
            contour: status.clone(),
            sample_distribution: status.clone(),
            tangent_normal: status,
        }
    }

    pub fn products(&self) -> [(&'static str, &ProductStatus); 5] {
        [
            ("height_nearest", &self.height_nearest),
            ("height_linear", &self.height_linear),
            ("contour", &self.contour),
            ("sample_distribution", &self.sample_distribution),
            ("tangent_normal", &self.tangent_normal),
        ]
    }
}

/// Grayscale render of a height grid, normalized to the elevation range.
/// NaN cells (outside the interpolation hull) come out transparent.
fn render_gray(grid: &HeightGrid, min: f64, max: f64) -> ImageBuffer<LumaA<u8>, Vec<u8>> {
    let span = (max - min).max(f64::MIN_POSITIVE);
    let size = grid.size as u32;
    ImageBuffer::from_fn(size, size, |x, y| {
        let v = grid.get(x as usize, y as usize);
        if v.is_finite() {
            let t = ((v - min) / span).clamp(0.0, 1.0);
            LumaA([(t * 255.0) as u8, 255])
        } else {
            LumaA([0, 0])
        }
    })
}

fn save_resized<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
    path: &Path,
) -> Result<ProductStatus>
where
    P: image::Pixel<Subpixel = u8> + 'static,
    ImageBuffer<P, Vec<u8>>: Into<image::DynamicImage>,
{
    let resized = imageops::resize(img, width, height, FilterType::Triangle);
    let dynamic: image::DynamicImage = resized.into();
    dynamic.save(path)?;
    info!(path = %path.display(), "raster product written");
    Ok(ProductStatus::Written(path.to_path_buf()))
}

/// Generate all raster products for `samples` over `bbox` into the project's
/// image paths.
///
/// Fails up front when fewer than [`MIN_SAMPLES`] distinct coordinates are
/// available; duplicate rows from re-acquisition collapse to one point and
/// cannot widen the interpolation hull. A missing reference satellite image
/// degrades the run to a fully skipped report rather than an error, since
/// nothing can be pixel-aligned.
pub fn synthesize(
    samples: &[ElevationSample],
    bbox: &GeoBoundingBox,
    paths: &ProjectPaths,
    config: &SynthesisConfig,
) -> Result<SynthesisReport> {
    let (points, elevations) = gridded::dedup_samples(samples);
    if points.len() < MIN_SAMPLES {
        return Err(TerrainError::InsufficientData {
            count: points.len(),
            required: MIN_SAMPLES,
        });
    }

    let (ref_w, ref_h) = match image::image_dimensions(&paths.satellite_img) {
        Ok(dims) => dims,
        Err(err) => {
            warn!(
                path = %paths.satellite_img.display(),
                error = %err,
                "reference satellite image unavailable, skipping synthesis"
            );
            return Ok(SynthesisReport::all_skipped(
                "reference satellite image unavailable",
            ));
        }
    };

    info!(
        samples = samples.len(),
        width = ref_w,
        height = ref_h,
        "synthesizing raster products"
    );

    // A degenerate grid resolution cannot host an interpolation surface.
    let grid_resolution = config.grid_resolution.max(2);
    let heights = gridded::grid_heights(samples, bbox, grid_resolution);

    let height_nearest = save_resized(
        &render_gray(&heights.nearest, heights.min_elevation, heights.max_elevation),
        ref_w,
        ref_h,
        &paths.elevation_nearest_img,
    )?;
    let height_linear = save_resized(
        &render_gray(&heights.linear, heights.min_elevation, heights.max_elevation),
        ref_w,
        ref_h,
        &paths.elevation_linear_img,
    )?;

    // Contours run on the raw scattered points, not the resampled grid.
    let triangulation = delaunay::triangulate(&points);
    let contour_img = contour::render_contours(
        &triangulation,
        &elevations,
        bbox,
        grid_resolution,
        config.contour_levels,
        config.contour_thickness,
    );
    let contour = save_resized(&contour_img, ref_w, ref_h, &paths.contour_img)?;

    // The distribution map renders straight at reference resolution.
    let dist_img = distribution::render_distribution(samples, ref_w, ref_h);
    dist_img.save(&paths.sample_distribution_img)?;
    info!(path = %paths.sample_distribution_img.display(), "raster product written");
    let sample_distribution = ProductStatus::Written(paths.sample_distribution_img.clone());

    // The normal map derives from the linear height grid before resampling.
    let normal_img = normal::render_normal_map(&heights.linear);
    let tangent_normal = save_resized(&normal_img, ref_w, ref_h, &paths.tangent_normal_img)?;

    Ok(SynthesisReport {
        height_nearest,
        height_linear,
        contour,
        sample_distribution,
        tangent_normal,
    })
}
