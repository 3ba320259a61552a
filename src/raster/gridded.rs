//! Scattered-to-grid height interpolation.
//!
//! Resamples the irregular (lon, lat, elevation) samples onto a square
//! regular grid spanning the bounding box, once with nearest-neighbor and
//! once with linear (barycentric over the Delaunay triangulation, NaN
//! outside the convex hull). Grid rows run north to south and columns west
//! to east, so the grid is already in image orientation.

use std::collections::HashSet;

use rayon::prelude::*;

use crate::coords::GeoBoundingBox;
use crate::dataset::ElevationSample;
use crate::delaunay::{self, Triangulation};

/// A square height grid in image orientation. Cells may be NaN where the
/// interpolation is undefined.
#[derive(Clone)]
pub struct HeightGrid {
    pub size: usize,
    pub data: Vec<f64>,
}

impl HeightGrid {
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.size + x]
    }
}

pub struct GriddedHeights {
    pub nearest: HeightGrid,
    pub linear: HeightGrid,
    /// Elevation range of the input samples, for grayscale normalization.
    pub min_elevation: f64,
    pub max_elevation: f64,
}

/// Uniform-cell index over scattered points for nearest-sample queries.
struct PointIndex {
    cells: Vec<Vec<usize>>,
    cells_per_side: usize,
    min: (f64, f64),
    cell_size: (f64, f64),
}

impl PointIndex {
    fn build(points: &[(f64, f64)]) -> Self {
        let cells_per_side = ((points.len() as f64).sqrt().ceil() as usize).clamp(1, 256);
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let cell_size = (
            ((max_x - min_x) / cells_per_side as f64).max(f64::MIN_POSITIVE),
            ((max_y - min_y) / cells_per_side as f64).max(f64::MIN_POSITIVE),
        );

        let mut cells = vec![Vec::new(); cells_per_side * cells_per_side];
        let index = Self {
            cells: Vec::new(),
            cells_per_side,
            min: (min_x, min_y),
            cell_size,
        };
        for (i, &p) in points.iter().enumerate() {
            let (cx, cy) = index.cell_of(p);
            cells[cy * cells_per_side + cx].push(i);
        }
        Self { cells, ..index }
    }

    fn cell_of(&self, p: (f64, f64)) -> (usize, usize) {
        let cx = ((p.0 - self.min.0) / self.cell_size.0) as usize;
        let cy = ((p.1 - self.min.1) / self.cell_size.1) as usize;
        (
            cx.min(self.cells_per_side - 1),
            cy.min(self.cells_per_side - 1),
        )
    }

    /// Index of the sample nearest to `p`, by expanding ring search.
    fn nearest(&self, points: &[(f64, f64)], p: (f64, f64)) -> usize {
        let (cx, cy) = self.cell_of(p);
        let mut best = usize::MAX;
        let mut best_d2 = f64::INFINITY;

        for ring in 0..self.cells_per_side {
            let x_lo = cx.saturating_sub(ring);
            let x_hi = (cx + ring).min(self.cells_per_side - 1);
            let y_lo = cy.saturating_sub(ring);
            let y_hi = (cy + ring).min(self.cells_per_side - 1);

            for gy in y_lo..=y_hi {
                for gx in x_lo..=x_hi {
                    // Only the new ring, not the already-searched interior.
                    let on_ring = gx == x_lo || gx == x_hi || gy == y_lo || gy == y_hi;
                    if ring > 0 && !on_ring {
                        continue;
                    }
                    for &i in &self.cells[gy * self.cells_per_side + gx] {
                        let dx = points[i].0 - p.0;
                        let dy = points[i].1 - p.1;
                        let d2 = dx * dx + dy * dy;
                        if d2 < best_d2 {
                            best_d2 = d2;
                            best = i;
                        }
                    }
                }
            }

            // A match this close cannot be beaten by any farther ring.
            if best != usize::MAX {
                let ring_clearance = ring as f64 * self.cell_size.0.min(self.cell_size.1);
                if best_d2.sqrt() <= ring_clearance {
                    break;
                }
            }
        }
        best
    }
}

/// Uniform-cell index over triangles for point location.
struct TriangleIndex {
    cells: Vec<Vec<usize>>,
    cells_per_side: usize,
    min: (f64, f64),
    cell_size: (f64, f64),
}

impl TriangleIndex {
    fn build(tri: &Triangulation) -> Self {
        let cells_per_side = ((tri.triangles.len() as f64).sqrt().ceil() as usize).clamp(1, 256);
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in &tri.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let cell_size = (
            ((max_x - min_x) / cells_per_side as f64).max(f64::MIN_POSITIVE),
            ((max_y - min_y) / cells_per_side as f64).max(f64::MIN_POSITIVE),
        );

        let mut index = Self {
            cells: vec![Vec::new(); cells_per_side * cells_per_side],
            cells_per_side,
            min: (min_x, min_y),
            cell_size,
        };

        for (t_idx, t) in tri.triangles.iter().enumerate() {
            let xs = [tri.points[t[0]].0, tri.points[t[1]].0, tri.points[t[2]].0];
            let ys = [tri.points[t[0]].1, tri.points[t[1]].1, tri.points[t[2]].1];
            let lo = index.clamped_cell(xs.iter().fold(f64::INFINITY, |a, &b| a.min(b)),
                                        ys.iter().fold(f64::INFINITY, |a, &b| a.min(b)));
            let hi = index.clamped_cell(xs.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)),
                                        ys.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)));
            for gy in lo.1..=hi.1 {
                for gx in lo.0..=hi.0 {
                    index.cells[gy * cells_per_side + gx].push(t_idx);
                }
            }
        }
        index
    }

    fn clamped_cell(&self, x: f64, y: f64) -> (usize, usize) {
        let cx = ((x - self.min.0) / self.cell_size.0) as usize;
        let cy = ((y - self.min.1) / self.cell_size.1) as usize;
        (
            cx.min(self.cells_per_side - 1),
            cy.min(self.cells_per_side - 1),
        )
    }

    /// The triangle containing `p`, if any.
    fn locate(&self, tri: &Triangulation, p: (f64, f64)) -> Option<[usize; 3]> {
        const EPS: f64 = 1e-12;
        let (cx, cy) = self.clamped_cell(p.0, p.1);
        for &t_idx in &self.cells[cy * self.cells_per_side + cx] {
            let t = tri.triangles[t_idx];
            let w = tri.barycentric(t, p);
            if w.iter().all(|&wi| wi >= -EPS) {
                return Some(t);
            }
        }
        None
    }
}

/// Deduplicated (lon, lat) points and elevations, keeping the first
/// occurrence of each exact coordinate (merged datasets can repeat rows).
pub(crate) fn dedup_samples(samples: &[ElevationSample]) -> (Vec<(f64, f64)>, Vec<f64>) {
    let mut seen = HashSet::new();
    let mut points = Vec::with_capacity(samples.len());
    let mut elevations = Vec::with_capacity(samples.len());
    for s in samples {
        if seen.insert((s.longitude.to_bits(), s.latitude.to_bits())) {
            points.push((s.longitude, s.latitude));
            elevations.push(s.elevation);
        }
    }
    (points, elevations)
}

/// Interpolate `samples` onto a `size` x `size` grid spanning `bbox`.
pub fn grid_heights(samples: &[ElevationSample], bbox: &GeoBoundingBox, size: usize) -> GriddedHeights {
    let (points, elevations) = dedup_samples(samples);

    let point_index = PointIndex::build(&points);
    let triangulation = delaunay::triangulate(&points);
    let triangle_index = TriangleIndex::build(&triangulation);

    let (min_elevation, max_elevation) = elevations
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &z| {
            (lo.min(z), hi.max(z))
        });

    let step = 1.0 / (size - 1) as f64;
    let mut nearest = vec![0.0; size * size];
    let mut linear = vec![f64::NAN; size * size];

    nearest
        .par_chunks_mut(size)
        .zip(linear.par_chunks_mut(size))
        .enumerate()
        .for_each(|(y, (nearest_row, linear_row))| {
            let lat = bbox.nw.0 - y as f64 * step * (bbox.nw.0 - bbox.se.0);
            for x in 0..size {
                let lon = bbox.nw.1 + x as f64 * step * (bbox.se.1 - bbox.nw.1);
                let p = (lon, lat);

                nearest_row[x] = elevations[point_index.nearest(&points, p)];

                if let Some(t) = triangle_index.locate(&triangulation, p) {
                    let w = triangulation.barycentric(t, p);
                    linear_row[x] = w[0] * elevations[t[0]]
                        + w[1] * elevations[t[1]]
                        + w[2] * elevations[t[2]];
                }
            }
        });

    GriddedHeights {
        nearest: HeightGrid { size, data: nearest },
        linear: HeightGrid { size, data: linear },
        min_elevation,
        max_elevation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 3x3 samples over a small box, elevation a linear ramp in longitude.
    fn ramp_samples(bbox: &GeoBoundingBox) -> Vec<ElevationSample> {
        let mut samples = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                let lat = bbox.nw.0 - (bbox.nw.0 - bbox.se.0) * row as f64 / 2.0;
                let lon = bbox.nw.1 + (bbox.se.1 - bbox.nw.1) * col as f64 / 2.0;
                samples.push(ElevationSample {
                    latitude: lat,
                    longitude: lon,
                    elevation: 100.0 + 10.0 * col as f64,
                    resolution: 9.54,
                    x_offset_m: col as f64 * 100.0,
                    y_offset_m: row as f64 * 100.0,
                });
            }
        }
        samples
    }

    fn test_bbox() -> GeoBoundingBox {
        GeoBoundingBox::new((35.6425, -82.5587), (35.6401, -82.5544)).unwrap()
    }

    #[test]
    fn test_linear_reproduces_ramp_at_sample_cells() {
        let bbox = test_bbox();
        let samples = ramp_samples(&bbox);
        // size 5: grid cells 0, 2, 4 coincide with the 3x3 sample positions.
        let gridded = grid_heights(&samples, &bbox, 5);

        for (row, grid_y) in [(0usize, 0usize), (1, 2), (2, 4)] {
            for (col, grid_x) in [(0usize, 0usize), (1, 2), (2, 4)] {
                let expected = 100.0 + 10.0 * col as f64;
                let got = gridded.linear.get(grid_x, grid_y);
                assert!(
                    (got - expected).abs() < 1e-6,
                    "cell ({grid_x},{grid_y}) row {row}: {got} != {expected}"
                );
            }
        }

        // Midpoints of the ramp interpolate halfway.
        let mid = gridded.linear.get(1, 2);
        assert!((mid - 105.0).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_covers_whole_grid() {
        let bbox = test_bbox();
        let gridded = grid_heights(&ramp_samples(&bbox), &bbox, 16);
        assert!(gridded.nearest.data.iter().all(|v| v.is_finite()));
        // Every nearest value is one of the sample elevations.
        for &v in &gridded.nearest.data {
            assert!([100.0, 110.0, 120.0].contains(&v));
        }
    }

    #[test]
    fn test_linear_nan_outside_hull() {
        let bbox = test_bbox();
        // Samples only in the western half; the east edge is outside the hull.
        let samples: Vec<ElevationSample> = ramp_samples(&bbox)
            .into_iter()
            .filter(|s| s.longitude < bbox.nw.1 + (bbox.se.1 - bbox.nw.1) * 0.6)
            .collect();
        let gridded = grid_heights(&samples, &bbox, 16);
        assert!(gridded.linear.get(15, 8).is_nan());
        assert!(gridded.linear.get(1, 8).is_finite());
    }

    #[test]
    fn test_duplicate_rows_are_tolerated() {
        let bbox = test_bbox();
        let mut samples = ramp_samples(&bbox);
        samples.extend(ramp_samples(&bbox));
        let gridded = grid_heights(&samples, &bbox, 8);
        assert_eq!(gridded.min_elevation, 100.0);
        assert_eq!(gridded.max_elevation, 120.0);
        assert!(gridded.linear.get(4, 4).is_finite());
    }
}
