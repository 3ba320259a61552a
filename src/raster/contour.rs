//! Triangulated contour rendering.
//!
//! Works on the raw scattered points, not the resampled grid: each Delaunay
//! triangle is intersected with every contour level that crosses it and the
//! crossing segment is stroked into a transparent overlay.

use image::{Rgba, RgbaImage};

use crate::coords::GeoBoundingBox;
use crate::delaunay::Triangulation;

/// Inferno-style colormap: dark purple (low) to bright yellow (high).
fn inferno_colormap(t: f64) -> [u8; 3] {
    let colors: [[f64; 3]; 8] = [
        [0.00, 0.00, 0.02],
        [0.19, 0.04, 0.37],
        [0.45, 0.08, 0.49],
        [0.71, 0.21, 0.33],
        [0.90, 0.39, 0.10],
        [0.98, 0.62, 0.02],
        [0.96, 0.84, 0.28],
        [0.99, 1.00, 0.64],
    ];
    let t = t.clamp(0.0, 1.0) * 7.0;
    let idx = (t as usize).min(6);
    let frac = t - idx as f64;
    let c1 = colors[idx];
    let c2 = colors[idx + 1];
    [
        ((c1[0] + (c2[0] - c1[0]) * frac) * 255.0) as u8,
        ((c1[1] + (c2[1] - c1[1]) * frac) * 255.0) as u8,
        ((c1[2] + (c2[2] - c1[2]) * frac) * 255.0) as u8,
    ]
}

/// Where the elevation crosses `level` along the edge a-b, in (lon, lat).
fn edge_crossing(
    a: (f64, f64),
    b: (f64, f64),
    za: f64,
    zb: f64,
    level: f64,
) -> Option<(f64, f64)> {
    if (za < level) == (zb < level) {
        return None;
    }
    let t = (level - za) / (zb - za);
    Some((a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1)))
}

/// Stroke a segment with the given thickness by stamping filled discs along
/// it, the classic raster line brush.
fn stroke_segment(
    img: &mut RgbaImage,
    from: (f64, f64),
    to: (f64, f64),
    thickness: f64,
    color: [u8; 3],
) {
    let (w, h) = (img.width() as f64, img.height() as f64);
    let length = ((to.0 - from.0).powi(2) + (to.1 - from.1).powi(2)).sqrt();
    let steps = (length * 2.0).ceil() as usize + 1;
    let radius = (thickness / 2.0).max(0.5);

    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let cx = from.0 + t * (to.0 - from.0);
        let cy = from.1 + t * (to.1 - from.1);

        let r = radius.ceil() as i64;
        for dy in -r..=r {
            for dx in -r..=r {
                if (dx * dx + dy * dy) as f64 > radius * radius {
                    continue;
                }
                let px = cx.round() as i64 + dx;
                let py = cy.round() as i64 + dy;
                if px >= 0 && py >= 0 && (px as f64) < w && (py as f64) < h {
                    img.put_pixel(px as u32, py as u32, Rgba([color[0], color[1], color[2], 255]));
                }
            }
        }
    }
}

/// Render a contour overlay of `levels` evenly spaced elevation levels onto a
/// transparent `size` x `size` image in bbox-aligned orientation (rows north
/// to south).
pub fn render_contours(
    triangulation: &Triangulation,
    elevations: &[f64],
    bbox: &GeoBoundingBox,
    size: usize,
    levels: usize,
    thickness: f64,
) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(size as u32, size as u32, Rgba([0, 0, 0, 0]));

    let (min_z, max_z) = elevations
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &z| {
            (lo.min(z), hi.max(z))
        });
    if !(max_z > min_z) || levels == 0 {
        return img;
    }

    let to_pixel = |p: (f64, f64)| -> (f64, f64) {
        let x = (p.0 - bbox.nw.1) / (bbox.se.1 - bbox.nw.1) * (size - 1) as f64;
        let y = (bbox.nw.0 - p.1) / (bbox.nw.0 - bbox.se.0) * (size - 1) as f64;
        (x, y)
    };

    for k in 1..=levels {
        let fraction = k as f64 / (levels + 1) as f64;
        let level = min_z + fraction * (max_z - min_z);
        let color = inferno_colormap(fraction);

        for t in &triangulation.triangles {
            let verts = [
                triangulation.points[t[0]],
                triangulation.points[t[1]],
                triangulation.points[t[2]],
            ];
            let zs = [elevations[t[0]], elevations[t[1]], elevations[t[2]]];

            let mut crossings = Vec::with_capacity(2);
            for (i, j) in [(0usize, 1usize), (1, 2), (2, 0)] {
                if let Some(p) = edge_crossing(verts[i], verts[j], zs[i], zs[j], level) {
                    crossings.push(p);
                }
            }
            if crossings.len() == 2 {
                stroke_segment(
                    &mut img,
                    to_pixel(crossings[0]),
                    to_pixel(crossings[1]),
                    thickness,
                    color,
                );
            }
        }
    }
    img
}
